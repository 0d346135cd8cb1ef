//! Keyboard and vision input, reduced to the commands the game understands.

use std::collections::VecDeque;

use macroquad::input::KeyCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BackendError;
use crate::game::GameState;
use crate::grid::Direction;
use crate::replay::ReplaySpeed;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    TogglePause,
    Reset,
    Replay,
    ExitReplay,
    StepReplay(isize),
    SetReplaySpeed(ReplaySpeed),
    Turn(Direction),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Gesture {
    Pause,
    Reset,
}

/// One result pushed by the detection backend.
///
/// The backend sends `null`, unknown labels, or no `blink`/`calibrated`
/// at all depending on its mode; all of those deserialize.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub gesture: Option<String>,
    #[serde(default)]
    pub blink: bool,
    #[serde(default)]
    pub calibrated: bool,
    #[serde(default)]
    pub timestamp: f64,
}

impl DetectionResult {
    pub fn direction(&self) -> Option<Direction> {
        match self.direction.as_deref()?.trim().to_ascii_uppercase().as_str() {
            "UP" => Some(Direction::Up),
            "DOWN" => Some(Direction::Down),
            "LEFT" => Some(Direction::Left),
            "RIGHT" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn gesture(&self) -> Option<Gesture> {
        match self.gesture.as_deref()?.trim().to_ascii_uppercase().as_str() {
            "PAUSE" => Some(Gesture::Pause),
            "RESET" => Some(Gesture::Reset),
            _ => None,
        }
    }

    /// Commands carried by this result, in the order they apply.
    pub fn commands(&self) -> Vec<Command> {
        if self.blink {
            return vec![Command::Pause];
        }
        let mut out = Vec::with_capacity(2);
        if let Some(d) = self.direction() {
            out.push(Command::Turn(d));
        }
        match self.gesture() {
            Some(Gesture::Pause) => out.push(Command::Pause),
            Some(Gesture::Reset) => out.push(Command::Reset),
            None => {}
        }
        out
    }
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parses one stream message, either a bare result or an
/// `{"event": ..., "data": ...}` envelope.
pub fn parse_detection(text: &str) -> Result<Option<DetectionResult>, BackendError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| BackendError::DetectionStream(e.to_string()))?;
    if value.get("event").is_none() {
        return serde_json::from_value(value)
            .map(Some)
            .map_err(|e| BackendError::DetectionStream(e.to_string()));
    }
    let env: Envelope = serde_json::from_value(value).map_err(|e| BackendError::DetectionStream(e.to_string()))?;
    match env.event.as_str() {
        "detection_result" => serde_json::from_value(env.data)
            .map(Some)
            .map_err(|e| BackendError::DetectionStream(e.to_string())),
        "error" => {
            let message = env.data.get("message").and_then(|m| m.as_str()).unwrap_or("unknown error");
            Err(BackendError::DetectionStream(message.to_owned()))
        }
        _ => Ok(None),
    }
}

/// Direction the snake travels, with turns queued between game ticks.
#[derive(Clone, Debug)]
pub struct Steering {
    heading: Direction,
    queued: VecDeque<Direction>,
}

impl Steering {
    pub fn new(heading: Direction) -> Self {
        Self { heading, queued: VecDeque::new() }
    }

    /// Direction of the last executed move.
    pub fn heading(&self) -> Direction { self.heading }

    pub fn push(&mut self, direction: Direction) { self.queued.push_back(direction); }

    /// Drains queued turns and fixes the direction for this tick.
    ///
    /// Every turn is checked against the heading of the previous move, so a
    /// burst of turns inside one tick cannot add up to a reversal.
    pub fn resolve(&mut self) -> Direction {
        let mut next = self.heading;
        for wanted in self.queued.drain(..) {
            if wanted == self.heading.opposite() {
                debug!(?wanted, heading = ?self.heading, "reversal ignored");
                continue;
            }
            next = wanted;
        }
        self.heading = next;
        next
    }
}

/// Inbound queue of vision results, drained once per game tick.
#[derive(Debug)]
pub struct VisionInbox {
    pending: VecDeque<DetectionResult>,
    enabled: bool,
    last_timestamp: Option<f64>,
}

impl Default for VisionInbox {
    fn default() -> Self {
        Self { pending: VecDeque::new(), enabled: true, last_timestamp: None }
    }
}

impl VisionInbox {
    pub fn is_enabled(&self) -> bool { self.enabled }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.pending.clear();
        }
    }

    /// Queues a result. A result repeating the previous timestamp is the
    /// same detection seen twice and is dropped.
    pub fn push(&mut self, result: DetectionResult) -> bool {
        if !self.enabled {
            return false;
        }
        if result.timestamp > 0.0 && self.last_timestamp == Some(result.timestamp) {
            return false;
        }
        self.last_timestamp = Some(result.timestamp);
        self.pending.push_back(result);
        true
    }

    pub fn clear(&mut self) { self.pending.clear(); }

    pub fn len(&self) -> usize { self.pending.len() }

    pub fn is_empty(&self) -> bool { self.pending.is_empty() }

    pub fn drain(&mut self) -> Vec<Command> {
        self.pending.drain(..).flat_map(|r| r.commands()).collect()
    }
}

/// Keys the binary polls each frame.
pub const WATCHED_KEYS: &[KeyCode] = &[
    KeyCode::Up,
    KeyCode::Down,
    KeyCode::Left,
    KeyCode::Right,
    KeyCode::W,
    KeyCode::A,
    KeyCode::S,
    KeyCode::D,
    KeyCode::Space,
    KeyCode::Enter,
    KeyCode::R,
    KeyCode::Escape,
    KeyCode::Key1,
    KeyCode::Key2,
    KeyCode::Key3,
    KeyCode::PageUp,
    KeyCode::PageDown,
];

/// Frames skipped by one page jump during replay.
pub const REPLAY_PAGE: isize = 10;

/// Maps a key press to commands for the current state.
pub fn commands_for_key(key: KeyCode, state: GameState) -> Vec<Command> {
    match state {
        GameState::Menu => match key {
            KeyCode::Enter | KeyCode::Space => vec![Command::Start],
            _ => Vec::new(),
        },
        GameState::Playing => match key {
            KeyCode::Up | KeyCode::W => vec![Command::Turn(Direction::Up)],
            KeyCode::Down | KeyCode::S => vec![Command::Turn(Direction::Down)],
            KeyCode::Left | KeyCode::A => vec![Command::Turn(Direction::Left)],
            KeyCode::Right | KeyCode::D => vec![Command::Turn(Direction::Right)],
            KeyCode::Space => vec![Command::TogglePause],
            KeyCode::Escape => vec![Command::Reset],
            _ => Vec::new(),
        },
        GameState::Paused => match key {
            KeyCode::Space => vec![Command::TogglePause],
            KeyCode::Escape => vec![Command::Reset],
            _ => Vec::new(),
        },
        GameState::DeathAnimation => Vec::new(),
        GameState::GameOver => match key {
            // Play again: back to the menu, then straight into a new session.
            KeyCode::Enter => vec![Command::Reset, Command::Start],
            KeyCode::R => vec![Command::Replay],
            KeyCode::Escape => vec![Command::Reset],
            _ => Vec::new(),
        },
        GameState::Replay => match key {
            KeyCode::Left | KeyCode::A => vec![Command::StepReplay(-1)],
            KeyCode::Right | KeyCode::D => vec![Command::StepReplay(1)],
            KeyCode::Down | KeyCode::S | KeyCode::PageDown => vec![Command::StepReplay(-REPLAY_PAGE)],
            KeyCode::Up | KeyCode::W | KeyCode::PageUp => vec![Command::StepReplay(REPLAY_PAGE)],
            KeyCode::Key1 => vec![Command::SetReplaySpeed(ReplaySpeed::Half)],
            KeyCode::Key2 => vec![Command::SetReplaySpeed(ReplaySpeed::Normal)],
            KeyCode::Key3 => vec![Command::SetReplaySpeed(ReplaySpeed::Double)],
            KeyCode::Escape => vec![Command::ExitReplay],
            _ => Vec::new(),
        },
    }
}
