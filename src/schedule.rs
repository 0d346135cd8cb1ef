//! Fixed-period drivers for the game, death animation and replay.
//!
//! Only the driver that belongs to the current state is armed. Arming a
//! different one drops whatever time the others had accumulated, so a tick
//! can never outlive the state it was scheduled for.

use std::time::Duration;

use crate::game::GameState;

/// Ticks delivered per `advance` call at most; the rest is dropped.
pub const MAX_CATCH_UP: u32 = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickKind {
    Game,
    Animation,
    Replay,
}

impl TickKind {
    pub fn for_state(state: GameState) -> Option<TickKind> {
        match state {
            GameState::Playing => Some(TickKind::Game),
            GameState::DeathAnimation => Some(TickKind::Animation),
            GameState::Replay => Some(TickKind::Replay),
            GameState::Menu | GameState::Paused | GameState::GameOver => None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Ticker {
    period: Duration,
    elapsed: Duration,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self { period: period.max(Duration::from_millis(1)), elapsed: Duration::ZERO }
    }

    pub fn period(&self) -> Duration { self.period }

    pub fn set_period(&mut self, period: Duration) {
        self.period = period.max(Duration::from_millis(1));
    }

    pub fn reset(&mut self) { self.elapsed = Duration::ZERO; }

    /// Adds `dt` and returns how many whole periods are due.
    pub fn accumulate(&mut self, dt: Duration) -> u32 {
        self.elapsed += dt;
        let mut due = 0;
        while self.elapsed >= self.period {
            self.elapsed -= self.period;
            due += 1;
            if due == MAX_CATCH_UP {
                self.elapsed = Duration::ZERO;
                break;
            }
        }
        due
    }
}

#[derive(Debug)]
pub struct Scheduler {
    game: Ticker,
    animation: Ticker,
    replay: Ticker,
    armed: Option<TickKind>,
}

impl Scheduler {
    pub fn new(game: Duration, animation: Duration, replay: Duration) -> Self {
        Self {
            game: Ticker::new(game),
            animation: Ticker::new(animation),
            replay: Ticker::new(replay),
            armed: None,
        }
    }

    pub fn armed(&self) -> Option<TickKind> { self.armed }

    /// Arms `kind` (or nothing) and disarms everything else.
    pub fn arm(&mut self, kind: Option<TickKind>) {
        self.game.reset();
        self.animation.reset();
        self.replay.reset();
        self.armed = kind;
    }

    pub fn set_replay_period(&mut self, period: Duration) {
        self.replay.set_period(period);
    }

    pub fn ticker(&self, kind: TickKind) -> &Ticker {
        match kind {
            TickKind::Game => &self.game,
            TickKind::Animation => &self.animation,
            TickKind::Replay => &self.replay,
        }
    }

    /// Lets `dt` pass on the armed driver.
    pub fn advance(&mut self, dt: Duration) -> Option<(TickKind, u32)> {
        let kind = self.armed?;
        let ticker = match kind {
            TickKind::Game => &mut self.game,
            TickKind::Animation => &mut self.animation,
            TickKind::Replay => &mut self.replay,
        };
        Some((kind, ticker.accumulate(dt)))
    }
}
