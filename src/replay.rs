//! Frame log recorded while playing and the cursor used to play it back.

use std::time::Duration;

use crate::grid::{Cell, Direction};

/// Snapshot of one game tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameFrame {
    pub snake: Vec<Cell>,
    pub food: Cell,
    pub score: u32,
    pub direction: Direction,
    /// Milliseconds since the session started.
    pub timestamp_ms: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ReplaySpeed {
    Half,
    #[default]
    Normal,
    Double,
}

impl ReplaySpeed {
    /// Playback tick period for a base interval of `base` at 1x.
    pub fn period(self, base: Duration) -> Duration {
        match self {
            ReplaySpeed::Half => base * 2,
            ReplaySpeed::Normal => base,
            ReplaySpeed::Double => base / 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReplaySpeed::Half => "0.5x",
            ReplaySpeed::Normal => "1x",
            ReplaySpeed::Double => "2x",
        }
    }
}

/// Append-only while recording, read-only afterwards.
#[derive(Debug, Default)]
pub struct ReplayLog {
    frames: Vec<GameFrame>,
    recording: bool,
}

impl ReplayLog {
    /// A fresh log that accepts frames straight away.
    pub fn recording() -> Self {
        Self { frames: Vec::new(), recording: true }
    }

    pub fn is_recording(&self) -> bool { self.recording }

    pub fn stop_recording(&mut self) { self.recording = false; }

    /// Appends `frame` if recording; returns whether it was kept.
    pub fn record(&mut self, frame: GameFrame) -> bool {
        if !self.recording {
            return false;
        }
        self.frames.push(frame);
        true
    }

    pub fn get(&self, index: usize) -> Option<&GameFrame> { self.frames.get(index) }

    pub fn len(&self) -> usize { self.frames.len() }

    pub fn is_empty(&self) -> bool { self.frames.is_empty() }

    pub fn frames(&self) -> &[GameFrame] { &self.frames }
}

/// Playback position into a [`ReplayLog`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayCursor {
    index: usize,
}

impl ReplayCursor {
    pub fn index(&self) -> usize { self.index }

    pub fn rewind(&mut self) { self.index = 0; }

    /// Moves by `delta` frames, clamped to the log. Never wraps.
    pub fn step(&mut self, delta: isize, len: usize) {
        let last = len.saturating_sub(1);
        self.index = self.index.saturating_add_signed(delta).min(last);
    }

    /// One playback tick: forward by a frame, looping after the last one.
    pub fn tick(&mut self, len: usize) {
        self.index = if self.index + 1 >= len { 0 } else { self.index + 1 };
    }

    pub fn frame<'a>(&self, log: &'a ReplayLog) -> Option<&'a GameFrame> { log.get(self.index) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(score: u32) -> GameFrame {
        GameFrame {
            snake: vec![Cell::new(1, 1)],
            food: Cell::new(2, 2),
            score,
            direction: Direction::Right,
            timestamp_ms: u64::from(score) * 150,
        }
    }

    #[test]
    fn stopped_log_ignores_frames() {
        let mut log = ReplayLog::recording();
        assert!(log.record(frame(0)));
        log.stop_recording();
        assert!(!log.record(frame(10)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn default_log_is_not_recording() {
        let mut log = ReplayLog::default();
        assert!(!log.record(frame(0)));
        assert!(log.is_empty());
    }

    #[test]
    fn step_clamps_at_both_ends() {
        let mut cursor = ReplayCursor::default();
        cursor.step(-3, 5);
        assert_eq!(cursor.index(), 0);
        cursor.step(2, 5);
        assert_eq!(cursor.index(), 2);
        cursor.step(100, 5);
        assert_eq!(cursor.index(), 4);
    }

    #[test]
    fn tick_loops_back_to_the_start() {
        let mut cursor = ReplayCursor::default();
        cursor.step(2, 3);
        cursor.tick(3);
        assert_eq!(cursor.index(), 0);
        cursor.tick(3);
        assert_eq!(cursor.index(), 1);
    }

    #[test]
    fn speed_only_changes_the_period() {
        let base = Duration::from_millis(150);
        assert_eq!(ReplaySpeed::Half.period(base), Duration::from_millis(300));
        assert_eq!(ReplaySpeed::Normal.period(base), base);
        assert_eq!(ReplaySpeed::Double.period(base), Duration::from_millis(75));
    }

    proptest! {
        #[test]
        fn cursor_stays_in_range(
            len in 1usize..64,
            deltas in proptest::collection::vec(-100isize..100, 0..32),
        ) {
            let mut cursor = ReplayCursor::default();
            for delta in deltas {
                cursor.step(delta, len);
                prop_assert!(cursor.index() < len);
            }
        }
    }
}
