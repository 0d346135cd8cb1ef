use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::death::{MAX_PARTICLE_SPEED, ParticleSettings};
use crate::engine::Board;
use crate::error::ConfigError;
use crate::grid::Grid;

pub const DEFAULT_CONFIG_PATH: &str = "snake_config.json";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    #[default]
    Motion,
    Gesture,
    Head,
}

impl DetectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMode::Motion => "motion",
            DetectionMode::Gesture => "gesture",
            DetectionMode::Head => "head",
        }
    }

    /// Next mode in the motion, gesture, head cycle.
    pub fn next(self) -> DetectionMode {
        match self {
            DetectionMode::Motion => DetectionMode::Gesture,
            DetectionMode::Gesture => DetectionMode::Head,
            DetectionMode::Head => DetectionMode::Motion,
        }
    }
}

/// Bounds of the sensitivity slider, in percent.
pub const MIN_SENSITIVITY: u8 = 10;
pub const MAX_SENSITIVITY: u8 = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub enabled: bool,
    pub url: String,
    pub stream_path: String,
    pub mode: DetectionMode,
    pub sensitivity: u8,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:5001".to_owned(),
            stream_path: "/ws".to_owned(),
            mode: DetectionMode::Motion,
            sensitivity: 50,
        }
    }
}

impl BackendConfig {
    /// WebSocket address derived from the HTTP base url.
    pub fn stream_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_owned()
        };
        let path = self.stream_path.trim_start_matches('/');
        format!("{ws}/{path}")
    }

    /// Moves the sensitivity by `delta` percent, kept within the slider
    /// bounds. Returns the new value.
    pub fn nudge_sensitivity(&mut self, delta: i16) -> u8 {
        let next = (i16::from(self.sensitivity) + delta).clamp(i16::from(MIN_SENSITIVITY), i16::from(MAX_SENSITIVITY));
        self.sensitivity = next as u8;
        self.sensitivity
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub grid_width: i32,
    pub grid_height: i32,
    /// Pixel size of one cell at 1:1 scale.
    pub cell_size: f32,
    pub tick_ms: u64,
    pub animation_tick_ms: u64,
    pub replay_base_ms: u64,
    pub food_reward: u32,
    pub food_retry_cap: usize,
    pub death_frames: u32,
    pub particle_count: usize,
    pub particle_speed: f32,
    pub particle_damping: f32,
    pub particle_decay: f32,
    pub seed: Option<u64>,
    pub save_path: PathBuf,
    pub backend: BackendConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 20,
            cell_size: 20.0,
            tick_ms: 150,
            animation_tick_ms: 50,
            replay_base_ms: 150,
            food_reward: 10,
            food_retry_cap: 1024,
            death_frames: 60,
            particle_count: 15,
            particle_speed: 0.2,
            particle_damping: 0.98,
            particle_decay: 0.025,
            seed: None,
            save_path: PathBuf::from("snake_save.json"),
            backend: BackendConfig::default(),
        }
    }
}

impl GameConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Boards smaller than 2x2 leave no room for food next to the snake.
    pub fn grid(&self) -> Grid {
        Grid::new(self.grid_width.max(2), self.grid_height.max(2))
    }

    pub fn board(&self) -> Board {
        Board::new(self.grid(), self.food_retry_cap)
    }

    pub fn particles(&self) -> ParticleSettings {
        ParticleSettings {
            count: self.particle_count,
            speed: self.particle_speed.abs().min(MAX_PARTICLE_SPEED),
            damping: self.particle_damping.clamp(0.0, 1.0),
            decay: self.particle_decay.max(f32::EPSILON),
            max_frames: self.death_frames.max(1),
        }
    }

    pub fn tick(&self) -> Duration { Duration::from_millis(self.tick_ms.max(1)) }

    pub fn animation_tick(&self) -> Duration { Duration::from_millis(self.animation_tick_ms.max(1)) }

    pub fn replay_base(&self) -> Duration { Duration::from_millis(self.replay_base_ms.max(2)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: GameConfig = serde_json::from_str(r#"{"grid_width": 30, "backend": {"mode": "head"}}"#).unwrap();
        assert_eq!(cfg.grid(), Grid::new(30, 20));
        assert_eq!(cfg.backend.mode, DetectionMode::Head);
        assert_eq!(cfg.backend.sensitivity, 50);
        assert_eq!(cfg.tick(), Duration::from_millis(150));
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let cfg = GameConfig { grid_width: 0, grid_height: 1, tick_ms: 0, death_frames: 0, ..GameConfig::default() };
        assert_eq!(cfg.grid(), Grid::new(2, 2));
        assert_eq!(cfg.tick(), Duration::from_millis(1));
        assert_eq!(cfg.particles().max_frames, 1);
    }

    #[test]
    fn particle_speed_is_bounded() {
        let cfg: GameConfig = serde_json::from_str(r#"{"particle_speed": 3.0e38}"#).unwrap();
        assert_eq!(cfg.particles().speed, MAX_PARTICLE_SPEED);
        let cfg = GameConfig { particle_speed: -0.5, ..GameConfig::default() };
        assert_eq!(cfg.particles().speed, 0.5);
    }

    #[test]
    fn missing_file_means_defaults() {
        let cfg = GameConfig::load(Path::new("definitely/not/here.json")).unwrap();
        assert_eq!(cfg, GameConfig::default());
    }

    #[test]
    fn modes_cycle() {
        let mut mode = DetectionMode::default();
        for expected in [DetectionMode::Gesture, DetectionMode::Head, DetectionMode::Motion] {
            mode = mode.next();
            assert_eq!(mode, expected);
        }
    }

    #[test]
    fn sensitivity_stays_on_the_slider() {
        let mut backend = BackendConfig::default();
        assert_eq!(backend.nudge_sensitivity(10), 60);
        assert_eq!(backend.nudge_sensitivity(100), MAX_SENSITIVITY);
        assert_eq!(backend.nudge_sensitivity(-200), MIN_SENSITIVITY);
        backend.sensitivity = 255;
        assert_eq!(backend.nudge_sensitivity(0), MAX_SENSITIVITY);
    }

    #[test]
    fn stream_url_follows_the_http_scheme() {
        let mut backend = BackendConfig::default();
        assert_eq!(backend.stream_url(), "ws://localhost:5001/ws");
        backend.url = "https://vision.local/".to_owned();
        backend.stream_path = "detections".to_owned();
        assert_eq!(backend.stream_url(), "wss://vision.local/detections");
        assert_eq!(backend.endpoint("/health"), "https://vision.local/health");
    }
}
