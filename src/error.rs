use thiserror::Error;

/// Why a move could not be applied. Collisions are ordinary game events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("snake left the board")]
    WallCollision,
    #[error("snake ran into its own body")]
    SelfCollision,
    #[error("no free cell left for food")]
    BoardFull,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("save file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("save file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Faults of the external detection service. These never reach the game
/// state machine; the input side just sees no new detections.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("detection backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("detection stream error: {0}")]
    DetectionStream(String),
    #[error("backend request failed: {0}")]
    Request(String),
}
