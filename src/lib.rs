//! Grid snake that can be steered by keyboard or by an external vision
//! service. The library holds the game core; drawing and the window loop
//! live in the binary.

pub mod config;
pub mod death;
pub mod engine;
pub mod error;
pub mod game;
pub mod grid;
pub mod input;
pub mod replay;
pub mod schedule;
pub mod store;

#[cfg(not(target_arch = "wasm32"))]
pub mod backend;

pub use config::GameConfig;
pub use error::{BackendError, MoveError};
pub use game::{Event, Game, GameState};
pub use grid::{Cell, Direction, Grid};
pub use input::Command;
