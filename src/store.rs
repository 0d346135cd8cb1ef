//! High score persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub trait HighScoreStore {
    fn load(&self) -> Result<u32, StoreError>;
    fn save(&mut self, score: u32) -> Result<(), StoreError>;
}

#[derive(Serialize, Deserialize, Default)]
struct SaveData {
    best_score: u32,
}

/// Keeps the best score in a small JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl HighScoreStore for JsonFileStore {
    fn load(&self) -> Result<u32, StoreError> {
        if !self.path.exists() {
            return Ok(0);
        }
        let text = fs::read_to_string(&self.path)?;
        let data: SaveData = serde_json::from_str(&text)?;
        Ok(data.best_score)
    }

    fn save(&mut self, score: u32) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(&SaveData { best_score: score })?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    best: u32,
    writes: usize,
}

impl MemoryStore {
    pub fn with_best(best: u32) -> Self {
        Self { best, writes: 0 }
    }

    pub fn best(&self) -> u32 { self.best }

    pub fn writes(&self) -> usize { self.writes }
}

impl HighScoreStore for MemoryStore {
    fn load(&self) -> Result<u32, StoreError> { Ok(self.best) }

    fn save(&mut self, score: u32) -> Result<(), StoreError> {
        self.best = score;
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("snake_vision_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn file_round_trip() {
        let path = scratch("round_trip");
        let mut store = JsonFileStore::new(&path);
        assert_eq!(store.load().unwrap(), 0);
        store.save(120).unwrap();
        assert_eq!(JsonFileStore::new(&path).load().unwrap(), 120);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = scratch("corrupt");
        fs::write(&path, "{ best_score: ").unwrap();
        assert!(matches!(JsonFileStore::new(&path).load(), Err(StoreError::Json(_))));
        let _ = fs::remove_file(path);
    }
}
