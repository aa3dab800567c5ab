//! Session configuration stores.
//!
//! A store maps a session identifier to one [`SimConfig`]. The simulation never
//! touches a store directly; the app layer reads a session, validates it and
//! hands the record to `Simulation::new`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::SimConfig;
use crate::error::AppError;

/// Read/write access to session records.
pub trait ConfigStore {
    /// The stored record, or `None` for an unknown session.
    fn read(&self, session: &str) -> Result<Option<SimConfig>, AppError>;

    /// Insert or replace a session's record.
    fn write(&mut self, session: &str, config: &SimConfig) -> Result<(), AppError>;

    /// Remove a session. Returns whether it existed.
    fn delete(&mut self, session: &str) -> Result<bool, AppError>;
}

/// Session identifiers double as file stems, so keep them to a safe alphabet.
pub fn validate_session_id(session: &str) -> Result<(), AppError> {
    let ok = !session.is_empty()
        && session
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(AppError::config(format!(
            "Invalid session id '{session}': use letters, digits, '-' or '_'."
        )))
    }
}

/// One pretty-printed JSON file per session: `<dir>/<session>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{session}.json"))
    }
}

impl ConfigStore for JsonFileStore {
    fn read(&self, session: &str) -> Result<Option<SimConfig>, AppError> {
        validate_session_id(session)?;
        let path = self.path_for(session);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| AppError::config(format!("Failed to read '{}': {e}", path.display())))?;
        let config = serde_json::from_str(&text)
            .map_err(|e| AppError::config(format!("Failed to parse '{}': {e}", path.display())))?;
        debug!("loaded session '{session}' from {}", path.display());
        Ok(Some(config))
    }

    fn write(&mut self, session: &str, config: &SimConfig) -> Result<(), AppError> {
        validate_session_id(session)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::config(format!("Failed to create '{}': {e}", self.dir.display()))
        })?;
        let path = self.path_for(session);
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| AppError::config(format!("Failed to serialize session: {e}")))?;
        fs::write(&path, json)
            .map_err(|e| AppError::config(format!("Failed to write '{}': {e}", path.display())))?;
        debug!("saved session '{session}' to {}", path.display());
        Ok(())
    }

    fn delete(&mut self, session: &str) -> Result<bool, AppError> {
        validate_session_id(session)?;
        let path = self.path_for(session);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .map_err(|e| AppError::config(format!("Failed to delete '{}': {e}", path.display())))?;
        Ok(true)
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sessions: HashMap<String, SimConfig>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl ConfigStore for MemoryStore {
    fn read(&self, session: &str) -> Result<Option<SimConfig>, AppError> {
        Ok(self.sessions.get(session).cloned())
    }

    fn write(&mut self, session: &str, config: &SimConfig) -> Result<(), AppError> {
        self.sessions.insert(session.to_string(), config.clone());
        Ok(())
    }

    fn delete(&mut self, session: &str) -> Result<bool, AppError> {
        Ok(self.sessions.remove(session).is_some())
    }
}
