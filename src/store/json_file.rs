//! JSON file implementation of the rule store.
//!
//! Persists the collection as a pretty-printed JSON array. Writes go to a
//! sibling temp file first and are renamed into place, so a crashed write
//! never leaves a half-written snapshot behind.

use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::rule::Rule;
use crate::error::StoreError;

use super::RuleStore;

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store at the given path, creating parent directories.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Write(format!("{}: {}", parent.display(), e)))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl RuleStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Rule>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.path.display(), e)))?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, rules: &[Rule]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(rules)
            .map_err(|e| StoreError::Write(e.to_string()))?;

        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| StoreError::Write(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| StoreError::Write(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}
