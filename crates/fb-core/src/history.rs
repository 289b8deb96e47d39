use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use log::{info, warn};
use crate::error::Result;

pub const MAX_HISTORY: usize = 20;

/// Recently used prompts, newest first, without duplicates.
#[derive(Debug, Clone)]
pub struct PromptHistory {
    path: PathBuf,
    entries: VecDeque<String>,
}

impl PromptHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: VecDeque::with_capacity(MAX_HISTORY),
        }
    }

    /// Read the history file. A missing or unreadable file gives an empty
    /// history; this never fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut history = Self::new(path);

        if !history.path.exists() {
            warn!("No history file at {}, starting empty", history.path.display());
            return history;
        }

        let parsed = fs::read_to_string(&history.path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Vec<String>>(&text).map_err(|e| e.to_string()));

        match parsed {
            Ok(entries) => {
                history.entries = entries.into_iter().take(MAX_HISTORY).collect();
                info!("Loaded {} prompts from {}", history.entries.len(), history.path.display());
            }
            Err(e) => warn!("Ignoring unreadable history file {}: {e}", history.path.display()),
        }

        history
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `prompt` at the front unless it is empty or already known.
    /// Returns whether anything changed.
    pub fn add(&mut self, prompt: &str) -> bool {
        if prompt.is_empty() || self.contains(prompt) {
            return false;
        }

        self.entries.push_front(prompt.to_string());
        self.entries.truncate(MAX_HISTORY);
        true
    }

    pub fn contains(&self, prompt: &str) -> bool {
        self.entries.iter().any(|p| p == prompt)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.entries).map_err(std::io::Error::other)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        info!("Prompt history cleared");
        Ok(())
    }
}
