use std::env;
use std::path::{Path, PathBuf};
use log::{debug, info};
use serde::Deserialize;
use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api-key.fusionbrain.ai/";
pub const DEFAULT_OUTPUT_DIR: &str = "Generated_Images";
pub const DEFAULT_HISTORY_FILE: &str = "prompt_history.json";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// API credentials. Loaded once at startup and never changed afterwards.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    api_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!("{} not found", path.display())));
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

        let creds: Credentials = serde_json::from_str(&text).map_err(|e| {
            Error::Config(format!(
                "{} must be a JSON object with api_key and secret_key: {e}",
                path.display()
            ))
        })?;

        if creds.api_key.trim().is_empty() || creds.secret_key.trim().is_empty() {
            return Err(Error::Config("api_key and secret_key must not be empty".into()));
        }

        info!("Loaded credentials from {}", path.display());
        Ok(creds)
    }

    pub fn key_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    pub fn secret_header(&self) -> String {
        format!("Secret {}", self.secret_key)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("secret_key", &"***")
            .finish()
    }
}

/// Process-wide settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_url: String,
    pub output_dir: PathBuf,
    pub history_file: PathBuf,
    pub config_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => log::warn!("Ignoring unreadable .env file: {e}"),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_url: non_empty("FB_API_URL").unwrap_or(defaults.api_url),
            output_dir: non_empty("FB_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            history_file: non_empty("FB_HISTORY_FILE").map(PathBuf::from).unwrap_or(defaults.history_file),
            config_file: non_empty("FB_CONFIG_FILE").map(PathBuf::from).unwrap_or(defaults.config_file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn write(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{"api_key":"abc","secret_key":"xyz"}"#);

        let creds = Credentials::load(&path).unwrap();
        assert_eq!(creds.key_header(), "Key abc");
        assert_eq!(creds.secret_header(), "Secret xyz");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{"api_key":"abc"}"#);
        assert!(matches!(Credentials::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{"api_key":"","secret_key":"xyz"}"#);
        assert!(matches!(Credentials::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials::new("abc", "xyz");
        let out = format!("{creds:?}");
        assert!(!out.contains("abc"));
        assert!(!out.contains("xyz"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FB_API_URL", "http://localhost:9000/"),
            ("FB_OUTPUT_DIR", "out"),
            ("FB_HISTORY_FILE", ""),
        ]);
        let conf = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(conf.api_url, "http://localhost:9000/");
        assert_eq!(conf.output_dir, PathBuf::from("out"));
        assert_eq!(conf.history_file, PathBuf::from(DEFAULT_HISTORY_FILE));
        assert_eq!(conf.config_file, PathBuf::from(DEFAULT_CONFIG_FILE));
    }
}
