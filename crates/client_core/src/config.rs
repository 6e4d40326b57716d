use std::{collections::HashMap, fs, path::Path, time::Duration};

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub typing_debounce: Duration,
    /// Local fallback for a dropped stop-typing event. `None` keeps an
    /// indicator until the server clears it.
    pub typing_expiry: Option<Duration>,
    pub event_buffer: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".into(),
            typing_debounce: Duration::from_millis(1000),
            typing_expiry: None,
            event_buffer: 1024,
        }
    }
}

/// Defaults, then `client.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();
    let path = Path::new(DEFAULT_SETTINGS_FILE);
    if path.exists() {
        if let Err(err) = apply_file(&mut settings, path) {
            warn!(error = %err, "ignoring client settings file");
        }
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub fn apply_file(settings: &mut ClientSettings, path: &Path) -> Result<(), ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file_cfg =
        toml::from_str::<HashMap<String, toml::Value>>(&raw).map_err(|source| {
            ConfigError::Parse {
                path: path.display().to_string(),
                source,
            }
        })?;
    apply_values(settings, |key| {
        file_cfg.get(key).map(|value| match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    });
    Ok(())
}

pub fn apply_env(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CHAT_SERVER_URL") {
        settings.server_url = v;
    }
    apply_values(settings, |key| {
        lookup(&format!("APP__{}", key.to_ascii_uppercase()))
    });
}

fn apply_values(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("server_url") {
        settings.server_url = v;
    }
    if let Some(ms) =
        lookup("typing_debounce_ms").and_then(|v| parse_u64("typing_debounce_ms", &v))
    {
        settings.typing_debounce = Duration::from_millis(ms);
    }
    if let Some(v) = lookup("typing_expiry_ms") {
        settings.typing_expiry = match parse_u64("typing_expiry_ms", &v) {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => settings.typing_expiry,
        };
    }
    if let Some(size) = lookup("event_buffer").and_then(|v| parse_u64("event_buffer", &v)) {
        settings.event_buffer = size.max(1) as usize;
    }
}

fn parse_u64(key: &str, raw: &str) -> Option<u64> {
    match raw.trim().parse::<u64>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value = raw, "ignoring non-numeric client setting");
            None
        }
    }
}
