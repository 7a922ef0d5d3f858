//! Application settings: where the format service lives and how the window opens
//!
//! Stored as JSON under the platform config directory. Environment variables
//! and command-line flags override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::config::{
    APP_DIR, DEFAULT_PORT, DEFAULT_SERVER_URL, DEFAULT_TIMEOUT_SECS, ENV_PORT, ENV_SERVER_URL,
    FILENAME,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_window_width")]
    pub window_width: u16,
    #[serde(default = "default_window_height")]
    pub window_height: u16,
    /// Overrides the state file location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

// Default value functions
fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_window_width() -> u16 {
    1280
}

fn default_window_height() -> u16 {
    800
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            port: default_port(),
            request_timeout_secs: default_timeout(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            state_path: None,
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    /// Load from the default location, falling back to defaults on any problem
    pub fn load() -> Self {
        let path = Self::path();
        if !path.exists() {
            info!(path = %path.display(), "Settings file not found, writing defaults");
            let settings = Self::default();
            if let Err(e) = settings.save_to(&path) {
                warn!(path = %path.display(), error = ?e, "Failed to write default settings");
            }
            return settings;
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "Failed to load settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        let mut settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from {:?}", path))?;
        settings.validate_and_clamp();
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {:?}", path))?;
        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Apply `CLANG_FORMAT_URL` / `CLANG_FORMAT_PORT`
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_SERVER_URL).filter(|u| !u.trim().is_empty()) {
            self.server_url = url;
        }
        if let Some(raw) = lookup(ENV_PORT) {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.port = port,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {ENV_PORT}"),
            }
        }
        self.validate_and_clamp();
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, server_url: Option<String>, port: Option<u16>) {
        if let Some(url) = server_url {
            self.server_url = url;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self.validate_and_clamp();
    }

    /// Base URL of the format service, e.g. `http://localhost:8037`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.server_url.trim_end_matches('/'), self.port)
    }

    /// Where the durable state lives
    pub fn state_file(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(crate::persistence::FileStore::default_path)
    }

    /// Validate and clamp values to safe ranges
    fn validate_and_clamp(&mut self) {
        use crate::constants::validation::*;

        if self.server_url.trim().is_empty() {
            warn!("server_url is empty, using default");
            self.server_url = default_server_url();
        }

        if self.port == 0 {
            warn!(default = DEFAULT_PORT, "port 0 is not usable, using default");
            self.port = DEFAULT_PORT;
        }

        if self.request_timeout_secs < MIN_TIMEOUT_SECS {
            warn!(timeout = self.request_timeout_secs, min = MIN_TIMEOUT_SECS, "request_timeout_secs below minimum, clamping");
            self.request_timeout_secs = MIN_TIMEOUT_SECS;
        } else if self.request_timeout_secs > MAX_TIMEOUT_SECS {
            warn!(timeout = self.request_timeout_secs, max = MAX_TIMEOUT_SECS, "request_timeout_secs exceeds maximum, clamping");
            self.request_timeout_secs = MAX_TIMEOUT_SECS;
        }

        self.window_width = self.window_width.clamp(MIN_WINDOW_DIMENSION, MAX_WINDOW_DIMENSION);
        self.window_height = self.window_height.clamp(MIN_WINDOW_DIMENSION, MAX_WINDOW_DIMENSION);
    }
}
