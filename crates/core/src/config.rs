use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    /// Inbox file to observe. Defaults to `~/.peerbridge/command.txt`.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_read_attempts")]
    pub read_attempts: u32,
    #[serde(default = "default_read_retry_delay_ms")]
    pub read_retry_delay_ms: u64,
    /// Attachment referenced when the inbox text names no existing file.
    #[serde(default)]
    pub default_attachment: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub fallback_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_read_attempts() -> u32 {
    5
}

fn default_read_retry_delay_ms() -> u64 {
    200
}

fn default_queue_size() -> usize {
    32
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            file: None,
            debounce_ms: default_debounce_ms(),
            read_attempts: default_read_attempts(),
            read_retry_delay_ms: default_read_retry_delay_ms(),
            default_attachment: None,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            log_file: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn inbox_file(&self, paths: &Paths) -> PathBuf {
        self.watch.file.clone().unwrap_or_else(|| paths.inbox_file())
    }

    pub fn default_attachment(&self, paths: &Paths) -> PathBuf {
        self.watch
            .default_attachment
            .clone()
            .unwrap_or_else(|| paths.attachment_file())
    }

    pub fn response_file(&self, paths: &Paths) -> PathBuf {
        self.response
            .file
            .clone()
            .unwrap_or_else(|| paths.response_file())
    }

    pub fn fallback_response_file(&self, paths: &Paths) -> PathBuf {
        self.response
            .fallback_file
            .clone()
            .unwrap_or_else(|| paths.fallback_response_file())
    }

    pub fn log_file(&self, paths: &Paths) -> PathBuf {
        self.bridge
            .log_file
            .clone()
            .unwrap_or_else(|| paths.log_file())
    }
}
