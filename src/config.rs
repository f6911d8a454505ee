//! User configuration — default report settings and persistence.
//!
//! Settings are stored as a simple key-value text file at
//! `$XDG_CONFIG_HOME/siztree/config.toml` (default `~/.config/siztree/config.toml`).
//! Command-line flags override anything read from the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::core::size::Units;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Max print depth (root = 0).  Negative prints only the total.
    pub level: i64,
    /// Worker threads for the walk; 0 picks the available parallelism.
    pub jobs: usize,
    /// Sort siblings by file name.
    pub sort: bool,
    pub units: Units,
    /// Give up on the walk after this many seconds; 0 waits forever.
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            level: 1,
            jobs: 0,
            sort: false,
            units: Units::Iec,
            timeout_secs: 0,
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    // ── persistence ─────────────────────────────────────────────

    /// Load config from disk, falling back to defaults.
    pub fn load() -> Self {
        let path = config_path();
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => return Self::parse_config(&contents),
                Err(err) => tracing::warn!("ignoring {}: {err}", path.display()),
            }
        }
        Self::default()
    }

    /// Persist current config to disk and return where it went.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&path, self.serialise())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    fn parse_config(s: &str) -> Self {
        let mut config = Self::default();

        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');

            match key {
                "level" => {
                    if let Ok(v) = value.parse() {
                        config.level = v;
                    }
                }
                "jobs" => {
                    if let Ok(v) = value.parse() {
                        config.jobs = v;
                    }
                }
                "sort" => config.sort = value == "true",
                "units" => {
                    if let Some(units) = Units::from_config_key(value) {
                        config.units = units;
                    }
                }
                "timeout_secs" => {
                    if let Ok(v) = value.parse() {
                        config.timeout_secs = v;
                    }
                }
                _ => tracing::debug!(key, "unknown config key"),
            }
        }

        config
    }

    fn serialise(&self) -> String {
        let lines = [
            "# siztree configuration".to_string(),
            String::new(),
            "# Tree levels to print (root = 0, negative = total only)".to_string(),
            format!("level = {}", self.level),
            "# Worker threads (0 = one per core)".to_string(),
            format!("jobs = {}", self.jobs),
            format!("sort = {}", self.sort),
            "# iec (KiB, MiB, ...) or si (kB, MB, ...)".to_string(),
            format!("units = {}", self.units.config_key()),
            "# Abandon the walk after this many seconds (0 = never)".to_string(),
            format!("timeout_secs = {}", self.timeout_secs),
            String::new(),
        ];
        lines.join("\n")
    }
}

/// Return the config file path (`$XDG_CONFIG_HOME/siztree/config.toml`).
fn config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".config")
        });
    config_dir.join("siztree").join("config.toml")
}
