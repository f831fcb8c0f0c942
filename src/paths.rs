//! Application path management for portable and installed modes.
//!
//! - **Portable mode**: a `.portable` marker file next to the executable keeps
//!   config, controller store and logs in that directory.
//! - **Installed mode** (default): data lives in the platform data directory
//!   (`%APPDATA%\controlhub`, `~/.local/share/controlhub`, ...).

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::config::ManagerConfig;

/// Application name used for directories in installed mode
const APP_NAME: &str = "controlhub";

const CONFIG_FILE: &str = "config.yaml";
const STORE_FILE: &str = "controllers.json";

/// Where the binary reads and writes its files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config: PathBuf,
    /// Per-controller config store
    pub store: PathBuf,
    pub logs_dir: PathBuf,
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        // `cargo run` from a checkout with its own config.yaml
        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join(CONFIG_FILE).exists() {
                eprintln!("[paths] Running in DEV mode ({} found in cwd)", CONFIG_FILE);
                return Self::portable(&cwd);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::portable(&exe_dir);
        }

        let data_dir = dirs::data_dir().unwrap_or_else(|| {
            eprintln!("[paths] WARNING: no platform data directory, falling back to exe dir");
            exe_dir.clone()
        });
        Self::installed(&data_dir.join(APP_NAME))
    }

    /// Everything under `base`
    pub fn portable(base: &Path) -> Self {
        Self {
            config: base.join(CONFIG_FILE),
            store: base.join(".state").join(STORE_FILE),
            logs_dir: base.join("logs"),
            is_portable: true,
        }
    }

    /// Layout inside an application data directory
    pub fn installed(app_data: &Path) -> Self {
        Self {
            config: app_data.join(CONFIG_FILE),
            store: app_data.join("state").join(STORE_FILE),
            logs_dir: app_data.join("logs"),
            is_portable: false,
        }
    }

    /// Override the config file location (`--config`)
    pub fn with_config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = config.into();
        self
    }

    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Store file, honouring `config_store` from the config
    pub fn store_path(&self, config: &ManagerConfig) -> PathBuf {
        match &config.config_store {
            Some(path) if path.is_relative() => self.base_dir().join(path),
            Some(path) => path.clone(),
            None => self.store.clone(),
        }
    }

    /// Ensure the log and store directories exist
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir)
                .with_context(|| format!("Failed to create logs directory: {}", self.logs_dir.display()))?;
        }

        if let Some(store_dir) = self.store.parent() {
            if !store_dir.exists() {
                debug!("Creating state directory: {}", store_dir.display());
                std::fs::create_dir_all(store_dir)
                    .with_context(|| format!("Failed to create state directory: {}", store_dir.display()))?;
            }
        }

        Ok(())
    }
}
