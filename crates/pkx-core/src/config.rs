use crate::CoreError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// User defaults for `pkx`, overridden by command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PkxConfig {
    /// Local package repository that bare package ids resolve against.
    pub repository: PathBuf,
    /// Relative output root for wrapped modules.
    pub output: Option<String>,
    pub jobs: usize,
    pub polyfill: bool,
}

impl Default for PkxConfig {
    fn default() -> Self {
        Self {
            repository: PathBuf::from("repository"),
            output: None,
            jobs: 4,
            polyfill: true,
        }
    }
}

impl PkxConfig {
    /// Load from `$PKX_CONFIG`, else `~/.config/pkx/config.toml`.
    ///
    /// A missing file yields the defaults.
    pub fn load_default() -> Result<Self, CoreError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))
    }
}

fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("PKX_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/pkx/config.toml"))
}
