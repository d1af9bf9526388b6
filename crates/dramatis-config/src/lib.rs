use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Settings for aligning scripts against a reference text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// JSON reference text (with any backing languages) to align against.
    pub reference_text_path: PathBuf,

    /// Leading glyph that marks speech in the vernacular, e.g. `—`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_quote_mark: Option<String>,

    /// Cap on how many blocks one matchup window may take.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_matchup_blocks: Option<usize>,

    #[serde(default)]
    pub apply_narrator_overrides: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrator_overrides_path: Option<PathBuf>,
}

impl Config {
    pub fn new(reference_text_path: impl Into<PathBuf>) -> Self {
        Self {
            reference_text_path: reference_text_path.into(),
            dialogue_quote_mark: None,
            max_matchup_blocks: None,
            apply_narrator_overrides: false,
            narrator_overrides_path: None,
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the loaded paths
        config.reference_text_path =
            Self::expand_path(&config.reference_text_path).unwrap_or(config.reference_text_path);
        config.narrator_overrides_path = config
            .narrator_overrides_path
            .map(|path| Self::expand_path(&path).unwrap_or(path));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/dramatis");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// The dialogue mark, if one is set and not blank.
    pub fn dialogue_quote_mark(&self) -> Option<&str> {
        self.dialogue_quote_mark
            .as_deref()
            .map(str::trim)
            .filter(|mark| !mark.is_empty())
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
