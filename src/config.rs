use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_BATCH_LOAD_SIZE, DEFAULT_FONT_SIZE, DEFAULT_INVISIBLE_CHARACTERS};
use crate::renderer::font::BackendKind;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub font: FontSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FontSettings {
    pub path: Option<PathBuf>,
    pub size: u32,
    pub backend: BackendKind,
    pub antialias: bool,
    pub transparency: bool,
    pub hinting: bool,
    pub auto_hinting: bool,
    pub batch_load_size: u32,
    /// `[width, height]`; the host maximum when absent.
    pub max_page_texture_size: Option<[u32; 2]>,
    pub kerning_width: i32,
    pub kerning_height: i32,
    pub invisible: String,
    pub preload_ascii: bool,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            path: None,
            size: DEFAULT_FONT_SIZE,
            backend: BackendKind::default(),
            antialias: true,
            transparency: true,
            hinting: true,
            auto_hinting: true,
            batch_load_size: DEFAULT_BATCH_LOAD_SIZE,
            max_page_texture_size: None,
            kerning_width: 0,
            kerning_height: 0,
            invisible: DEFAULT_INVISIBLE_CHARACTERS.to_string(),
            preload_ascii: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Load the user config, falling back to defaults on any problem.
    pub fn load() -> Self {
        let config_path = match config_file_path() {
            Some(path) => path,
            None => return Config::default(),
        };

        if !config_path.exists() {
            return Config::default();
        }

        match Self::from_path(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}", e);
                Config::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub fn config_file_path() -> Option<PathBuf> {
    if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(config_dir).join("ttglyph").join("config.toml"))
    } else {
        dirs::config_dir().map(|dir| dir.join("ttglyph").join("config.toml"))
    }
}
