// src/config.rs - ~/.logcat-color.yaml and named profiles
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;
use crate::format::FormatKind;
use crate::pipeline::filters::{
    ExcludeTagFilter, FilterStage, MessageFilter, PriorityFilter, TagFilter,
};
use crate::producer::DeviceSelector;

pub const CONFIG_FILE_NAME: &str = ".logcat-color.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the adb binary
    pub adb: Option<String>,
    pub stay_connected: bool,
    pub wrap: Option<bool>,
    pub keep_format: bool,
    pub tag_width: Option<usize>,
    pub pid_width: Option<usize>,
    pub profiles: HashMap<String, Profile>,
}

/// `true` selects the only device/emulator, a string names a serial
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DeviceSpec {
    Flag(bool),
    Serial(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub priorities: Vec<String>,
    /// Regexes, each of which the message must match
    pub filters: Vec<String>,
    pub buffers: Vec<String>,
    pub device: Option<DeviceSpec>,
    pub emulator: Option<DeviceSpec>,
    pub format: Option<String>,
    pub wrap: Option<bool>,
}

/// `~/.logcat-color.yaml`
pub fn default_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(CONFIG_FILE_NAME))
}

/// Load the config file. An explicit path must exist; the default one is
/// optional.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(path) if !path.is_file() => return Err(ConfigError::FileNotFound(path.to_path_buf())),
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Some(path) if path.is_file() => path,
            _ => {
                debug!("no config file, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "loaded config");
    Config::from_yaml(&text, &path)
}

impl Config {
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        // an empty file is a valid, empty config
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// `adb` on the PATH, overridden by `$ADB`, overridden by the config
    pub fn adb_program(&self, env_adb: Option<String>) -> String {
        self.adb
            .clone()
            .or(env_adb)
            .unwrap_or_else(|| "adb".to_string())
    }
}

impl Profile {
    pub fn format(&self) -> Result<Option<FormatKind>, ConfigError> {
        self.format.as_deref().map(FormatKind::from_name).transpose()
    }

    /// `device` wins over `emulator` when both are set
    pub fn device_selector(&self) -> Option<DeviceSelector> {
        let device = match &self.device {
            Some(DeviceSpec::Serial(serial)) => Some(DeviceSelector::Serial(serial.clone())),
            Some(DeviceSpec::Flag(true)) => Some(DeviceSelector::Device),
            _ => None,
        };
        let emulator = match &self.emulator {
            Some(DeviceSpec::Serial(serial)) => Some(DeviceSelector::Serial(serial.clone())),
            Some(DeviceSpec::Flag(true)) => Some(DeviceSelector::Emulator),
            _ => None,
        };
        device.or(emulator)
    }

    /// Predicates in a fixed order: tags, excluded tags, priorities, message
    /// patterns
    pub fn build_filters(&self, name: &str) -> Result<FilterStage, ConfigError> {
        let mut stage = FilterStage::new();
        if !self.tags.is_empty() {
            stage.add_predicate(Box::new(TagFilter::new(self.tags.iter().cloned())));
        }
        if !self.exclude_tags.is_empty() {
            stage.add_predicate(Box::new(ExcludeTagFilter::new(self.exclude_tags.iter().cloned())));
        }
        if !self.priorities.is_empty() {
            stage.add_predicate(Box::new(PriorityFilter::new(&self.priorities)));
        }
        for pattern in &self.filters {
            let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                profile: name.to_string(),
                pattern: pattern.clone(),
                source,
            })?;
            stage.add_predicate(Box::new(MessageFilter::new(regex)));
        }
        Ok(stage)
    }
}
