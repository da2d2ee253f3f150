//! Local UI preferences.
//!
//! Only presentation settings are stored on disk, at
//! `<config_dir>/podoru/preferences.json`. Credentials never are.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The preferences directory name under the config dir.
const PREFERENCES_DIR: &str = "podoru";

/// The preferences file name.
const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = PreferencesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(PreferencesError::UnknownTheme(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default)]
    pub sidebar_collapsed: bool,
    #[serde(default)]
    pub theme: Theme,
}

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("no configuration directory on this platform")]
    NoConfigDir,

    #[error("failed to write preferences to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unknown theme '{0}' (expected light, dark or system)")]
    UnknownTheme(String),
}

/// Loads and saves [`Preferences`].
#[derive(Debug, Clone)]
pub struct PreferencesManager {
    path: PathBuf,
}

impl PreferencesManager {
    /// Manager for the platform config directory.
    pub fn new() -> Result<Self, PreferencesError> {
        let config = dirs::config_dir().ok_or(PreferencesError::NoConfigDir)?;
        Ok(Self::with_path(config.join(PREFERENCES_DIR).join(PREFERENCES_FILE)))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load(&self) -> Preferences {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return Preferences::default(),
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(preferences) => preferences,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "Ignoring unreadable preferences");
                Preferences::default()
            }
        }
    }

    /// Save preferences, creating the parent directory if needed.
    pub fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        let io_error = |source| PreferencesError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let file = File::create(&self.path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, preferences)?;
        writer.flush().map_err(io_error)
    }

    /// Load, modify and save in one step.
    pub fn update(&self, change: impl FnOnce(&mut Preferences)) -> Result<Preferences, PreferencesError> {
        let mut preferences = self.load();
        change(&mut preferences);
        self.save(&preferences)?;
        Ok(preferences)
    }
}
