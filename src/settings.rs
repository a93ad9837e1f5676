// src/settings.rs
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "MUSICHANDLER_CONFIG";
const APP_DIR: &str = "musichandler";
const SETTINGS_FILE: &str = "settings.json";

const DEFAULT_AND_TAGS: &str = r"\s+(?:&|and|x|vs\.?)\s+|\s*,\s+";
const DEFAULT_FEATURE_TAGS: &str = r"\s+(?:feat\.?|ft\.?|featuring)\s+";
const DEFAULT_FEATURE2_TAGS: &str = r"\(\s*(?:feat\.?|ft\.?|featuring)\s+";
const DEFAULT_INVALID_TAGS: &str =
    r"official\s+(?:music\s+)?video|lyrics?\s+video|\((?:official\s+)?audio\)";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {} is not valid JSON", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write settings file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid regular expression in `{key}`")]
    Pattern {
        key: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("could not resolve path {raw:?}")]
    Path {
        raw: String,
        #[source]
        source: std::io::Error,
    },
}

/// Flat key-value settings persisted as pretty-printed JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub logging: bool,
    pub user_agent: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: Option<String>,
    pub access_secret: Option<String>,
    pub and_tags: String,
    pub feature_tags: String,
    pub feature2_tags: String,
    pub invalid_tags: String,

    #[serde(skip)]
    path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let music = dirs::home_dir()
            .map(|home| home.join("Music"))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            source: music.join("Downloads"),
            destination: music.join("Library"),
            logging: true,
            user_agent: format!("musichandler_rs/{}", env!("CARGO_PKG_VERSION")),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            access_token: None,
            access_secret: None,
            and_tags: DEFAULT_AND_TAGS.to_string(),
            feature_tags: DEFAULT_FEATURE_TAGS.to_string(),
            feature2_tags: DEFAULT_FEATURE2_TAGS.to_string(),
            invalid_tags: DEFAULT_INVALID_TAGS.to_string(),
            path: PathBuf::new(),
        }
    }
}

/// Compiled, case-insensitive versions of the regex settings.
#[derive(Debug, Clone)]
pub struct Patterns {
    /// Splits collaborating artists ("A & B", "A, B").
    pub separators: Regex,
    /// Inline featuring markers (" feat. ", " featuring ").
    pub featuring: Regex,
    /// Parenthesized featuring markers ("(feat. ").
    pub featuring_paren: Regex,
    /// Names that mark a download as something other than a plain track.
    pub invalid: Regex,
}

impl Settings {
    /// Location used when neither `--config` nor the environment names one.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(SETTINGS_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut settings: Settings =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.path = path.to_path_buf();

        Ok(settings)
    }

    /// Load the settings file, writing the defaults first if it does not exist.
    pub fn load_or_init(path: &Path) -> Result<(Self, bool), ConfigError> {
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }

        let settings = Settings {
            path: path.to_path_buf(),
            ..Settings::default()
        };
        settings.save()?;

        Ok((settings, true))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)
            .map_err(ConfigError::Serialize)?;
        buf.push(b'\n');

        fs::write(&self.path, buf).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn set_source(&mut self, raw: &str) -> Result<PathBuf, ConfigError> {
        let path = resolve_path(raw)?;
        self.source = path.clone();
        self.save()?;
        Ok(path)
    }

    pub fn set_destination(&mut self, raw: &str) -> Result<PathBuf, ConfigError> {
        let path = resolve_path(raw)?;
        self.destination = path.clone();
        self.save()?;
        Ok(path)
    }

    pub fn set_logging(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.logging = enabled;
        self.save()
    }

    pub fn has_tokens(&self) -> bool {
        self.access_token.is_some() && self.access_secret.is_some()
    }

    pub fn store_tokens(&mut self, token: String, secret: String) -> Result<(), ConfigError> {
        self.access_token = Some(token);
        self.access_secret = Some(secret);
        self.save()
    }

    pub fn clear_tokens(&mut self) -> Result<(), ConfigError> {
        self.access_token = None;
        self.access_secret = None;
        self.save()
    }

    pub fn patterns(&self) -> Result<Patterns, ConfigError> {
        Ok(Patterns {
            separators: compile("and_tags", &self.and_tags)?,
            featuring: compile("feature_tags", &self.feature_tags)?,
            featuring_paren: compile("feature2_tags", &self.feature2_tags)?,
            invalid: compile("invalid_tags", &self.invalid_tags)?,
        })
    }

    /// Key/value pairs in file order, with credentials masked.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("source", self.source.display().to_string()),
            ("destination", self.destination.display().to_string()),
            ("logging", self.logging.to_string()),
            ("user_agent", self.user_agent.clone()),
            ("consumer_key", mask(Some(&self.consumer_key))),
            ("consumer_secret", mask(Some(&self.consumer_secret))),
            ("access_token", mask(self.access_token.as_deref())),
            ("access_secret", mask(self.access_secret.as_deref())),
            ("and_tags", self.and_tags.clone()),
            ("feature_tags", self.feature_tags.clone()),
            ("feature2_tags", self.feature2_tags.clone()),
            ("invalid_tags", self.invalid_tags.clone()),
        ]
    }
}

fn compile(key: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::Pattern { key, source })
}

fn mask(value: Option<&str>) -> String {
    match value {
        None => "(unset)".to_string(),
        Some("") => "(empty)".to_string(),
        Some(_) => "********".to_string(),
    }
}

/// Expand `~` and make `raw` absolute against the working directory.
/// The path does not need to exist.
pub fn resolve_path(raw: &str) -> Result<PathBuf, ConfigError> {
    let expanded = PathBuf::from(shellexpand::tilde(raw.trim()).as_ref());

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map_err(|source| ConfigError::Path {
                raw: raw.to_string(),
                source,
            })?
            .join(expanded)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    Ok(normalized)
}
