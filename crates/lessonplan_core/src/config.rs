//! Application configuration.
//!
//! # Responsibility
//! - Deserialize the TOML configuration file.
//! - Resolve relative paths against the configuration file directory.
//! - Reject inconsistent backend combinations before any session opens.
//!
//! # Invariants
//! - Credentials never live in the file; only the name of the environment
//!   variable holding the token does.

use crate::logging::default_log_level;
use crate::source::SourceLocation;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "LESSONPLAN_CONFIG";
/// Configuration file used when `LESSONPLAN_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "lessonplan.toml";
/// Default environment variable holding the spreadsheet access token.
pub const DEFAULT_TOKEN_ENV: &str = "LESSONPLAN_SHEET_TOKEN";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub curriculum: CurriculumConfig,
    #[serde(default)]
    pub notes: NotesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurriculumConfig {
    /// CSV path or http(s) export URL.
    pub source: String,
}

/// Which store holds practice notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotesBackend {
    /// Local SQLite file.
    #[default]
    Sqlite,
    /// Spreadsheet read as CSV export and appended through its values API.
    Sheet,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotesConfig {
    pub backend: NotesBackend,
    /// SQLite file for the `sqlite` backend.
    pub db_path: String,
    /// CSV export path or URL for the `sheet` backend.
    pub source: Option<String>,
    /// Values-append endpoint for the `sheet` backend.
    pub append_endpoint: Option<String>,
    pub token_env: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            backend: NotesBackend::Sqlite,
            db_path: "lessonplan_notes.sqlite3".to_string(),
            source: None,
            append_endpoint: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory; logging stays off when unset.
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

impl AppConfig {
    /// Parses and validates configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str::<AppConfig>(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SourceLocation::parse(&self.curriculum.source).map_err(|err| {
            ConfigError::Invalid(format!("curriculum.source: {err}"))
        })?;

        match self.notes.backend {
            NotesBackend::Sqlite => {
                if self.notes.db_path.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "notes.db_path must not be blank for the sqlite backend".to_string(),
                    ));
                }
            }
            NotesBackend::Sheet => {
                let source = self.notes.source.as_deref().unwrap_or("");
                SourceLocation::parse(source).map_err(|err| {
                    ConfigError::Invalid(format!("notes.source (sheet backend): {err}"))
                })?;
                let endpoint = self.notes.append_endpoint.as_deref().unwrap_or("");
                if !matches!(SourceLocation::parse(endpoint), Ok(SourceLocation::Url(_))) {
                    return Err(ConfigError::Invalid(
                        "notes.append_endpoint must be an http(s) URL for the sheet backend"
                            .to_string(),
                    ));
                }
                if self.notes.token_env.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "notes.token_env must not be blank".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Rewrites relative local paths so they resolve against `base_dir`.
    pub fn resolve_relative_paths(&mut self, base_dir: &Path) {
        rebase_location(&mut self.curriculum.source, base_dir);
        if let Some(source) = self.notes.source.as_mut() {
            rebase_location(source, base_dir);
        }
        rebase_location(&mut self.notes.db_path, base_dir);
    }
}

/// Reads, validates and rebases the configuration file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = AppConfig::from_toml_str(&text)?;
    if let Some(base_dir) = path.parent() {
        config.resolve_relative_paths(base_dir);
    }
    Ok(config)
}

/// Configuration path from `LESSONPLAN_CONFIG`, else `lessonplan.toml`.
pub fn config_path_from_env() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn rebase_location(value: &mut String, base_dir: &Path) {
    if let Ok(SourceLocation::Path(path)) = SourceLocation::parse(value) {
        if path.is_relative() {
            *value = base_dir.join(path).display().to_string();
        }
    }
}
