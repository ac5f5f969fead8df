use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Public SparkPost API host, used when the settings file names none
pub const DEFAULT_HOST: &str = "api.sparkpost.com";

/// Settings file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sparkpost.ini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {path}")]
    Load {
        path: String,
        source: config::ConfigError,
    },
}

/// Connection parameters shared by every request of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub api_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct IniFile {
    #[serde(default, rename = "SparkPost", alias = "sparkpost")]
    sparkpost: Option<SparkPostSection>,
}

#[derive(Debug, Default, Deserialize)]
struct SparkPostSection {
    #[serde(default, rename = "Host", alias = "host")]
    host: Option<String>,
    #[serde(default, rename = "Authorization", alias = "authorization")]
    authorization: Option<String>,
}

impl Settings {
    /// Load the `[SparkPost]` section of an INI file.
    ///
    /// A missing file or missing `Host` falls back to [`DEFAULT_HOST`]. A missing
    /// `Authorization` is only warned about; the API rejects the first request.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = File::from(path).format(FileFormat::Ini).required(false);
        Self::build(Config::builder().add_source(source), path)
    }

    /// Parse settings from INI text
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let source = File::from_str(text, FileFormat::Ini);
        Self::build(Config::builder().add_source(source), Path::new("<inline>"))
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        path: &Path,
    ) -> Result<Self, ConfigError> {
        let load_err = |source| ConfigError::Load {
            path: path.display().to_string(),
            source,
        };
        let ini: IniFile = builder
            .build()
            .map_err(load_err)?
            .try_deserialize()
            .map_err(load_err)?;

        let section = ini.sparkpost.unwrap_or_default();
        let host = section
            .host
            .as_deref()
            .map(strip_quotes)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_HOST)
            .to_string();
        let api_key = section
            .authorization
            .as_deref()
            .map(strip_quotes)
            .unwrap_or_default()
            .to_string();

        if api_key.is_empty() {
            warn!(path = %path.display(), "no Authorization in [SparkPost] section");
        }
        debug!(%host, "loaded settings");

        Ok(Self { host, api_key })
    }

    /// Base URL for API requests; bare hosts are assumed to speak HTTPS
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("https://") || host.starts_with("http://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            api_key: String::new(),
        }
    }
}

/// Strip one pair of matching surrounding quotes, if present
pub fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
