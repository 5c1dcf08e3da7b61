//! Layered configuration.
//!
//! Values are merged in increasing priority: builtin defaults, a config file
//! (`quipx.toml` in the platform config directory, or an explicit path in
//! TOML, YAML or JSON), `QUIPX_*` environment variables, then [`Overrides`]
//! collected from the command line.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
pub use quipx_export::ExportFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://platform.quip.com:443/1";
pub const DEFAULT_SITE_HOST: &str = quipx_export::DEFAULT_SITE_HOST;
pub const CONFIG_FILE_NAME: &str = "quipx.toml";
pub const ENV_PREFIX: &str = "QUIPX_";
/// Directory created under the destination to hold the export.
pub const EXPORT_DIR_NAME: &str = "quip-export";
/// Archive written under the destination instead, with `zip`.
pub const ARCHIVE_FILE_NAME: &str = "quip-export.zip";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Personal access token.
    pub token: Option<String>,
    pub api_url: String,
    pub site_host: String,
    pub destination: PathBuf,
    /// Inline the stylesheet in every document instead of linking `document.css`.
    pub embedded_styles: bool,
    /// Inline images as data URIs instead of saving them under `blobs/`.
    pub embedded_images: bool,
    pub comments: bool,
    pub format: ExportFormat,
    pub references: bool,
    pub group_folders: bool,
    /// Root folder ids. Empty means the account's default folders.
    pub folders: Vec<String>,
    /// Regular expression of export paths to skip.
    pub exclude: Option<String>,
    /// Write one zip archive instead of a directory tree.
    pub zip: bool,
    /// Only write `index.html` listing the tree; no document content is fetched.
    pub only_index: bool,
    pub debug: bool,
    /// Also write the log to `export.log` in the export directory.
    pub log_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            site_host: DEFAULT_SITE_HOST.to_string(),
            destination: PathBuf::from("."),
            embedded_styles: false,
            embedded_images: false,
            comments: false,
            format: ExportFormat::Html,
            references: true,
            group_folders: false,
            folders: Vec::new(),
            exclude: None,
            zip: false,
            only_index: false,
            debug: false,
            log_file: false,
        }
    }
}

/// Values set on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_styles: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_images: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ExportFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_folders: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folders: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_index: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<bool>,
}

/// `quipx.toml` in the platform config directory, if one can be determined.
pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "quipx").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Merge every layer into a validated [`Config`].
///
/// An explicit `file` must exist. Without one the default config file is
/// used when present.
pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    match file {
        Some(path) => {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
            }
            figment = merge_file(figment, path)?;
        },
        None => {
            if let Some(path) = default_config_file().filter(|path| path.is_file()) {
                tracing::debug!(path = %path.display(), "Using default config file");
                figment = merge_file(figment, &path)?;
            }
        },
    }
    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX))
        .merge(Serialized::defaults(overrides))
        .extract()
        .or_raise(|| ErrorKind::Load)?;
    config.validate()
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

impl Config {
    /// Checks that an export can start and makes the destination absolute.
    pub fn validate(mut self) -> Result<Self> {
        if self.token.as_deref().is_none_or(|token| token.trim().is_empty()) {
            exn::bail!(ErrorKind::MissingToken);
        }
        if self.destination.exists() && !self.destination.is_dir() {
            exn::bail!(ErrorKind::InvalidDestination(self.destination));
        }
        self.destination = std::path::absolute(&self.destination)
            .or_raise(|| ErrorKind::InvalidDestination(self.destination.clone()))?;
        if let Some(pattern) = &self.exclude {
            regex::Regex::new(pattern).or_raise(|| ErrorKind::InvalidPattern(pattern.clone()))?;
        }
        self.folders.retain(|id| !id.trim().is_empty());
        Ok(self)
    }

    /// Token after validation. Empty before.
    pub fn token(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }

    pub fn export_dir(&self) -> PathBuf {
        self.destination.join(EXPORT_DIR_NAME)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.destination.join(ARCHIVE_FILE_NAME)
    }

    /// Where `export.log` goes: next to the archive, or inside the export
    /// directory.
    pub fn log_dir(&self) -> PathBuf {
        if self.zip { self.destination.clone() } else { self.export_dir() }
    }

    /// `None` selects the account's default folders.
    pub fn root_folders(&self) -> Option<Vec<String>> {
        (!self.folders.is_empty()).then(|| self.folders.clone())
    }
}
