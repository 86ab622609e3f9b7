//! Configuration types for genbank-dl

use crate::classify::ClassificationRule;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

/// Remote release location and fetch tool settings
///
/// Used as a nested sub-config within [`Config`]; its fields are flattened so
/// the YAML file stays a flat key-value map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the release directory, with trailing slash
    /// (default: "https://ftp.ncbi.nih.gov/genbank/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Fixed suffix of archive file names (default: ".seq.gz")
    #[serde(default = "default_archive_suffix")]
    pub archive_suffix: String,

    /// Path to the fetch tool executable (auto-detected as `wget` if None)
    #[serde(default)]
    pub fetch_tool: Option<PathBuf>,

    /// Timeout for the listing request in seconds (default: 60)
    #[serde(default = "default_listing_timeout_secs")]
    pub listing_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            archive_suffix: default_archive_suffix(),
            fetch_tool: None,
            listing_timeout_secs: default_listing_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// Listing request timeout as a [`Duration`]
    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }
}

/// Main configuration, loaded once at process start
///
/// ```
/// use genbank_dl::Config;
///
/// let config = Config::from_yaml_str(
///     "source_path: /data/genbank\ndate: '2024-06'\nprefix: gbbct\nexclude_list: [Escherichia coli]\n",
/// ).unwrap();
/// assert_eq!(config.release_path(), std::path::Path::new("/data/genbank/2024-06"));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding release and extraction folders (default: "./genbank")
    #[serde(default = "default_source_path", alias = "db_path")]
    pub source_path: PathBuf,

    /// Release subdirectory under `source_path` (default: "latest")
    #[serde(default = "default_date")]
    pub date: String,

    /// Archive family selector, e.g. "gbbct" (default: "gbbct")
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Organism or taxon names to keep; empty keeps everything not excluded
    #[serde(default)]
    pub include_list: Vec<String>,

    /// Organism or taxon names to drop; always wins over `include_list`
    #[serde(default)]
    pub exclude_list: Vec<String>,

    /// Output subdirectory under `source_path` (default: "extract")
    #[serde(default = "default_extract_folder")]
    pub extract_folder: String,

    /// Classify and count only, never write output files (default: false)
    #[serde(default)]
    pub dry_run: bool,

    /// Worker pool size (default: 10)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Remote location settings
    #[serde(flatten)]
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            date: default_date(),
            prefix: default_prefix(),
            include_list: Vec::new(),
            exclude_list: Vec::new(),
            extract_folder: default_extract_folder(),
            dry_run: false,
            concurrency: default_concurrency(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Config {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml).map_err(|e| Error::Config {
            message: format!("invalid YAML: {}", e),
            key: None,
        })?;
        config.source_path = expand_home(&config.source_path);
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Self::from_yaml_str(&content)
    }

    /// Build from a flat key-value map
    ///
    /// List values are comma separated. Unknown keys are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut config = Config::default();

        for (key, value) in map {
            let value = value.trim();
            match key.as_str() {
                "source_path" | "db_path" => config.source_path = expand_home(Path::new(value)),
                "date" => config.date = value.to_string(),
                "prefix" => config.prefix = value.to_string(),
                "include_list" => config.include_list = split_list(value),
                "exclude_list" => config.exclude_list = split_list(value),
                "extract_folder" => config.extract_folder = value.to_string(),
                "dry_run" => config.dry_run = parse_value(key, value)?,
                "concurrency" => config.concurrency = parse_value(key, value)?,
                "base_url" => config.remote.base_url = value.to_string(),
                "archive_suffix" => config.remote.archive_suffix = value.to_string(),
                "fetch_tool" => config.remote.fetch_tool = Some(PathBuf::from(value)),
                "listing_timeout_secs" => {
                    config.remote.listing_timeout_secs = parse_value(key, value)?
                }
                other => tracing::debug!(key = other, "ignoring unknown configuration key"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        if self.prefix.is_empty() || !self.prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::config(
                "prefix",
                format!("'{}' is not an alphabetic archive prefix", self.prefix),
            ));
        }
        if self.remote.archive_suffix.is_empty() {
            return Err(Error::config("archive_suffix", "must not be empty"));
        }
        let url = url::Url::parse(&self.remote.base_url).map_err(|e| {
            Error::config("base_url", format!("'{}': {}", self.remote.base_url, e))
        })?;
        if !url.path().ends_with('/') {
            return Err(Error::config(
                "base_url",
                format!("'{}' must end with '/'", self.remote.base_url),
            ));
        }
        Ok(())
    }

    /// Directory holding the raw archive files for this release
    pub fn release_path(&self) -> PathBuf {
        self.source_path.join(&self.date)
    }

    /// Directory receiving the filtered outputs
    pub fn save_path(&self) -> PathBuf {
        self.source_path.join(&self.extract_folder)
    }

    /// The include/exclude rule described by this configuration
    pub fn classification_rule(&self) -> ClassificationRule {
        ClassificationRule::new(&self.include_list, &self.exclude_list)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::config(key, format!("'{}': {}", value, e)))
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn default_source_path() -> PathBuf {
    PathBuf::from("./genbank")
}

fn default_date() -> String {
    "latest".to_string()
}

fn default_prefix() -> String {
    "gbbct".to_string()
}

fn default_extract_folder() -> String {
    "extract".to_string()
}

fn default_concurrency() -> usize {
    10
}

fn default_base_url() -> String {
    "https://ftp.ncbi.nih.gov/genbank/".to_string()
}

fn default_archive_suffix() -> String {
    ".seq.gz".to_string()
}

fn default_listing_timeout_secs() -> u64 {
    60
}
