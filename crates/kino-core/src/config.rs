//! Configuration management for the kino pipeline.
//!
//! Configuration is stored in TOML and layered in this order:
//!
//! 1. **Built-in defaults**: see [`Config::default`]
//! 2. **Config file**: `kino.toml` in the platform config directory, or an
//!    explicit path passed to [`Config::load_from`]
//! 3. **Environment variables**: `KINO_*` overrides, see [`Config::apply_env`]
//!
//! ## Example Configuration File
//!
//! ```toml
//! [fetch]
//! timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [pipeline]
//! rating_concurrency = 8
//! deadline_secs = 120
//! on_malformed = "fail"
//!
//! [cache]
//! listing_ttl_secs = 1800
//! rating_ttl_secs = 86400
//!
//! [site]
//! base_url = "http://csfd.cz"
//!
//! [[site.regions]]
//! code = "cz"
//! url = "http://www.csfd.cz/kino/?district-filter=0"
//! ```

use crate::{Error, Region, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP client settings
    pub fetch: FetchConfig,
    /// Extraction and fan-out settings
    pub pipeline: PipelineConfig,
    /// Memo lifetimes
    pub cache: CacheConfig,
    /// Target site and its region entry points
    pub site: SiteConfig,
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

/// Extraction and fan-out settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum rating fetches in flight at once.
    pub rating_concurrency: usize,
    /// Upper bound for one full aggregate run, in seconds.
    pub deadline_secs: u64,
    /// What to do with a cinema block or row that lacks an expected node.
    pub on_malformed: MalformedPolicy,
}

/// Handling of cinema blocks and rows with missing structural nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Abort the whole extraction with [`Error::Structure`].
    #[default]
    Fail,
    /// Log the problem and leave the entry out.
    Skip,
}

impl std::str::FromStr for MalformedPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(Error::Config(format!(
                "Unknown malformed-entry policy '{other}' (expected 'fail' or 'skip')"
            ))),
        }
    }
}

/// Memo lifetimes. Zero means entries never expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of the aggregate listing, in seconds.
    pub listing_ttl_secs: u64,
    /// Lifetime of a single title rating, in seconds.
    pub rating_ttl_secs: u64,
}

/// Target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base against which relative title links are resolved.
    pub base_url: String,
    /// Region entry points, extracted in this order.
    pub regions: Vec<Region>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("kinodnes/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rating_concurrency: 8,
            deadline_secs: 120,
            on_malformed: MalformedPolicy::Fail,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_ttl_secs: 30 * 60,
            rating_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://csfd.cz".to_string(),
            regions: vec![
                Region::new("cz", "http://www.csfd.cz/kino/?district-filter=0"),
                Region::new("sk", "http://www.csfd.cz/kino/filtr-2/?district-filter=55"),
            ],
        }
    }
}

impl FetchConfig {
    /// Request timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Connect timeout as a [`Duration`].
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl PipelineConfig {
    /// Aggregate deadline as a [`Duration`].
    pub const fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl CacheConfig {
    /// Listing lifetime, `None` when entries never expire.
    pub const fn listing_ttl(&self) -> Option<Duration> {
        ttl(self.listing_ttl_secs)
    }

    /// Rating lifetime, `None` when entries never expire.
    pub const fn rating_ttl(&self) -> Option<Duration> {
        ttl(self.rating_ttl_secs)
    }
}

const fn ttl(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

impl Config {
    /// Load configuration from the default location, then apply environment
    /// overrides. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined, the file
    /// exists but cannot be read or parsed, an environment override is invalid,
    /// or the resulting configuration fails validation.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::read_file(&path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply `KINO_*` overrides using `lookup` to read variables.
    ///
    /// Recognised variables: `KINO_TIMEOUT_SECS`, `KINO_RATING_CONCURRENCY`,
    /// `KINO_DEADLINE_SECS`, `KINO_ON_MALFORMED`, `KINO_BASE_URL`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("KINO_TIMEOUT_SECS") {
            self.fetch.timeout_secs = parse_number("KINO_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("KINO_RATING_CONCURRENCY") {
            self.pipeline.rating_concurrency = parse_number("KINO_RATING_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("KINO_DEADLINE_SECS") {
            self.pipeline.deadline_secs = parse_number("KINO_DEADLINE_SECS", &v)?;
        }
        if let Some(v) = lookup("KINO_ON_MALFORMED") {
            self.pipeline.on_malformed = v.parse()?;
        }
        if let Some(v) = lookup("KINO_BASE_URL") {
            self.site.base_url = v;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.rating_concurrency == 0 {
            return Err(Error::Config(
                "pipeline.rating_concurrency must be at least 1".into(),
            ));
        }
        if self.pipeline.deadline_secs == 0 {
            return Err(Error::Config("pipeline.deadline_secs must be at least 1".into()));
        }
        if self.site.regions.is_empty() {
            return Err(Error::Config("site.regions must not be empty".into()));
        }
        url::Url::parse(&self.site.base_url)
            .map_err(|e| Error::Config(format!("Invalid site.base_url: {e}")))?;
        Ok(())
    }

    /// Path of the default configuration file.
    ///
    /// - Linux: `~/.config/kinodnes/kino.toml`
    /// - macOS: `~/Library/Application Support/cz.kinodnes.kinodnes/kino.toml`
    /// - Windows: `%APPDATA%\kinodnes\kinodnes\config\kino.toml`
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("cz", "kinodnes", "kinodnes")
            .ok_or_else(|| Error::Config("Failed to determine project directories".into()))?;
        Ok(project_dirs.config_dir().join("kino.toml"))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a number, got '{value}'")))
}
