// Configuration layer.
// Defaults, then grove.toml, --config-file, GROVE__* env and CLI flags.

mod cli;

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::browser::{BrowserOptions, DEFAULT_MAX_PREVIEW_BYTES, SCHEMA_VERSION};
use crate::cache::{DEFAULT_TREE_TTL, paths};
use crate::error::GroveError;
use crate::github::GITHUB_API_BASE;
use crate::highlight::DEFAULT_THEME;

pub use cli::{CacheArgs, CacheCommand, CliArgs, Command, ShowArgs, TreeArgs};

const LOCAL_CONFIG_BASENAME: &str = "grove";
const ENV_PREFIX: &str = "GROVE";
const DEFAULT_MAX_TREES: usize = 20;
const DEFAULT_MAX_BLOBS: usize = 200;
const DEFAULT_MAX_HIGHLIGHTS: usize = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cache: CacheSettings,
    pub github: GitHubSettings,
    pub logging: LoggingSettings,
    pub highlight: HighlightSettings,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// `None` when no platform cache directory could be determined.
    pub dir: Option<PathBuf>,
    pub tree_ttl: Duration,
    pub max_trees: usize,
    pub max_blobs: usize,
    pub max_highlights: usize,
    pub max_preview_bytes: u64,
    pub schema_version: u32,
}

#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub api_base: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct HighlightSettings {
    pub theme: String,
}

impl Settings {
    /// Options for the repository browser's caches.
    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            tree_ttl: self.cache.tree_ttl,
            max_trees: self.cache.max_trees,
            max_blobs: self.cache.max_blobs,
            max_highlights: self.cache.max_highlights,
            max_preview_bytes: self.cache.max_preview_bytes,
            schema_version: self.cache.schema_version,
            theme: self.highlight.theme.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

impl From<LoadError> for GroveError {
    fn from(err: LoadError) -> Self {
        GroveError::Config(err.to_string())
    }
}

/// Parse the command line and load settings for it.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

/// Load settings using the configured precedence.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder =
        Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__"),
    );

    let mut raw = build_raw(builder)?;
    raw.apply_cli_overrides(cli);
    Settings::from_raw(raw)
}

fn build_raw(builder: ConfigBuilder<DefaultState>) -> Result<RawSettings, LoadError> {
    Ok(builder.build()?.try_deserialize()?)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    cache: RawCacheSettings,
    github: RawGitHubSettings,
    logging: RawLoggingSettings,
    highlight: RawHighlightSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    dir: Option<PathBuf>,
    tree_ttl_seconds: Option<u64>,
    max_trees: Option<usize>,
    max_blobs: Option<usize>,
    max_highlights: Option<usize>,
    max_preview_bytes: Option<u64>,
    schema_version: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGitHubSettings {
    api_base: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHighlightSettings {
    theme: Option<String>,
}

impl RawSettings {
    fn apply_cli_overrides(&mut self, cli: &CliArgs) {
        if let Some(dir) = cli.cache_dir.as_ref() {
            self.cache.dir = Some(dir.clone());
        }
        if let Some(level) = cli.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            cache,
            github,
            logging,
            highlight,
        } = raw;

        Ok(Self {
            cache: build_cache_settings(cache)?,
            github: build_github_settings(github)?,
            logging: build_logging_settings(logging)?,
            highlight: build_highlight_settings(highlight)?,
        })
    }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let dir = match cache.dir {
        Some(dir) if dir.as_os_str().is_empty() => {
            return Err(LoadError::invalid("cache.dir", "path must not be empty"));
        }
        Some(dir) => Some(dir),
        None => paths::cache_dir(),
    };

    let tree_ttl = cache
        .tree_ttl_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TREE_TTL);

    let max_preview_bytes = cache.max_preview_bytes.unwrap_or(DEFAULT_MAX_PREVIEW_BYTES);
    if max_preview_bytes == 0 {
        return Err(LoadError::invalid(
            "cache.max_preview_bytes",
            "must be greater than zero",
        ));
    }

    let schema_version = cache.schema_version.unwrap_or(SCHEMA_VERSION);
    if schema_version == 0 {
        return Err(LoadError::invalid(
            "cache.schema_version",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        dir,
        tree_ttl,
        max_trees: positive(cache.max_trees, DEFAULT_MAX_TREES, "cache.max_trees")?,
        max_blobs: positive(cache.max_blobs, DEFAULT_MAX_BLOBS, "cache.max_blobs")?,
        max_highlights: positive(
            cache.max_highlights,
            DEFAULT_MAX_HIGHLIGHTS,
            "cache.max_highlights",
        )?,
        max_preview_bytes,
        schema_version,
    })
}

fn build_github_settings(github: RawGitHubSettings) -> Result<GitHubSettings, LoadError> {
    let base = github
        .api_base
        .unwrap_or_else(|| GITHUB_API_BASE.to_string());
    let api_base = Url::parse(base.trim())
        .map_err(|err| LoadError::invalid("github.api_base", format!("failed to parse: {err}")))?;
    if api_base.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "github.api_base",
            "must be an absolute http(s) URL",
        ));
    }

    let timeout_secs = github.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "github.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(GitHubSettings {
        api_base,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = match logging.format.as_deref().map(str::trim) {
        None | Some("compact") => LogFormat::Compact,
        Some("json") => LogFormat::Json,
        Some(other) => {
            return Err(LoadError::invalid(
                "logging.format",
                format!("expected `compact` or `json`, got `{other}`"),
            ));
        }
    };

    Ok(LoggingSettings { level, format })
}

fn build_highlight_settings(
    highlight: RawHighlightSettings,
) -> Result<HighlightSettings, LoadError> {
    let theme = highlight
        .theme
        .unwrap_or_else(|| DEFAULT_THEME.to_string());
    if theme.trim().is_empty() {
        return Err(LoadError::invalid(
            "highlight.theme",
            "theme must not be empty",
        ));
    }
    Ok(HighlightSettings { theme })
}

fn positive(value: Option<usize>, default: usize, key: &'static str) -> Result<usize, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        value => Ok(value),
    }
}
