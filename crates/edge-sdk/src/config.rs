//! Pipeline configuration.

use anyhow::Context;
use edge_cache::{CacheMiddleware, CacheSettings, CacheStorage};
use edge_core::{Middleware, Pipeline};
use edge_observability::{
    init_from_settings, ErrorHandlerMiddleware, ErrorHandlerSettings, LoggingError,
    LoggingSettings,
};
use edge_rewrite::{HeadersConfig, HeadersMiddleware, RedirectMiddleware, RedirectSettings};
use edge_security::{AllowlistError, CorsConfig, CorsMiddleware, CorsSettings};
use serde::{Deserialize, Serialize};

use crate::middleware::EdgeMiddleware;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from loading or building a pipeline configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or parsed.
    #[error("{0:#}")]
    Load(anyhow::Error),

    /// A CORS origin entry is not a valid pattern.
    #[error("invalid cors settings: {0}")]
    Cors(#[from] AllowlistError),

    /// The logging subscriber could not be installed.
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Settings for one middleware, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MiddlewareSettings {
    Cache(CacheSettings),
    Cors(CorsSettings),
    Headers(HeadersConfig),
    Error(ErrorHandlerSettings),
    Redirect(RedirectSettings),
}

impl MiddlewareSettings {
    /// Build the middleware, opening cache instances from `storage`.
    pub fn build(self, storage: &CacheStorage) -> ConfigResult<EdgeMiddleware> {
        let middleware = match self {
            Self::Cache(settings) => CacheMiddleware::new(settings.into_config(storage)).into(),
            Self::Cors(settings) => CorsMiddleware::new(CorsConfig::try_from(settings)?).into(),
            Self::Headers(config) => HeadersMiddleware::new(config).into(),
            Self::Error(settings) => ErrorHandlerMiddleware::new(settings.into()).into(),
            Self::Redirect(settings) => RedirectMiddleware::new(settings.into()).into(),
        };
        Ok(middleware)
    }
}

/// Pipeline configuration file.
///
/// ```toml
/// [logging]
/// format = "human"
///
/// [[middlewares]]
/// type = "error"
///
/// [[middlewares]]
/// type = "cache"
/// cache_name = "pages"
/// cache_control = "public, max-age=60"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Middlewares, outermost first.
    #[serde(default)]
    pub middlewares: Vec<MiddlewareSettings>,

    /// Subscriber settings for [`PipelineConfig::init_logging`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSettings>,
}

impl PipelineConfig {
    /// Load config from a file. `.json` files are read as JSON, anything
    /// else as TOML.
    pub fn load(path: &str) -> ConfigResult<Self> {
        Self::read(path).map_err(ConfigError::Load)
    }

    fn read(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Parse TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content)
            .context("Failed to parse TOML config")
            .map_err(ConfigError::Load)
    }

    /// Parse JSON text.
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content)
            .context("Failed to parse JSON config")
            .map_err(ConfigError::Load)
    }

    /// Build the configured middlewares into a [`Pipeline`].
    pub fn build(&self, storage: &CacheStorage) -> ConfigResult<Pipeline> {
        let mut pipeline = Pipeline::new();
        for settings in &self.middlewares {
            let middleware = settings.clone().build(storage)?;
            tracing::debug!(middleware = middleware.name(), "adding middleware");
            pipeline = pipeline.with(middleware);
        }
        Ok(pipeline)
    }

    /// Install the configured logging subscriber, if any.
    ///
    /// Returns `false` when no `[logging]` section is present.
    pub fn init_logging(&self) -> ConfigResult<bool> {
        match &self.logging {
            Some(settings) => {
                init_from_settings(settings)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
