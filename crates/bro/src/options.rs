//! Stage configuration.
//!
//! [`BroOptions`] is resolved once per stage and shared read-only by every
//! record the stage processes. [`BroArgs`] is the only place where the shape of
//! the caller's arguments (options, a bare callback, or both) is inspected.
//! [`BroConfig`] is the serializable subset loaded from files and environment.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{BundleError, ConfigError, Result};
use crate::pipeline::SideChannel;
use crate::sink::{LogSink, TracingSink};

/// Handler invoked with the raw error for [`ErrorStrategy::Custom`].
pub type ErrorHandler = Arc<dyn Fn(BundleError) + Send + Sync>;

/// Receiver of side channels when output is diverted from the pipeline.
pub type Callback = Arc<dyn Fn(SideChannel) + Send + Sync>;

/// How bundling errors are routed.
#[derive(Clone, Default)]
pub enum ErrorStrategy {
    /// Log a formatted message; the pipeline is not failed
    #[default]
    Log,
    /// Re-raise on the destination's error channel
    Emit,
    /// Hand the error to a caller-supplied function
    Custom(ErrorHandler),
}

impl ErrorStrategy {
    /// Wrap a closure as a custom strategy.
    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(BundleError) + Send + Sync + 'static,
    {
        ErrorStrategy::Custom(Arc::new(handler))
    }

    /// Parse a strategy name, falling back to [`ErrorStrategy::Log`].
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::debug!(value = name, "unknown error strategy, using \"log\"");
            ErrorStrategy::Log
        })
    }
}

impl FromStr for ErrorStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" | "" => Ok(ErrorStrategy::Log),
            "emit" => Ok(ErrorStrategy::Emit),
            other => Err(format!("Invalid error strategy: {}", other)),
        }
    }
}

impl fmt::Debug for ErrorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStrategy::Log => write!(f, "Log"),
            ErrorStrategy::Emit => write!(f, "Emit"),
            ErrorStrategy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Resolved configuration for one stage.
#[derive(Clone)]
pub struct BroOptions {
    /// Rebundle when a dependency changes
    pub watch: bool,
    /// Error routing strategy
    pub error: ErrorStrategy,
    /// Divert bundled records to side channels instead of the pipeline
    pub callback: Option<Callback>,
    /// Minimum delay between two update events for the same file
    pub debounce: Duration,
    /// Colorize log messages
    pub color: bool,
    /// Where formatted log messages go
    pub log_sink: Arc<dyn LogSink>,
}

impl Default for BroOptions {
    fn default() -> Self {
        Self {
            watch: false,
            error: ErrorStrategy::default(),
            callback: None,
            debounce: DEFAULT_DEBOUNCE,
            color: should_use_color(),
            log_sink: Arc::new(TracingSink),
        }
    }
}

impl BroOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn error(mut self, strategy: ErrorStrategy) -> Self {
        self.error = strategy;
        self
    }

    /// Route errors to `handler` instead of logging them.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(BundleError) + Send + Sync + 'static,
    {
        self.error = ErrorStrategy::custom(handler);
        self
    }

    /// Divert bundled records to side channels passed to `callback`.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(SideChannel) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log_sink = Arc::new(sink);
        self
    }
}

impl fmt::Debug for BroOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroOptions")
            .field("watch", &self.watch)
            .field("error", &self.error)
            .field("callback", &self.callback.is_some())
            .field("debounce", &self.debounce)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

/// Arguments accepted when constructing a stage.
///
/// A bare callback stands in for `{ callback }` with default options.
pub enum BroArgs {
    Options(BroOptions),
    Callback(Callback),
    Both(BroOptions, Callback),
}

impl BroArgs {
    /// Only a callback, with default options.
    pub fn callback<F>(callback: F) -> Self
    where
        F: Fn(SideChannel) + Send + Sync + 'static,
    {
        BroArgs::Callback(Arc::new(callback))
    }

    /// Normalize into a single resolved configuration.
    pub fn into_options(self) -> BroOptions {
        match self {
            BroArgs::Options(options) => options,
            BroArgs::Callback(callback) => BroOptions {
                callback: Some(callback),
                ..BroOptions::default()
            },
            BroArgs::Both(options, callback) => BroOptions {
                callback: Some(callback),
                ..options
            },
        }
    }
}

impl Default for BroArgs {
    fn default() -> Self {
        BroArgs::Options(BroOptions::default())
    }
}

impl From<BroOptions> for BroArgs {
    fn from(options: BroOptions) -> Self {
        BroArgs::Options(options)
    }
}

impl From<Callback> for BroArgs {
    fn from(callback: Callback) -> Self {
        BroArgs::Callback(callback)
    }
}

impl From<(BroOptions, Callback)> for BroArgs {
    fn from((options, callback): (BroOptions, Callback)) -> Self {
        BroArgs::Both(options, callback)
    }
}

/// Serializable configuration loaded from `bro.toml`, `bro.json` and `BRO_*`.
///
/// Unset fields leave the options they are applied to untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroConfig {
    #[serde(default)]
    pub watch: bool,

    /// `"log"` or `"emit"`; anything else behaves like `"log"`
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub debounce_ms: Option<u64>,

    #[serde(default)]
    pub color: Option<bool>,
}

impl BroConfig {
    /// Load configuration from multiple sources.
    /// Priority: environment variables > config file > defaults
    ///
    /// Without an explicit path, `bro.toml` then `bro.json` are looked up in `cwd`.
    pub fn load(cwd: &Path, config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let config_file = match config_path {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    cwd.join(path)
                };
                if !path.exists() {
                    return Err(ConfigError::NotFound(path));
                }
                Some(path)
            }
            None => ["bro.toml", "bro.json"]
                .iter()
                .map(|name| cwd.join(name))
                .find(|path| path.exists()),
        };

        if let Some(path) = config_file {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(&path)),
                Some("json") => figment.merge(Json::file(&path)),
                other => {
                    return Err(ConfigError::UnsupportedFormat(
                        other.unwrap_or("<none>").to_string(),
                    ));
                }
            };
        }

        // BRO_WATCH, BRO_ERROR, BRO_DEBOUNCE_MS, BRO_COLOR
        figment = figment.merge(Env::prefixed("BRO_"));

        Ok(figment.extract()?)
    }

    /// Apply this configuration on top of `base`.
    ///
    /// Only fields that can be expressed in a file are touched; callbacks,
    /// custom error handlers and the log sink are kept from `base`.
    pub fn apply(&self, base: BroOptions) -> BroOptions {
        let error = match (&self.error, &base.error) {
            (Some(name), _) => ErrorStrategy::from_name(name),
            (None, current) => current.clone(),
        };

        BroOptions {
            watch: self.watch || base.watch,
            error,
            debounce: self.debounce_ms.map(Duration::from_millis).unwrap_or(base.debounce),
            color: self.color.unwrap_or(base.color),
            ..base
        }
    }

    /// Convert into stage options with default sink and no callback.
    pub fn into_options(self) -> BroOptions {
        self.apply(BroOptions::default())
    }
}

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Check if color output should be enabled.
///
/// Respects NO_COLOR and FORCE_COLOR environment variables, falls back to
/// terminal capability detection.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::user_attended_stderr()
}
