//! Application configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! [data]
//! tickers = ["AAPL", "GOOG", "MSFT", "GME"]
//! start_date = "2015-01-01"
//! source = "yahoo"
//!
//! [provider]
//! timeout_secs = 30
//!
//! [forecast]
//! default_years = 1
//!
//! [logging]
//! level = "info"
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use stockcast_core::data::{CircuitBreaker, YahooSettings};
use stockcast_core::domain::{Horizon, HorizonError, Ticker};
use stockcast_core::forecast::{DecompositionForecaster, ForecastConfig, ForecastError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

/// Where price tables come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Csv,
    Synthetic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Yahoo => "yahoo",
            SourceKind::Csv => "csv",
            SourceKind::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(SourceKind::Yahoo),
            "csv" => Ok(SourceKind::Csv),
            "synthetic" => Ok(SourceKind::Synthetic),
            other => Err(ConfigError::Invalid(format!(
                "unknown source '{other}' (expected yahoo, csv or synthetic)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Tickers offered to the user.
    pub tickers: Vec<Ticker>,
    pub start_date: NaiveDate,
    /// Exclusive end of the history window. Today when unset.
    pub end_date: Option<NaiveDate>,
    pub source: SourceKind,
    /// CSV file, or a directory of `{TICKER}.csv` files.
    pub csv_path: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            tickers: ["AAPL", "GOOG", "MSFT", "GME"]
                .iter()
                .filter_map(|t| Ticker::new(t).ok())
                .collect(),
            start_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            end_date: None,
            source: SourceKind::Yahoo,
            csv_path: None,
        }
    }
}

/// Upper bound for `provider.max_retries`.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 3,
        }
    }
}

impl ProviderConfig {
    pub fn yahoo_settings(&self) -> YahooSettings {
        YahooSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(
            Duration::from_secs(self.breaker_cooldown_secs),
            self.breaker_failure_threshold,
        )
    }
}

/// Forecaster settings plus the horizon bounds offered to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub yearly_order: usize,
    pub weekly_order: usize,
    pub interval_width: f64,
    pub ridge: f64,
    pub min_points: usize,
    pub min_years: u32,
    pub max_years: u32,
    pub default_years: u32,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        let model = ForecastConfig::default();
        Self {
            yearly_order: model.yearly_order,
            weekly_order: model.weekly_order,
            interval_width: model.interval_width,
            ridge: model.ridge,
            min_points: model.min_points,
            min_years: Horizon::MIN_YEARS,
            max_years: Horizon::MAX_YEARS,
            default_years: 1,
        }
    }
}

impl ForecastSettings {
    pub fn model_config(&self) -> ForecastConfig {
        ForecastConfig {
            yearly_order: self.yearly_order,
            weekly_order: self.weekly_order,
            interval_width: self.interval_width,
            ridge: self.ridge,
            min_points: self.min_points,
        }
    }

    pub fn engine(&self) -> DecompositionForecaster {
        DecompositionForecaster::new(self.model_config())
    }

    /// Horizon for a user choice, or the default when none was made.
    pub fn horizon(&self, years: Option<u32>) -> Result<Horizon, HorizonError> {
        Horizon::bounded(
            years.unwrap_or(self.default_years),
            self.min_years,
            self.max_years,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` overrides it.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub provider: ProviderConfig,
    pub forecast: ForecastSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// End of the history window, defaulting to today.
    pub fn end_date(&self) -> NaiveDate {
        self.data
            .end_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.tickers.is_empty() {
            return Err(ConfigError::Invalid("data.tickers must not be empty".into()));
        }
        let end = self.end_date();
        if self.data.start_date >= end {
            return Err(ConfigError::Invalid(format!(
                "data.start_date ({}) must be before end_date ({end})",
                self.data.start_date
            )));
        }
        if self.data.source == SourceKind::Csv && self.data.csv_path.is_none() {
            return Err(ConfigError::Invalid(
                "data.csv_path is required when source = \"csv\"".into(),
            ));
        }

        if self.provider.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "provider.max_retries ({}) must be at most {MAX_RETRIES}",
                self.provider.max_retries
            )));
        }

        self.forecast.model_config().validate()?;
        let f = &self.forecast;
        if f.max_years > Horizon::CEILING_YEARS {
            return Err(ConfigError::Invalid(format!(
                "forecast.max_years ({}) must be at most {}",
                f.max_years,
                Horizon::CEILING_YEARS
            )));
        }
        if f.min_years == 0 || f.min_years > f.max_years {
            return Err(ConfigError::Invalid(format!(
                "forecast.min_years ({}) must be at least 1 and at most max_years ({})",
                f.min_years, f.max_years
            )));
        }
        if !(f.min_years..=f.max_years).contains(&f.default_years) {
            return Err(ConfigError::Invalid(format!(
                "forecast.default_years ({}) must be within {}..={}",
                f.default_years, f.min_years, f.max_years
            )));
        }
        Ok(())
    }
}
