//! Stockcast Runner: configuration, price cache, pipeline, reporting, export.
//!
//! This crate builds on `stockcast-core` to provide:
//! - TOML configuration with defaults for every field
//! - Fetcher selection (Yahoo, CSV, synthetic)
//! - A process-lifetime price cache keyed by ticker
//! - The fetch -> clean -> prepare -> forecast pipeline
//! - Text reports and CSV / Parquet / JSON export

pub mod cache;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod pipeline;
pub mod report;

pub use cache::{CacheLookup, CacheStats, PriceCache};
pub use config::{
    AppConfig, ConfigError, DataConfig, ForecastSettings, LoggingConfig, ProviderConfig,
    SourceKind,
};
pub use data_loader::{build_fetcher, load_series};
pub use export::{export_json, save_outputs, ExportFormat};
pub use pipeline::{run, PipelineError, PipelineOutput, PipelineRequest};
pub use report::{load_summary, render_text, ForecastReport};
