//! Stockcast Core: domain types, market data providers, cleaning, forecasting.
//!
//! This crate holds everything between a ticker symbol and a forecast table:
//! - Domain types (tickers, horizons, clean rows, training and forecast points)
//! - Raw provider tables with single- or two-level column labels
//! - Providers: Yahoo Finance, CSV exports, synthetic random walks
//! - The cleaner that turns raw tables into validated price rows
//! - The forecast engine traits and the decomposition forecaster

pub mod data;
pub mod domain;
pub mod forecast;
