//! Core library for the `forecasts` CLI.
//!
//! This crate defines:
//! - The normalized forecast record and its units
//! - Source adapters for wttr.in, Open-Meteo and Met Norway
//! - The concurrent fetch orchestrator with per-provider failure isolation
//! - Append-only CSV storage and cross-provider comparison helpers
//! - Configuration handling
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod analysis;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod store;

pub use config::{Config, LocationConfig};
pub use error::{FailureKind, FetchError};
pub use model::{Coordinates, ForecastRecord, InvalidCoordinates};
pub use orchestrator::{FetchReport, ProviderFailure, fetch_all, fetch_all_with_report};
pub use provider::{AdapterMode, ForecastProvider, ProviderId};
pub use store::ForecastStore;
