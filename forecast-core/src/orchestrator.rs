//! Concurrent fan-out over source adapters.
//!
//! Every adapter gets its own task on the runtime; the join waits for all of
//! them. Failures in the adapter error taxonomy are logged and reported but
//! never abort the batch. A panicking adapter is a bug and is re-raised.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::{Coordinates, FailureKind, FetchError, ForecastRecord, ForecastProvider, ProviderId};

/// Why one adapter produced no records.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub kind: FailureKind,
    pub message: String,
}

impl From<&FetchError> for ProviderFailure {
    fn from(err: &FetchError) -> Self {
        Self { provider: err.provider(), kind: err.kind(), message: err.to_string() }
    }
}

/// Outcome of one fan-out run.
///
/// `records` holds each successful adapter's sequence in full, adapters
/// concatenated in completion order.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub records: Vec<ForecastRecord>,
    pub succeeded: Vec<(ProviderId, usize)>,
    pub failures: Vec<ProviderFailure>,
}

impl FetchReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn into_records(self) -> Vec<ForecastRecord> {
        self.records
    }
}

/// Fetch from every provider concurrently and merge what succeeded.
pub async fn fetch_all(
    coords: Coordinates,
    providers: &[Arc<dyn ForecastProvider>],
) -> Vec<ForecastRecord> {
    fetch_all_with_report(coords, providers).await.into_records()
}

/// Like [`fetch_all`], additionally reporting which providers failed and why.
#[instrument(skip(providers), fields(providers = providers.len()))]
pub async fn fetch_all_with_report(
    coords: Coordinates,
    providers: &[Arc<dyn ForecastProvider>],
) -> FetchReport {
    let mut tasks = JoinSet::new();

    for provider in providers {
        let provider = Arc::clone(provider);
        tasks.spawn(async move {
            let id = provider.id();
            (id, provider.fetch(coords).await)
        });
    }

    let mut report = FetchReport::default();

    while let Some(joined) = tasks.join_next().await {
        let (id, result) = match joined {
            Ok(outcome) => outcome,
            Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
            Err(join_err) => panic!("forecast task was cancelled: {join_err}"),
        };

        match result {
            Ok(records) => {
                info!(provider = %id, records = records.len(), "provider fetch succeeded");
                report.succeeded.push((id, records.len()));
                report.records.extend(records);
            }
            Err(err) => {
                let failure = ProviderFailure::from(&err);
                match failure.kind {
                    FailureKind::Transport => warn!(provider = %id, error = %err, "problem with HTTP request"),
                    FailureKind::DataShape => warn!(provider = %id, error = %err, "problem with received JSON"),
                    FailureKind::OutOfRange => warn!(provider = %id, error = %err, "problem with incomplete data"),
                }
                report.failures.push(failure);
            }
        }
    }

    report
}
