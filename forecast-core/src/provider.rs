use crate::{
    Coordinates, FetchError, ForecastRecord,
    provider::{met_no::MetNoProvider, open_meteo::OpenMeteoProvider, wttr::WttrProvider},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod met_no;
pub mod open_meteo;
pub mod wttr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    Wttr,
    OpenMeteo,
    MetNo,
}

impl ProviderId {
    /// Name stored in the `source` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Wttr => "wttr",
            ProviderId::OpenMeteo => "open_meteo",
            ProviderId::MetNo => "met_no",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Wttr, ProviderId::OpenMeteo, ProviderId::MetNo]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "wttr" => Ok(ProviderId::Wttr),
            "open_meteo" => Ok(ProviderId::OpenMeteo),
            "met_no" => Ok(ProviderId::MetNo),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: wttr, open_meteo, met_no."
            )),
        }
    }
}

/// What each adapter returns for one call.
///
/// A deployment picks one mode for every adapter it builds:
/// - `Forecast`: the provider's full hourly range, many records.
/// - `Current`: exactly one record whose forecast time is the request hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterMode {
    #[default]
    Forecast,
    Current,
}

impl AdapterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterMode::Forecast => "forecast",
            AdapterMode::Current => "current",
        }
    }
}

impl std::fmt::Display for AdapterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AdapterMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "forecast" => Ok(AdapterMode::Forecast),
            "current" => Ok(AdapterMode::Current),
            _ => Err(anyhow::anyhow!("Unknown mode '{value}'. Expected 'forecast' or 'current'.")),
        }
    }
}

/// A source adapter: one network round-trip, mapped into forecast records.
///
/// Implementations never retry and never validate coordinates; callers pass
/// an already validated [`Coordinates`].
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn fetch(&self, coords: Coordinates) -> Result<Vec<ForecastRecord>, FetchError>;
}

/// Build one adapter sharing the given HTTP client.
pub fn provider_from_id(id: ProviderId, mode: AdapterMode, http: &Client) -> Arc<dyn ForecastProvider> {
    match id {
        ProviderId::Wttr => Arc::new(WttrProvider::with_client(http.clone(), mode)),
        ProviderId::OpenMeteo => Arc::new(OpenMeteoProvider::with_client(http.clone(), mode)),
        ProviderId::MetNo => Arc::new(MetNoProvider::with_client(http.clone(), mode)),
    }
}

/// Build adapters for `ids`, all in the same mode. Duplicate ids are built once.
pub fn providers_for(ids: &[ProviderId], mode: AdapterMode) -> Vec<Arc<dyn ForecastProvider>> {
    let http = Client::new();
    let mut seen = Vec::with_capacity(ids.len());

    ids.iter()
        .filter(|id| {
            if seen.contains(*id) {
                false
            } else {
                seen.push(**id);
                true
            }
        })
        .map(|id| provider_from_id(*id, mode, &http))
        .collect()
}

/// Send the request and return the body of a successful response.
pub(crate) async fn fetch_body(provider: ProviderId, request: RequestBuilder) -> Result<String, FetchError> {
    let res = request
        .send()
        .await
        .map_err(|e| FetchError::transport(provider, format!("failed to send request: {e}")))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| FetchError::transport(provider, format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        return Err(FetchError::transport(
            provider,
            format!("status {}: {}", status, truncate_body(&body)),
        ));
    }

    Ok(body)
}

pub(crate) fn decode<T: DeserializeOwned>(provider: ProviderId, body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::data_shape(provider, e.to_string()))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
