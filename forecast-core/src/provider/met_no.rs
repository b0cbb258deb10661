use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, header::USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::{
    Coordinates, FetchError, ForecastRecord,
    model::{mps_to_kmh, truncate_to_hour, utc_now_naive},
    provider::{AdapterMode, ForecastProvider, ProviderId, decode, fetch_body},
};

const BASE_URL: &str = "https://api.met.no";
const FORECAST_PATH: &str = "/weatherapi/locationforecast/2.0/compact";
/// api.met.no rejects requests without a browser-like identification.
pub const MET_NO_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:116.0) Gecko/20100101 Firefox/116.0";
const PROVIDER: ProviderId = ProviderId::MetNo;

/// Met Norway locationforecast adapter.
#[derive(Debug, Clone)]
pub struct MetNoProvider {
    http: Client,
    base_url: String,
    mode: AdapterMode,
}

impl MetNoProvider {
    pub fn new(mode: AdapterMode) -> Self {
        Self::with_client(Client::new(), mode)
    }

    pub fn with_client(http: Client, mode: AdapterMode) -> Self {
        Self { http, base_url: BASE_URL.to_string(), mode }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn parse(
        &self,
        body: &str,
        request_time: NaiveDateTime,
        coords: Coordinates,
    ) -> Result<Vec<ForecastRecord>, FetchError> {
        let parsed: MetResponse = decode(PROVIDER, body)?;
        let timeseries = parsed.properties.timeseries;

        match self.mode {
            AdapterMode::Forecast => Ok(timeseries
                .iter()
                .map(|entry| to_record(entry, request_time, entry.time.naive_utc(), coords))
                .collect()),
            AdapterMode::Current => {
                let hour = truncate_to_hour(request_time);
                let entry = timeseries
                    .iter()
                    .find(|entry| entry.time.naive_utc() == hour)
                    .or_else(|| timeseries.first())
                    .ok_or_else(|| FetchError::out_of_range(PROVIDER, "properties.timeseries", 0, 0))?;

                Ok(vec![to_record(entry, request_time, hour, coords)])
            }
        }
    }
}

#[async_trait]
impl ForecastProvider for MetNoProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    async fn fetch(&self, coords: Coordinates) -> Result<Vec<ForecastRecord>, FetchError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), FORECAST_PATH);
        let request_time = utc_now_naive();
        debug!(%url, mode = %self.mode, "requesting met.no forecast");

        let request = self
            .http
            .get(&url)
            .header(USER_AGENT, MET_NO_USER_AGENT)
            .query(&[("lat", coords.latitude()), ("lon", coords.longitude())]);
        let body = fetch_body(PROVIDER, request).await?;

        self.parse(&body, request_time, coords)
    }
}

fn to_record(
    entry: &MetEntry,
    request_time: NaiveDateTime,
    forecast_time: NaiveDateTime,
    coords: Coordinates,
) -> ForecastRecord {
    let details = &entry.data.instant.details;

    ForecastRecord {
        temperature: details.air_temperature,
        wind_speed: mps_to_kmh(details.wind_speed),
        wind_direction: details.wind_from_direction,
        precipitation: entry.data.next_1_hours.as_ref().map(|next| next.details.precipitation_amount),
        humidity: details.relative_humidity,
        cloud_cover: details.cloud_area_fraction,
        air_pressure: details.air_pressure_at_sea_level,
        dew_point: details.dew_point_temperature,
        visibility: details.visibility,
        ..ForecastRecord::new(PROVIDER.as_str(), request_time, forecast_time, coords)
    }
}

#[derive(Debug, Deserialize)]
struct MetResponse {
    properties: MetProperties,
}

#[derive(Debug, Deserialize)]
struct MetProperties {
    timeseries: Vec<MetEntry>,
}

#[derive(Debug, Deserialize)]
struct MetEntry {
    time: DateTime<Utc>,
    data: MetData,
}

#[derive(Debug, Deserialize)]
struct MetData {
    instant: MetInstant,
    next_1_hours: Option<MetNextHour>,
}

#[derive(Debug, Deserialize)]
struct MetInstant {
    details: MetDetails,
}

#[derive(Debug, Deserialize)]
struct MetDetails {
    air_temperature: Option<f64>,
    wind_speed: Option<f64>,
    wind_from_direction: Option<f64>,
    relative_humidity: Option<f64>,
    air_pressure_at_sea_level: Option<f64>,
    dew_point_temperature: Option<f64>,
    cloud_area_fraction: Option<f64>,
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetNextHour {
    details: MetNextHourDetails,
}

#[derive(Debug, Deserialize)]
struct MetNextHourDetails {
    precipitation_amount: f64,
}
