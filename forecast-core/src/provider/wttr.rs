use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    Coordinates, FetchError, ForecastRecord,
    model::{km_to_m, truncate_to_hour, utc_now_naive},
    provider::{AdapterMode, ForecastProvider, ProviderId, decode, fetch_body},
};

const BASE_URL: &str = "https://wttr.in";
const FORECAST_DAYS: &str = "7";
const PROVIDER: ProviderId = ProviderId::Wttr;

/// wttr.in adapter. Numbers arrive as strings and times as local clock
/// `HMM` offsets from the day's date.
#[derive(Debug, Clone)]
pub struct WttrProvider {
    http: Client,
    base_url: String,
    mode: AdapterMode,
}

impl WttrProvider {
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
        match self.mode {
            AdapterMode::Forecast => {
                let parsed: WttrForecastResponse = decode(PROVIDER, body)?;
                parse_forecast(parsed, request_time, coords)
            }
            AdapterMode::Current => {
                let parsed: WttrCurrentResponse = decode(PROVIDER, body)?;
                parse_current(parsed, request_time, coords).map(|record| vec![record])
            }
        }
    }
}

#[async_trait]
impl ForecastProvider for WttrProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    async fn fetch(&self, coords: Coordinates) -> Result<Vec<ForecastRecord>, FetchError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), coords);
        let request_time = utc_now_naive();
        debug!(%url, mode = %self.mode, "requesting wttr forecast");

        let request = self
            .http
            .get(&url)
            .query(&[("format", "j1"), ("num_of_days", FORECAST_DAYS)]);
        let body = fetch_body(PROVIDER, request).await?;

        self.parse(&body, request_time, coords)
    }
}

fn parse_forecast(
    parsed: WttrForecastResponse,
    request_time: NaiveDateTime,
    coords: Coordinates,
) -> Result<Vec<ForecastRecord>, FetchError> {
    let mut records = Vec::new();

    for day in &parsed.weather {
        for hour in &day.hourly {
            let forecast_time = parse_local_time(&day.date, &hour.time)?;

            records.push(ForecastRecord {
                temperature: Some(number("tempC", &hour.temp_c)?),
                wind_speed: Some(number("windspeedKmph", &hour.windspeed_kmph)?),
                wind_direction: Some(number("winddirDegree", &hour.winddir_degree)?),
                precipitation: Some(number("precipMM", &hour.precip_mm)?),
                humidity: Some(number("humidity", &hour.humidity)?),
                air_pressure: Some(number("pressure", &hour.pressure)?),
                cloud_cover: optional_number("cloudcover", hour.cloudcover.as_deref())?,
                uv_index: optional_number("uvIndex", hour.uv_index.as_deref())?,
                dew_point: optional_number("DewPointC", hour.dew_point_c.as_deref())?,
                visibility: km_to_m(optional_number("visibility", hour.visibility.as_deref())?),
                ..ForecastRecord::new(PROVIDER.as_str(), request_time, forecast_time, coords)
            });
        }
    }

    Ok(records)
}

fn parse_current(
    parsed: WttrCurrentResponse,
    request_time: NaiveDateTime,
    coords: Coordinates,
) -> Result<ForecastRecord, FetchError> {
    let current = parsed
        .current_condition
        .first()
        .ok_or_else(|| FetchError::out_of_range(PROVIDER, "current_condition", 0, 0))?;

    Ok(ForecastRecord {
        temperature: Some(number("temp_C", &current.temp_c)?),
        wind_speed: Some(number("windspeedKmph", &current.windspeed_kmph)?),
        wind_direction: Some(number("winddirDegree", &current.winddir_degree)?),
        precipitation: Some(number("precipMM", &current.precip_mm)?),
        humidity: Some(number("humidity", &current.humidity)?),
        air_pressure: Some(number("pressure", &current.pressure)?),
        cloud_cover: optional_number("cloudcover", current.cloudcover.as_deref())?,
        uv_index: optional_number("uvIndex", current.uv_index.as_deref())?,
        visibility: km_to_m(optional_number("visibility", current.visibility.as_deref())?),
        ..ForecastRecord::new(PROVIDER.as_str(), request_time, truncate_to_hour(request_time), coords)
    })
}

/// `time` is `0`, `300`, ..., `2100`: hours and minutes without padding.
fn parse_local_time(date: &str, time: &str) -> Result<NaiveDateTime, FetchError> {
    let raw = format!("{date} {time:0>4}");
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H%M")
        .map_err(|e| FetchError::data_shape(PROVIDER, format!("invalid forecast time '{raw}': {e}")))
}

fn number(field: &str, raw: &str) -> Result<f64, FetchError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FetchError::data_shape(PROVIDER, format!("`{field}` is not a number: '{raw}'")))
}

fn optional_number(field: &str, raw: Option<&str>) -> Result<Option<f64>, FetchError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => number(field, value).map(Some),
    }
}

#[derive(Debug, Deserialize)]
struct WttrForecastResponse {
    weather: Vec<WttrDay>,
}

#[derive(Debug, Deserialize)]
struct WttrDay {
    date: String,
    hourly: Vec<WttrHour>,
}

#[derive(Debug, Deserialize)]
struct WttrHour {
    time: String,
    #[serde(rename = "tempC")]
    temp_c: String,
    #[serde(rename = "windspeedKmph")]
    windspeed_kmph: String,
    #[serde(rename = "winddirDegree")]
    winddir_degree: String,
    #[serde(rename = "precipMM")]
    precip_mm: String,
    humidity: String,
    pressure: String,
    cloudcover: Option<String>,
    #[serde(rename = "uvIndex")]
    uv_index: Option<String>,
    #[serde(rename = "DewPointC")]
    dew_point_c: Option<String>,
    visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WttrCurrentResponse {
    current_condition: Vec<WttrCurrent>,
}

#[derive(Debug, Deserialize)]
struct WttrCurrent {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "windspeedKmph")]
    windspeed_kmph: String,
    #[serde(rename = "winddirDegree")]
    winddir_degree: String,
    #[serde(rename = "precipMM")]
    precip_mm: String,
    humidity: String,
    pressure: String,
    cloudcover: Option<String>,
    #[serde(rename = "uvIndex")]
    uv_index: Option<String>,
    visibility: Option<String>,
}
