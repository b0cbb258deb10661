use async_trait::async_trait;
use chrono::{NaiveDateTime, Timelike};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    Coordinates, FetchError, ForecastRecord,
    model::{truncate_to_hour, utc_now_naive},
    provider::{AdapterMode, ForecastProvider, ProviderId, decode, fetch_body},
};

const BASE_URL: &str = "https://api.open-meteo.com";
const HOURLY_VARIABLES: &str = "temperature_2m,precipitation,relative_humidity_2m,windspeed_10m,winddirection_10m,cloudcover,surface_pressure,dew_point_2m";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const PROVIDER: ProviderId = ProviderId::OpenMeteo;

/// Open-Meteo adapter. Hourly values come back as parallel arrays indexed
/// by `hourly.time`; times are requested in UTC.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    http: Client,
    base_url: String,
    mode: AdapterMode,
}

impl OpenMeteoProvider {
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
        let parsed: OmResponse = decode(PROVIDER, body)?;

        match self.mode {
            AdapterMode::Forecast => parse_forecast(&parsed.hourly, request_time, coords),
            AdapterMode::Current => Ok(vec![parse_current(&parsed.hourly, request_time, coords)]),
        }
    }

    fn forecast_days(&self) -> &'static str {
        match self.mode {
            AdapterMode::Forecast => "7",
            AdapterMode::Current => "1",
        }
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    async fn fetch(&self, coords: Coordinates) -> Result<Vec<ForecastRecord>, FetchError> {
        let url = format!("{}/v1/forecast", self.base_url.trim_end_matches('/'));
        let request_time = utc_now_naive();
        debug!(%url, mode = %self.mode, "requesting open-meteo forecast");

        let request = self.http.get(&url).query(&[
            ("latitude", coords.latitude().to_string().as_str()),
            ("longitude", coords.longitude().to_string().as_str()),
            ("hourly", HOURLY_VARIABLES),
            ("forecast_days", self.forecast_days()),
            ("timezone", "UTC"),
        ]);
        let body = fetch_body(PROVIDER, request).await?;

        self.parse(&body, request_time, coords)
    }
}

/// One record per entry of `time`. Every variable must cover every entry.
fn parse_forecast(
    hourly: &OmHourly,
    request_time: NaiveDateTime,
    coords: Coordinates,
) -> Result<Vec<ForecastRecord>, FetchError> {
    hourly
        .time
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let forecast_time = NaiveDateTime::parse_from_str(raw, TIME_FORMAT).map_err(|e| {
                FetchError::data_shape(PROVIDER, format!("invalid time '{raw}' at index {i}: {e}"))
            })?;

            Ok(ForecastRecord {
                temperature: at(&hourly.temperature_2m, "temperature_2m", i)?,
                wind_speed: at(&hourly.windspeed_10m, "windspeed_10m", i)?,
                wind_direction: at(&hourly.winddirection_10m, "winddirection_10m", i)?,
                precipitation: at(&hourly.precipitation, "precipitation", i)?,
                humidity: at(&hourly.relative_humidity_2m, "relative_humidity_2m", i)?,
                cloud_cover: at(&hourly.cloudcover, "cloudcover", i)?,
                air_pressure: at(&hourly.surface_pressure, "surface_pressure", i)?,
                dew_point: at(&hourly.dew_point_2m, "dew_point_2m", i)?,
                ..ForecastRecord::new(PROVIDER.as_str(), request_time, forecast_time, coords)
            })
        })
        .collect()
}

/// The value at the request's hour of day. A series that doesn't reach that
/// hour yields an absent value.
fn parse_current(hourly: &OmHourly, request_time: NaiveDateTime, coords: Coordinates) -> ForecastRecord {
    let hour = request_time.hour() as usize;

    ForecastRecord {
        temperature: at_or_absent(&hourly.temperature_2m, hour),
        wind_speed: at_or_absent(&hourly.windspeed_10m, hour),
        wind_direction: at_or_absent(&hourly.winddirection_10m, hour),
        precipitation: at_or_absent(&hourly.precipitation, hour),
        humidity: at_or_absent(&hourly.relative_humidity_2m, hour),
        cloud_cover: at_or_absent(&hourly.cloudcover, hour),
        air_pressure: at_or_absent(&hourly.surface_pressure, hour),
        dew_point: at_or_absent(&hourly.dew_point_2m, hour),
        ..ForecastRecord::new(PROVIDER.as_str(), request_time, truncate_to_hour(request_time), coords)
    }
}

fn at(series: &[Option<f64>], field: &str, index: usize) -> Result<Option<f64>, FetchError> {
    series
        .get(index)
        .copied()
        .ok_or_else(|| FetchError::out_of_range(PROVIDER, format!("hourly.{field}"), index, series.len()))
}

fn at_or_absent(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    hourly: OmHourly,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
    windspeed_10m: Vec<Option<f64>>,
    winddirection_10m: Vec<Option<f64>>,
    cloudcover: Vec<Option<f64>>,
    surface_pressure: Vec<Option<f64>>,
    dew_point_2m: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn coords() -> Coordinates {
        Coordinates::new(52.23, 21.01).unwrap()
    }

    fn at_hour(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, 31).unwrap().and_hms_opt(hour, 42, 7).unwrap()
    }

    fn fixture() -> serde_json::Value {
        json!({
            "latitude": 52.23,
            "longitude": 21.01,
            "hourly": {
                "time": ["2025-08-31T00:00", "2025-08-31T01:00", "2025-08-31T02:00", "2025-08-31T03:00"],
                "temperature_2m": [14.1, 13.8, 13.5, null],
                "precipitation": [0.0, 0.1, 0.2, 0.3],
                "relative_humidity_2m": [80, 81, 82, 83],
                "windspeed_10m": [7.2, 6.8, 6.1, 5.9],
                "winddirection_10m": [250, 255, 260, 265],
                "cloudcover": [10, 20, 30, 40],
                "surface_pressure": [1003.2, 1003.0, 1002.9, 1002.7],
                "dew_point_2m": [10.1, 10.0, 9.9, 9.8]
            }
        })
    }

    #[test]
    fn forecast_mode_returns_one_record_per_time_entry() {
        let provider = OpenMeteoProvider::new(AdapterMode::Forecast);
        let records = provider.parse(&fixture().to_string(), at_hour(2), coords()).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(
            records[1].forecast_time,
            NaiveDate::from_ymd_opt(2025, 8, 31).unwrap().and_hms_opt(1, 0, 0).unwrap()
        );
        assert_eq!(records[1].temperature, Some(13.8));
        assert_eq!(records[1].humidity, Some(81.0));
        assert_eq!(records[1].wind_speed, Some(6.8));
        assert_eq!(records[1].air_pressure, Some(1003.0));
        assert_eq!(records[1].uv_index, None);
        assert_eq!(records[1].visibility, None);
        // null stays absent, not zero
        assert_eq!(records[3].temperature, None);
        assert_eq!(records[3].precipitation, Some(0.3));
        assert!(records.iter().all(|r| r.source == "open_meteo"));
    }

    #[test]
    fn forecast_mode_rejects_short_variable_array() {
        let mut body = fixture();
        body["hourly"]["precipitation"] = json!([0.0, 0.1]);
        let provider = OpenMeteoProvider::new(AdapterMode::Forecast);
        let err = provider.parse(&body.to_string(), at_hour(0), coords()).unwrap_err();

        assert_eq!(err.kind(), FailureKind::OutOfRange);
        assert!(err.to_string().contains("hourly.precipitation"));
    }

    #[test]
    fn current_mode_reads_the_request_hour() {
        let provider = OpenMeteoProvider::new(AdapterMode::Current);
        let records = provider.parse(&fixture().to_string(), at_hour(2), coords()).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.precipitation, Some(0.2));
        assert_eq!(record.humidity, Some(82.0));
        assert_eq!(record.forecast_time, at_hour(2).date().and_hms_opt(2, 0, 0).unwrap());
        assert_eq!(record.request_time, at_hour(2));
    }

    #[test]
    fn current_mode_past_the_arrays_yields_absent_values() {
        let provider = OpenMeteoProvider::new(AdapterMode::Current);
        let records = provider.parse(&fixture().to_string(), at_hour(5), coords()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].precipitation, None);
        assert_eq!(records[0].humidity, None);
        assert_eq!(records[0].temperature, None);
    }

    #[test]
    fn missing_variable_is_a_data_shape_error() {
        let mut body = fixture();
        body["hourly"].as_object_mut().unwrap().remove("relative_humidity_2m");

        for mode in [AdapterMode::Forecast, AdapterMode::Current] {
            let provider = OpenMeteoProvider::new(mode);
            let err = provider.parse(&body.to_string(), at_hour(2), coords()).unwrap_err();
            assert_eq!(err.kind(), FailureKind::DataShape);
            assert!(err.to_string().contains("relative_humidity_2m"));
        }
    }

    #[test]
    fn wrong_type_is_a_data_shape_error() {
        let mut body = fixture();
        body["hourly"]["temperature_2m"] = json!("14.1");
        let provider = OpenMeteoProvider::new(AdapterMode::Forecast);
        let err = provider.parse(&body.to_string(), at_hour(2), coords()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::DataShape);
    }

    #[test]
    fn parsing_is_deterministic() {
        let provider = OpenMeteoProvider::new(AdapterMode::Forecast);
        let body = fixture().to_string();
        assert_eq!(
            provider.parse(&body, at_hour(1), coords()).unwrap(),
            provider.parse(&body, at_hour(1), coords()).unwrap()
        );
    }

    #[tokio::test]
    async fn fetch_sends_hourly_variables_in_utc() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "52.23"))
            .and(query_param("longitude", "21.01"))
            .and(query_param("hourly", HOURLY_VARIABLES))
            .and(query_param("forecast_days", "7"))
            .and(query_param("timezone", "UTC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = OpenMeteoProvider::new(AdapterMode::Forecast).with_base_url(mock_server.uri());
        let records = provider.fetch(coords()).await.unwrap();
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn current_mode_requests_a_single_day() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("hourly", HOURLY_VARIABLES))
            .and(query_param("forecast_days", "1"))
            .and(query_param("timezone", "UTC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = OpenMeteoProvider::new(AdapterMode::Current).with_base_url(mock_server.uri());
        let records = provider.fetch(coords()).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, "open_meteo");
        assert_eq!(records[0].forecast_time, truncate_to_hour(records[0].request_time));
    }

    #[tokio::test]
    async fn fetch_maps_error_status_to_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": true,
                "reason": "Latitude must be in range of -90 to 90°."
            })))
            .mount(&mock_server)
            .await;

        let provider = OpenMeteoProvider::new(AdapterMode::Forecast).with_base_url(mock_server.uri());
        let err = provider.fetch(coords()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transport);
        assert!(err.to_string().contains("Latitude must be in range"));
    }
}
