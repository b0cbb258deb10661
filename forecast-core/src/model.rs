use chrono::{Duration, DurationRound, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A query location. The only way to obtain one is [`Coordinates::new`],
/// so adapters never see an out-of-range pair.
///
/// ```compile_fail
/// let coords = forecast_core::Coordinates { latitude: 500.0, longitude: -999.0 };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error(
    "Invalid coordinates ({latitude}, {longitude}): latitude must be within [-90, 90] and longitude within [-180, 180]"
)]
pub struct InvalidCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinates> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);

        if lat_ok && lon_ok {
            Ok(Self { latitude, longitude })
        } else {
            Err(InvalidCoordinates { latitude, longitude })
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// One normalized forecast row, tagged with the provider it came from.
///
/// Units: temperature and dew point in °C, wind speed in km/h, wind direction
/// in degrees (0 = N), precipitation in mm, humidity and cloud cover in %,
/// air pressure in hPa, visibility in meters.
///
/// The serialized field order is the column order of the forecast file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub source: String,
    #[serde(rename = "request_datetime")]
    pub request_time: NaiveDateTime,
    #[serde(rename = "forecast_datetime")]
    pub forecast_time: NaiveDateTime,

    pub latitude: f64,
    pub longitude: f64,

    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub precipitation: Option<f64>,
    pub humidity: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub air_pressure: Option<f64>,
    pub uv_index: Option<f64>,
    pub dew_point: Option<f64>,
    pub visibility: Option<f64>,
}

impl ForecastRecord {
    /// A record with every measurement absent.
    pub fn new(
        source: impl Into<String>,
        request_time: NaiveDateTime,
        forecast_time: NaiveDateTime,
        coords: Coordinates,
    ) -> Self {
        Self {
            source: source.into(),
            request_time,
            forecast_time,
            latitude: coords.latitude,
            longitude: coords.longitude,
            temperature: None,
            wind_speed: None,
            wind_direction: None,
            precipitation: None,
            humidity: None,
            cloud_cover: None,
            air_pressure: None,
            uv_index: None,
            dew_point: None,
            visibility: None,
        }
    }

    /// Stored rows are re-validated; a hand-edited file may hold anything.
    pub fn coordinates(&self) -> Result<Coordinates, InvalidCoordinates> {
        Coordinates::new(self.latitude, self.longitude)
    }

    pub fn is_at(&self, coords: Coordinates) -> bool {
        self.latitude == coords.latitude && self.longitude == coords.longitude
    }
}

pub fn mps_to_kmh(speed: Option<f64>) -> Option<f64> {
    speed.map(|mps| mps * 3.6)
}

pub fn km_to_m(distance: Option<f64>) -> Option<f64> {
    distance.map(|km| km * 1000.0)
}

/// Current UTC wall clock without offset, truncated to whole seconds.
pub fn utc_now_naive() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

pub fn truncate_to_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.duration_trunc(Duration::hours(1)).unwrap_or(dt)
}
