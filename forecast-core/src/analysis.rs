//! Cross-provider comparison helpers over stored forecasts.
//!
//! Mirrors what the interactive comparison charts compute: narrow the stored
//! history down to one location and date window, then average each feature
//! per provider and forecast day (or hour).

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::{Coordinates, ForecastRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Temperature,
    WindSpeed,
    WindDirection,
    Precipitation,
    Humidity,
    CloudCover,
    AirPressure,
    UvIndex,
    DewPoint,
    Visibility,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Temperature => "temperature",
            Feature::WindSpeed => "wind_speed",
            Feature::WindDirection => "wind_direction",
            Feature::Precipitation => "precipitation",
            Feature::Humidity => "humidity",
            Feature::CloudCover => "cloud_cover",
            Feature::AirPressure => "air_pressure",
            Feature::UvIndex => "uv_index",
            Feature::DewPoint => "dew_point",
            Feature::Visibility => "visibility",
        }
    }

    pub const fn all() -> &'static [Feature] {
        &[
            Feature::Temperature,
            Feature::WindSpeed,
            Feature::WindDirection,
            Feature::Precipitation,
            Feature::Humidity,
            Feature::CloudCover,
            Feature::AirPressure,
            Feature::UvIndex,
            Feature::DewPoint,
            Feature::Visibility,
        ]
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Feature::Temperature | Feature::DewPoint => "°C",
            Feature::WindSpeed => "km/h",
            Feature::WindDirection => "°",
            Feature::Precipitation => "mm",
            Feature::Humidity | Feature::CloudCover => "%",
            Feature::AirPressure => "hPa",
            Feature::UvIndex => "",
            Feature::Visibility => "m",
        }
    }

    pub fn value(&self, record: &ForecastRecord) -> Option<f64> {
        match self {
            Feature::Temperature => record.temperature,
            Feature::WindSpeed => record.wind_speed,
            Feature::WindDirection => record.wind_direction,
            Feature::Precipitation => record.precipitation,
            Feature::Humidity => record.humidity,
            Feature::CloudCover => record.cloud_cover,
            Feature::AirPressure => record.air_pressure,
            Feature::UvIndex => record.uv_index,
            Feature::DewPoint => record.dew_point,
            Feature::Visibility => record.visibility,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Feature {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();
        Feature::all()
            .iter()
            .copied()
            .find(|feature| feature.as_str() == lower)
            .ok_or_else(|| {
                let known: Vec<&str> = Feature::all().iter().map(Feature::as_str).collect();
                anyhow::anyhow!("Unknown feature '{value}'. Supported features: {}.", known.join(", "))
            })
    }
}

pub fn at_location(records: &[ForecastRecord], coords: Coordinates) -> Vec<ForecastRecord> {
    records.iter().filter(|r| r.is_at(coords)).cloned().collect()
}

pub fn forecast_on(records: &[ForecastRecord], date: NaiveDate) -> Vec<ForecastRecord> {
    records.iter().filter(|r| r.forecast_time.date() == date).cloned().collect()
}

/// Both ends inclusive.
pub fn forecast_between(records: &[ForecastRecord], start: NaiveDate, end: NaiveDate) -> Vec<ForecastRecord> {
    records
        .iter()
        .filter(|r| (start..=end).contains(&r.forecast_time.date()))
        .cloned()
        .collect()
}

pub fn requested_on(records: &[ForecastRecord], date: NaiveDate) -> Vec<ForecastRecord> {
    records.iter().filter(|r| r.request_time.date() == date).cloned().collect()
}

pub fn forecast_in_month(records: &[ForecastRecord], year: i32, month: u32) -> Vec<ForecastRecord> {
    records
        .iter()
        .filter(|r| r.forecast_time.year() == year && r.forecast_time.month() == month)
        .cloned()
        .collect()
}

pub fn from_sources(records: &[ForecastRecord], sources: &[String]) -> Vec<ForecastRecord> {
    records.iter().filter(|r| sources.contains(&r.source)).cloned().collect()
}

/// Sources to put side by side: the requested ones, or every available
/// source when fewer than two were requested.
pub fn comparison_sources(available: &[String], requested: &[String]) -> Vec<String> {
    let mut chosen: Vec<String> = Vec::new();
    for source in requested {
        if !chosen.contains(source) {
            chosen.push(source.clone());
        }
    }

    if chosen.len() < 2 { available.to_vec() } else { chosen }
}

/// Per-feature averages of one group; `None` when no record in the group
/// reported the feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMeans {
    pub samples: usize,
    means: BTreeMap<Feature, f64>,
}

impl FeatureMeans {
    pub fn of(records: &[&ForecastRecord]) -> Self {
        let means = Feature::all()
            .iter()
            .filter_map(|feature| {
                let values: Vec<f64> = records.iter().filter_map(|r| feature.value(r)).collect();
                let mean = match feature {
                    Feature::WindDirection => circular_mean(&values),
                    _ => arithmetic_mean(&values),
                };
                mean.map(|m| (*feature, m))
            })
            .collect();

        Self { samples: records.len(), means }
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.means.get(&feature).copied()
    }
}

/// Averages grouped by provider and forecast date.
pub fn daily_means(records: &[ForecastRecord]) -> BTreeMap<(String, NaiveDate), FeatureMeans> {
    group_means(records, |r| (r.source.clone(), r.forecast_time.date()))
}

/// Averages grouped by provider and forecast hour; repeated requests for the
/// same hour collapse into one group.
pub fn hourly_means(records: &[ForecastRecord]) -> BTreeMap<(String, NaiveDateTime), FeatureMeans> {
    group_means(records, |r| (r.source.clone(), r.forecast_time))
}

/// Lowest and highest value of each feature within one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRanges {
    pub samples: usize,
    ranges: BTreeMap<Feature, (f64, f64)>,
}

impl FeatureRanges {
    pub fn of(records: &[&ForecastRecord]) -> Self {
        let ranges = Feature::all()
            .iter()
            .filter_map(|feature| {
                records
                    .iter()
                    .filter_map(|r| feature.value(r))
                    .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                        None => Some((v, v)),
                        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                    })
                    .map(|range| (*feature, range))
            })
            .collect();

        Self { samples: records.len(), ranges }
    }

    pub fn get(&self, feature: Feature) -> Option<(f64, f64)> {
        self.ranges.get(&feature).copied()
    }
}

/// Min/max grouped by provider and day of month; pair with
/// [`forecast_in_month`] to look at one month.
pub fn daily_ranges(records: &[ForecastRecord]) -> BTreeMap<(String, u32), FeatureRanges> {
    group_by(records, |r| (r.source.clone(), r.forecast_time.day()))
        .into_iter()
        .map(|(k, group)| (k, FeatureRanges::of(&group)))
        .collect()
}

fn group_means<K: Ord>(
    records: &[ForecastRecord],
    key: impl Fn(&ForecastRecord) -> K,
) -> BTreeMap<K, FeatureMeans> {
    group_by(records, key).into_iter().map(|(k, group)| (k, FeatureMeans::of(&group))).collect()
}

fn group_by<K: Ord>(
    records: &[ForecastRecord],
    key: impl Fn(&ForecastRecord) -> K,
) -> BTreeMap<K, Vec<&ForecastRecord>> {
    let mut groups: BTreeMap<K, Vec<&ForecastRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().push(record);
    }
    groups
}

/// Distinct sources in first-seen order.
pub fn sources(records: &[ForecastRecord]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for record in records {
        if !seen.contains(&record.source) {
            seen.push(record.source.clone());
        }
    }
    seen
}

/// Every unordered pair of distinct sources, in input order.
pub fn source_pairs(sources: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (i, a) in sources.iter().enumerate() {
        for b in &sources[i + 1..] {
            if a != b {
                pairs.push((a.clone(), b.clone()));
            }
        }
    }
    pairs
}

/// Mean absolute difference of one feature between two sources, over the
/// group keys (days or hours) where both sources have a value.
///
/// Returns the difference and the number of keys it was computed over.
pub fn mean_abs_difference<K: Ord + Clone>(
    means: &BTreeMap<(String, K), FeatureMeans>,
    source_a: &str,
    source_b: &str,
    feature: Feature,
) -> Option<(f64, usize)> {
    let diffs: Vec<f64> = means
        .iter()
        .filter(|((source, _), _)| source == source_a)
        .filter_map(|((_, k), a)| {
            let b = means.get(&(source_b.to_string(), k.clone()))?;
            let (a, b) = (a.get(feature)?, b.get(feature)?);
            Some(match feature {
                Feature::WindDirection => angular_distance(a, b),
                _ => (a - b).abs(),
            })
        })
        .collect();

    arithmetic_mean(&diffs).map(|d| (d, diffs.len()))
}

fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

fn arithmetic_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean of compass bearings in degrees, normalised to [0, 360).
///
/// `None` for an empty input or when the bearings cancel out.
pub fn circular_mean(degrees: &[f64]) -> Option<f64> {
    if degrees.is_empty() {
        return None;
    }

    let (sin, cos) = degrees.iter().fold((0.0_f64, 0.0_f64), |(s, c), d| {
        let rad = d.to_radians();
        (s + rad.sin(), c + rad.cos())
    });

    if sin.hypot(cos) < 1e-9 {
        return None;
    }

    let mean = sin.atan2(cos).to_degrees().rem_euclid(360.0);
    // rem_euclid of a tiny negative angle rounds up to exactly 360
    Some(if mean >= 360.0 { 0.0 } else { mean })
}
