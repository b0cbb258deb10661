use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use forecast_core::{
    AdapterMode, Config, Coordinates, ForecastRecord, ForecastStore, ProviderId,
    analysis::{self, Feature},
    fetch_all_with_report, provider,
};
use inquire::{CustomType, CustomUserError, MultiSelect, Select, Text, validator::Validation};
use std::path::PathBuf;
use tracing::info;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecasts", version, about = "Fetch and compare weather forecasts from several providers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Query location; falls back to the configured default when omitted.
#[derive(Debug, Args)]
pub struct LocationArgs {
    /// Latitude in degrees, -90..=90.
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude in degrees, -180..=180.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,
}

impl LocationArgs {
    fn resolve(&self, config: &Config) -> Result<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)?),
            _ => config.default_location(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the default location, forecast file, providers and mode.
    Configure,

    /// Fetch forecasts from every enabled provider and append them to the forecast file.
    Fetch {
        #[command(flatten)]
        location: LocationArgs,

        /// Provider to query, repeatable: wttr, open_meteo, met_no.
        #[arg(long = "provider")]
        providers: Vec<String>,

        /// "forecast" for the full hourly range, "current" for one reading per provider.
        #[arg(long)]
        mode: Option<String>,

        /// Forecast file to append to instead of the configured one.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Fetch and report without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare daily means across providers over a forecast date range.
    Compare {
        #[command(flatten)]
        location: LocationArgs,

        /// First forecast date (YYYY-MM-DD).
        #[arg(long)]
        from: NaiveDate,

        /// Last forecast date, inclusive (YYYY-MM-DD).
        #[arg(long)]
        to: NaiveDate,

        /// Source to compare, repeatable; every source when fewer than two are given.
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Feature to show, repeatable; all features when omitted.
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Forecast file to read instead of the configured one.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Show daily min/max per provider for every day of one month.
    Month {
        #[command(flatten)]
        location: LocationArgs,

        /// Forecast year.
        #[arg(long)]
        year: i32,

        /// Forecast month, 1-12.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,

        /// Source to show, repeatable; every source when omitted.
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Feature to show, repeatable; all features when omitted.
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Forecast file to read instead of the configured one.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Compare hourly forecasts across providers for a single day.
    Day {
        #[command(flatten)]
        location: LocationArgs,

        /// Forecast date (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,

        /// Only use forecasts requested on this date.
        #[arg(long)]
        requested: Option<NaiveDate>,

        /// Feature to show, repeatable; all features when omitted.
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Forecast file to read instead of the configured one.
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config),
            Command::Fetch { location, providers, mode, output, dry_run } => {
                let coords = location.resolve(&config)?;
                let ids = if providers.is_empty() {
                    config.provider_ids()?
                } else {
                    parse_all(&providers, |p| ProviderId::try_from(p))?
                };
                let mode = match mode {
                    Some(m) => AdapterMode::try_from(m.as_str())?,
                    None => config.mode,
                };
                let path = match output {
                    Some(path) => path,
                    None => config.data_file_path()?,
                };

                fetch(coords, &ids, mode, (!dry_run).then_some(path)).await
            }
            Command::Compare { location, from, to, sources, features, input } => {
                let coords = location.resolve(&config)?;
                let features = parse_features(&features)?;
                let records = load_records(&config, input)?;

                let records = analysis::at_location(&records, coords);
                let records = analysis::forecast_between(&records, from, to);
                let sources = analysis::comparison_sources(&analysis::sources(&records), &sources);
                let records = analysis::from_sources(&records, &sources);
                let means = analysis::daily_means(&records);

                println!("Daily means at {coords}, {from} .. {to}");
                for feature in features {
                    print!("{}", render::comparison_table(feature, &sources, &means, |d| d.to_string()));
                }
                Ok(())
            }
            Command::Month { location, year, month, sources, features, input } => {
                let coords = location.resolve(&config)?;
                let features = parse_features(&features)?;
                let records = load_records(&config, input)?;

                let records = analysis::at_location(&records, coords);
                let mut records = analysis::forecast_in_month(&records, year, month);
                if !sources.is_empty() {
                    records = analysis::from_sources(&records, &sources);
                }
                let sources = analysis::sources(&records);
                let ranges = analysis::daily_ranges(&records);

                println!("Daily ranges at {coords} for {year}-{month:02}");
                for feature in features {
                    print!("{}", render::range_table(feature, &sources, &ranges));
                }
                Ok(())
            }
            Command::Day { location, date, requested, features, input } => {
                let coords = location.resolve(&config)?;
                let features = parse_features(&features)?;
                let records = load_records(&config, input)?;

                let records = analysis::at_location(&records, coords);
                let mut records = analysis::forecast_on(&records, date);
                if let Some(requested) = requested {
                    records = analysis::requested_on(&records, requested);
                }
                let sources = analysis::sources(&records);
                let means = analysis::hourly_means(&records);

                println!("Hourly means at {coords} for {date}");
                for feature in features {
                    print!(
                        "{}",
                        render::comparison_table(feature, &sources, &means, |t| t.format("%H:%M").to_string())
                    );
                }
                Ok(())
            }
        }
    }
}

async fn fetch(
    coords: Coordinates,
    ids: &[ProviderId],
    mode: AdapterMode,
    output: Option<PathBuf>,
) -> Result<()> {
    let providers = provider::providers_for(ids, mode);
    info!(%coords, %mode, providers = providers.len(), "fetching forecasts");

    let report = fetch_all_with_report(coords, &providers).await;
    print!("{}", render::fetch_summary(&report));

    match output {
        Some(path) => {
            let store = ForecastStore::new(path);
            store.append(&report.records)?;
            println!("Appended {} records to {}", report.records.len(), store.path().display());
        }
        None => println!("Dry run: nothing written"),
    }

    Ok(())
}

fn configure(mut config: Config) -> Result<()> {
    let current = config.default_location().ok();

    let mut lat_prompt = CustomType::<f64>::new("Latitude:")
        .with_error_message("Please type a number")
        .with_validator(latitude_in_range);
    if let Some(c) = current {
        lat_prompt = lat_prompt.with_default(c.latitude());
    }
    let latitude = lat_prompt.prompt()?;

    let mut lon_prompt = CustomType::<f64>::new("Longitude:")
        .with_error_message("Please type a number")
        .with_validator(longitude_in_range);
    if let Some(c) = current {
        lon_prompt = lon_prompt.with_default(c.longitude());
    }
    let longitude = lon_prompt.prompt()?;

    config.set_location(Coordinates::new(latitude, longitude)?);

    let data_file = config.data_file_path()?.display().to_string();
    let data_file = Text::new("Forecast file:").with_default(&data_file).prompt()?;
    config.data_file = Some(PathBuf::from(data_file));

    let enabled = config.provider_ids()?;
    let defaults: Vec<usize> = ProviderId::all()
        .iter()
        .enumerate()
        .filter(|(_, id)| enabled.contains(id))
        .map(|(i, _)| i)
        .collect();
    let providers = MultiSelect::new("Providers:", ProviderId::all().to_vec())
        .with_default(&defaults)
        .prompt()?;
    config.set_providers(&providers);

    let modes = vec![AdapterMode::Forecast, AdapterMode::Current];
    let cursor = modes.iter().position(|m| *m == config.mode).unwrap_or(0);
    config.mode = Select::new("Mode:", modes).with_starting_cursor(cursor).prompt()?;

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

fn latitude_in_range(value: &f64) -> Result<Validation, CustomUserError> {
    Ok(match Coordinates::new(*value, 0.0) {
        Ok(_) => Validation::Valid,
        Err(_) => Validation::Invalid("Latitude must be between -90 and 90".into()),
    })
}

fn longitude_in_range(value: &f64) -> Result<Validation, CustomUserError> {
    Ok(match Coordinates::new(0.0, *value) {
        Ok(_) => Validation::Valid,
        Err(_) => Validation::Invalid("Longitude must be between -180 and 180".into()),
    })
}

fn load_records(config: &Config, input: Option<PathBuf>) -> Result<Vec<ForecastRecord>> {
    let path = match input {
        Some(path) => path,
        None => config.data_file_path()?,
    };
    ForecastStore::new(&path)
        .load()
        .with_context(|| format!("Failed to load forecasts from {}", path.display()))
}

fn parse_features(names: &[String]) -> Result<Vec<Feature>> {
    if names.is_empty() {
        return Ok(Feature::all().to_vec());
    }
    parse_all(names, |n| Feature::try_from(n))
}

fn parse_all<T>(values: &[String], parse: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    values.iter().map(|v| parse(v.as_str())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn fetch_accepts_repeated_providers_and_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "forecasts", "fetch", "--lat", "-33.87", "--lon", "151.21", "--provider", "wttr",
            "--provider", "met_no", "--mode", "current", "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Command::Fetch { location, providers, mode, dry_run, output } => {
                assert_eq!(location.lat, Some(-33.87));
                assert_eq!(location.lon, Some(151.21));
                assert_eq!(providers, vec!["wttr", "met_no"]);
                assert_eq!(mode.as_deref(), Some("current"));
                assert!(dry_run);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn latitude_requires_longitude() {
        assert!(Cli::try_parse_from(["forecasts", "fetch", "--lat", "50.0"]).is_err());
    }

    #[test]
    fn compare_parses_dates() {
        let cli = Cli::try_parse_from([
            "forecasts", "compare", "--from", "2025-08-29", "--to", "2025-09-01", "--feature", "temperature",
        ])
        .unwrap();

        match cli.command {
            Command::Compare { from, to, features, .. } => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2025, 8, 29).unwrap());
                assert_eq!(to, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
                assert_eq!(parse_features(&features).unwrap(), vec![Feature::Temperature]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn compare_collects_repeated_sources() {
        let cli = Cli::try_parse_from([
            "forecasts", "compare", "--from", "2025-08-29", "--to", "2025-09-01", "--source", "wttr",
            "--source", "met_no",
        ])
        .unwrap();

        match cli.command {
            Command::Compare { sources, .. } => assert_eq!(sources, vec!["wttr", "met_no"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn month_parses_year_and_month() {
        let cli = Cli::try_parse_from([
            "forecasts", "month", "--lat", "50.05", "--lon", "19.94", "--year", "2025", "--month", "8",
        ])
        .unwrap();

        match cli.command {
            Command::Month { year, month, sources, features, .. } => {
                assert_eq!((year, month), (2025, 8));
                assert!(sources.is_empty());
                assert!(features.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["forecasts", "month", "--year", "2025", "--month", "13"]).is_err());
        assert!(Cli::try_parse_from(["forecasts", "month", "--year", "2025", "--month", "0"]).is_err());
    }

    #[test]
    fn coordinate_prompts_reject_out_of_range_input() {
        assert!(matches!(latitude_in_range(&50.05), Ok(Validation::Valid)));
        assert!(matches!(latitude_in_range(&-90.0), Ok(Validation::Valid)));
        assert!(matches!(latitude_in_range(&90.5), Ok(Validation::Invalid(_))));
        assert!(matches!(longitude_in_range(&-180.0), Ok(Validation::Valid)));
        assert!(matches!(longitude_in_range(&181.0), Ok(Validation::Invalid(_))));
        assert!(matches!(longitude_in_range(&f64::NAN), Ok(Validation::Invalid(_))));
    }

    #[test]
    fn explicit_location_overrides_config() {
        let args = LocationArgs { lat: Some(10.0), lon: Some(20.0) };
        let coords = args.resolve(&Config::default()).unwrap();
        assert_eq!(coords, Coordinates::new(10.0, 20.0).unwrap());
    }

    #[test]
    fn missing_location_points_at_configure() {
        let args = LocationArgs { lat: None, lon: None };
        let err = args.resolve(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("forecasts configure"));
    }

    #[test]
    fn invalid_explicit_location_is_rejected() {
        let args = LocationArgs { lat: Some(91.0), lon: Some(0.0) };
        assert!(args.resolve(&Config::default()).is_err());
    }

    #[test]
    fn no_features_means_all() {
        assert_eq!(parse_features(&[]).unwrap().len(), Feature::all().len());
        assert!(parse_features(&["foo".to_string()]).is_err());
    }
}
