use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    model::Coordinates,
    provider::{AdapterMode, ProviderId},
};

/// Default query location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// data_file = "/home/me/forecasts.csv"
/// providers = ["wttr", "met_no"]
/// mode = "forecast"
///
/// [location]
/// latitude = 50.049683
/// longitude = 19.944544
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub location: Option<LocationConfig>,

    /// CSV file forecasts are appended to; platform data dir when unset.
    pub data_file: Option<PathBuf>,

    /// Enabled provider ids. Empty means every supported provider.
    #[serde(default)]
    pub providers: Vec<String>,

    #[serde(default)]
    pub mode: AdapterMode,
}

impl Config {
    /// Return the configured location as validated coordinates.
    pub fn default_location(&self) -> Result<Coordinates> {
        let loc = self.location.ok_or_else(|| {
            anyhow!(
                "No default location configured.\n\
                 Hint: run `forecasts configure` or pass --lat and --lon."
            )
        })?;

        Coordinates::new(loc.latitude, loc.longitude)
            .with_context(|| "Configured location is invalid.\nHint: run `forecasts configure` again.")
    }

    pub fn set_location(&mut self, coords: Coordinates) {
        self.location = Some(LocationConfig { latitude: coords.latitude(), longitude: coords.longitude() });
    }

    /// Enabled providers as strongly-typed ids.
    pub fn provider_ids(&self) -> Result<Vec<ProviderId>> {
        if self.providers.is_empty() {
            return Ok(ProviderId::all().to_vec());
        }

        self.providers.iter().map(|p| ProviderId::try_from(p.as_str())).collect()
    }

    pub fn set_providers(&mut self, ids: &[ProviderId]) {
        self.providers = ids.iter().map(|id| id.as_str().to_string()).collect();
    }

    /// Where forecasts are stored, falling back to the platform data directory.
    pub fn data_file_path(&self) -> Result<PathBuf> {
        match &self.data_file {
            Some(path) => Ok(path.clone()),
            None => Self::default_data_file(),
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "forecast-compare", "forecasts")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    pub fn default_data_file() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("forecasts.csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_location_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_location().unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No default location configured"));
        assert!(msg.contains("Hint: run `forecasts configure`"));
    }

    #[test]
    fn default_location_rejects_out_of_range_values() {
        let cfg = Config {
            location: Some(LocationConfig { latitude: 123.0, longitude: 0.0 }),
            ..Config::default()
        };
        assert!(cfg.default_location().is_err());
    }

    #[test]
    fn set_location_roundtrips() {
        let mut cfg = Config::default();
        let coords = Coordinates::new(50.049683, 19.944544).unwrap();

        cfg.set_location(coords);

        assert_eq!(cfg.default_location().unwrap(), coords);
    }

    #[test]
    fn empty_provider_list_means_all() {
        let cfg = Config::default();
        assert_eq!(cfg.provider_ids().unwrap(), ProviderId::all().to_vec());
    }

    #[test]
    fn provider_list_is_parsed_and_validated() {
        let mut cfg = Config::default();
        cfg.set_providers(&[ProviderId::MetNo, ProviderId::Wttr]);
        assert_eq!(cfg.provider_ids().unwrap(), vec![ProviderId::MetNo, ProviderId::Wttr]);

        cfg.providers.push("accuweather".to_string());
        let err = cfg.provider_ids().unwrap_err();
        assert!(err.to_string().contains("Unknown provider 'accuweather'"));
    }

    #[test]
    fn explicit_data_file_wins() {
        let cfg = Config { data_file: Some(PathBuf::from("/tmp/f.csv")), ..Config::default() };
        assert_eq!(cfg.data_file_path().unwrap(), PathBuf::from("/tmp/f.csv"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config { mode: AdapterMode::Current, ..Config::default() };
        cfg.set_location(Coordinates::new(52.23, 21.01).unwrap());
        cfg.set_providers(&[ProviderId::OpenMeteo]);
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.location, cfg.location);
        assert_eq!(loaded.providers, vec!["open_meteo".to_string()]);
        assert_eq!(loaded.mode, AdapterMode::Current);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.location.is_none());
        assert_eq!(cfg.mode, AdapterMode::Forecast);
    }

    #[test]
    fn minimal_file_uses_field_defaults() {
        let cfg: Config = toml::from_str("data_file = \"forecasts.csv\"\n").unwrap();
        assert!(cfg.providers.is_empty());
        assert_eq!(cfg.mode, AdapterMode::Forecast);
        assert_eq!(cfg.data_file, Some(PathBuf::from("forecasts.csv")));
    }
}
