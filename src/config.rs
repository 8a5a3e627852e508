//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! tide-calendar.toml file. It provides a centralized way to configure the tide
//! station (including its harmonic constituents), the extrema sampling knobs and
//! the StormGlass API used by the external provider.

use crate::extrema::{ExtremaFinder, DEFAULT_PADDING_HOURS, DEFAULT_SAMPLE_INTERVAL_SECS};
use crate::harmonic::{Constituent, HarmonicSeries};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "tide-calendar.toml";

/// Application configuration loaded from tide-calendar.toml
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Tide station configuration
    pub station: StationConfig,
    /// High/low extraction settings
    pub extrema: ExtremaConfig,
    /// External tide API settings
    pub stormglass: StormGlassConfig,
}

/// Tide station configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StationConfig {
    /// Human-readable station name
    pub name: String,
    /// Event location text written into each calendar entry
    pub location: String,
    /// IANA zone the calendar is rendered in (e.g. "Europe/Jersey")
    pub time_zone: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Mean water level above chart datum in metres
    pub mean_level: f64,
    /// Metres added to every reported height (datum adjustment)
    pub datum_offset: f64,
    /// Harmonic constituents, phases relative to 2000-01-01T00:00Z
    pub constituents: Vec<Constituent>,
}

/// High/low extraction configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtremaConfig {
    /// Seconds between model samples; smaller is more precise and slower
    pub sample_interval_seconds: i64,
    /// Hours added on both sides of the window before sampling
    pub padding_hours: i64,
}

/// StormGlass tide API configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StormGlassConfig {
    pub base_url: String,
    /// API token; the STORM_TOKEN environment variable is used when absent
    pub token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        // St Helier, Jersey: HRET14 constants tuned against local observations,
        // relative to chart datum
        StationConfig {
            name: "St Helier".to_string(),
            location: "St Helier, Jersey".to_string(),
            time_zone: "Europe/Jersey".to_string(),
            latitude: 49.18,
            longitude: -2.11,
            mean_level: 6.01437,
            datum_offset: 0.0,
            constituents: vec![
                Constituent::new("M2", 3.1973, 179.2, 28.984_104_2),
                Constituent::new("S2", 1.3061, 244.51, 30.0),
                Constituent::new("N2", 0.6188, 248.4, 28.439_729_5),
                Constituent::new("K1", 0.0936, 163.75, 15.041_068_6),
                Constituent::new("O1", 0.0889, 119.22, 13.943_035_6),
                Constituent::new("P1", 0.0292, 144.36, 14.958_931_4),
                Constituent::new("K2", 0.4327, 116.74, 30.082_137_3),
                Constituent::new("Q1", 0.0278, 201.95, 13.398_660_9),
                Constituent::new("M4", 0.1932, 32.18, 57.968_208_4),
                Constituent::new("MS4", 0.101, 85.12, 58.984_104_2),
            ],
        }
    }
}

impl Default for ExtremaConfig {
    fn default() -> Self {
        ExtremaConfig {
            sample_interval_seconds: DEFAULT_SAMPLE_INTERVAL_SECS,
            padding_hours: DEFAULT_PADDING_HOURS,
        }
    }
}

impl Default for StormGlassConfig {
    fn default() -> Self {
        StormGlassConfig {
            base_url: "https://api.stormglass.io".to_string(),
            token: None,
            timeout_seconds: 30,
        }
    }
}

impl StationConfig {
    /// Parsed station zone; an unknown identifier falls back to UTC with a warning.
    pub fn zone(&self) -> Tz {
        self.time_zone.parse::<Tz>().unwrap_or_else(|_| {
            warn!(time_zone = %self.time_zone, "Unknown station time zone, using UTC");
            Tz::UTC
        })
    }

    /// The station's constituents as a harmonic series (validated on model build).
    pub fn harmonic_series(&self) -> HarmonicSeries {
        HarmonicSeries::new(self.constituents.clone(), self.mean_level)
    }
}

impl ExtremaConfig {
    pub fn finder(&self) -> ExtremaFinder {
        ExtremaFinder::new(self.sample_interval_seconds, self.padding_hours)
    }
}

impl StormGlassConfig {
    /// Configured token, else the STORM_TOKEN environment variable.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("STORM_TOKEN").ok())
            .filter(|token| !token.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(station = %config.station.name, path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config file format, using defaults (St Helier)");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "No config file found, using defaults (St Helier)");
                Self::default()
            }
        }
    }

    /// Save current configuration to `path` as pretty TOML
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "Configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmonic::HarmonicModel;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.station.name, "St Helier");
        assert_eq!(config.station.zone(), chrono_tz::Europe::Jersey);
        assert_eq!(config.station.constituents.len(), 10);
        assert_eq!(config.station.mean_level, 6.01437);
        assert_eq!(config.extrema.sample_interval_seconds, 300);
        assert_eq!(config.extrema.padding_hours, 12);
        assert!(HarmonicModel::new(config.station.harmonic_series()).is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.station.name, parsed.station.name);
        assert_eq!(config.station.constituents, parsed.station.constituents);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [station]
            name = "Somewhere"
            datum_offset = 6.0

            [[station.constituents]]
            name = "M2"
            amplitude = 1.2
            phase = 10.0
            speed = 28.9841042
            "#,
        )
        .unwrap();

        assert_eq!(parsed.station.name, "Somewhere");
        assert_eq!(parsed.station.datum_offset, 6.0);
        assert_eq!(parsed.station.constituents.len(), 1);
        assert_eq!(parsed.station.time_zone, "Europe/Jersey");
        assert_eq!(parsed.stormglass.base_url, "https://api.stormglass.io");
    }

    #[test]
    fn test_unknown_zone_falls_back_to_utc() {
        let station = StationConfig {
            time_zone: "Nowhere/Special".to_string(),
            ..StationConfig::default()
        };
        assert_eq!(station.zone(), Tz::UTC);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.station.name, "St Helier");
    }

    #[test]
    fn test_save_and_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.station.datum_offset = 1.5;
        config.save_to_path(file.path()).unwrap();

        let loaded = Config::load_from_path(file.path());
        assert_eq!(loaded.station.datum_offset, 1.5);
    }

    #[test]
    fn test_configured_token_wins() {
        let stormglass = StormGlassConfig {
            token: Some("abc".to_string()),
            ..StormGlassConfig::default()
        };
        assert_eq!(stormglass.resolve_token().as_deref(), Some("abc"));
    }
}
