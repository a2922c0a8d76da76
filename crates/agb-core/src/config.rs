//! Dashboard configuration.
//!
//! Every field has a default matching the deployed dashboard, so a config
//! file only needs the fields it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assets::{AssetCatalog, Year, DEFAULT_CATEGORY, DEFAULT_NAMESPACE, DEFAULT_YEARS};
use crate::coords::MapView;
use crate::error::ConfigError;
use crate::gateway::RetryPolicy;

/// Reduction budget sent with every region reduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceSettings {
    /// Pixel scale in metres.
    pub scale: f64,
    pub max_pixels: f64,
}

impl Default for ReduceSettings {
    fn default() -> Self {
        Self { scale: 100.0, max_pixels: 1e10 }
    }
}

/// Earth Engine REST connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthEngineSettings {
    pub endpoint: String,
    /// Cloud project that pays for `value:compute` calls.
    pub cloud_project: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for EarthEngineSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://earthengine.googleapis.com".to_string(),
            cloud_project: "ee-sorayatriutami".to_string(),
            page_size: 1000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub namespace: String,
    pub category: String,
    /// Band holding AGB density in every raster.
    pub band: String,
    /// Values offered by the year selector.
    pub years: Vec<u16>,
    pub reduce: ReduceSettings,
    pub earth_engine: EarthEngineSettings,
    pub retry: RetryPolicy,
    /// Viewport of the per-year map page.
    pub map_view: MapView,
    /// Viewport of the home page split map.
    pub home_view: MapView,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            band: "agbd".to_string(),
            years: DEFAULT_YEARS.to_vec(),
            reduce: ReduceSettings::default(),
            earth_engine: EarthEngineSettings::default(),
            retry: RetryPolicy::default(),
            map_view: MapView::new(-3.05, 112.0435, 10),
            home_view: MapView::new(-3.05, 112.0, 10),
        }
    }
}

impl DashboardConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.years.is_empty() {
            return Err(ConfigError::Invalid("years must not be empty".into()));
        }
        if self.band.is_empty() {
            return Err(ConfigError::Invalid("band must not be empty".into()));
        }
        if !(self.reduce.scale > 0.0 && self.reduce.max_pixels >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "reduce.scale must be > 0 and reduce.max_pixels >= 1, got {:?}",
                self.reduce
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn catalog(&self) -> AssetCatalog {
        AssetCatalog::new(&self.namespace, &self.category)
    }

    /// Validate a selector value against the configured years.
    pub fn year(&self, value: u16) -> Option<Year> {
        Year::checked(value, &self.years)
    }

    /// Every configured year, in selector order.
    pub fn all_years(&self) -> Vec<Year> {
        self.years.iter().filter_map(|&y| self.year(y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_dashboard_constants() {
        let c = DashboardConfig::default();
        assert_eq!(c.reduce.scale, 100.0);
        assert_eq!(c.reduce.max_pixels, 1e10);
        assert_eq!(c.years, vec![2021, 2022, 2023]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"years": [2022], "reduce": {{"scale": 250}}}}"#).unwrap();
        let c = DashboardConfig::load(f.path()).unwrap();
        assert_eq!(c.years, vec![2022]);
        assert_eq!(c.reduce.scale, 250.0);
        assert_eq!(c.reduce.max_pixels, 1e10);
        assert_eq!(c.band, "agbd");
        assert!(c.year(2021).is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"years": []}}"#).unwrap();
        assert!(matches!(DashboardConfig::load(f.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = DashboardConfig::load(Path::new("/nonexistent/agb.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
