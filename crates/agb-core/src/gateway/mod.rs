//! Remote asset gateway.
//!
//! Three read-only queries against the geospatial backend: raster fetch,
//! feature-collection fetch and region reduction. Implementations:
//!   - [`EarthEngineClient`] (feature `http`): Earth Engine REST API.
//!   - [`FixtureBackend`]: JSON assets on disk, reductions computed locally.
//!   - [`CachedBackend`]: memoizing wrapper around either.

mod cached;
mod fixture;
#[cfg(feature = "http")]
mod http;
mod retry;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::assets::AssetKey;
use crate::config::DashboardConfig;
use crate::error::GatewayError;
use crate::geometry::Region;

pub use cached::{CacheReport, CachedBackend};
pub use fixture::FixtureBackend;
#[cfg(feature = "http")]
pub use http::EarthEngineClient;
pub use retry::RetryPolicy;

/// Server-side aggregations available to a region reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Mean,
    Min,
    Max,
}

impl Reducer {
    /// The mean+min+max combination used for every statistics card.
    pub const MEAN_MIN_MAX: [Reducer; 3] = [Reducer::Mean, Reducer::Min, Reducer::Max];

    /// Output suffix, as in `agbd_mean`.
    pub fn suffix(self) -> &'static str {
        match self {
            Reducer::Mean => "mean",
            Reducer::Min => "min",
            Reducer::Max => "max",
        }
    }

    /// Stat name produced for `band`.
    pub fn output_name(self, band: &str) -> String {
        format!("{band}_{}", self.suffix())
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A resolved remote raster, optionally narrowed to one band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterHandle {
    key: AssetKey,
    /// Bands the asset carries; empty when the backend did not report them.
    bands: Vec<String>,
    selected: Option<String>,
}

impl RasterHandle {
    pub fn new(key: AssetKey, bands: Vec<String>) -> Self {
        Self { key, bands, selected: None }
    }

    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn selected_band(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Bands a reduction covers: the selected one, or all of them.
    pub fn active_bands(&self) -> Vec<&str> {
        match &self.selected {
            Some(b) => vec![b.as_str()],
            None => self.bands.iter().map(String::as_str).collect(),
        }
    }

    /// Narrow to `band`. Fails when the asset is known not to carry it.
    pub fn select(&self, band: &str) -> Result<RasterHandle, GatewayError> {
        if !self.bands.is_empty() && !self.bands.iter().any(|b| b == band) {
            return Err(GatewayError::Compute(format!(
                "{} has no band {band:?} (bands: {})",
                self.key,
                self.bands.join(", ")
            )));
        }
        Ok(RasterHandle { key: self.key.clone(), bands: self.bands.clone(), selected: Some(band.to_string()) })
    }
}

/// One remote feature: its property bag. Geometry is not used by the dashboard.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Feature {
    #[serde(default, deserialize_with = "null_as_empty_map")]
    pub properties: Map<String, Value>,
}

fn null_as_empty_map<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
    Ok(Option::<Map<String, Value>>::deserialize(d)?.unwrap_or_default())
}

/// A fetched feature collection, in backend order. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionHandle {
    key: AssetKey,
    features: Arc<[Feature]>,
}

impl CollectionHandle {
    pub fn new(key: AssetKey, features: Vec<Feature>) -> Self {
        Self { key, features: features.into() }
    }

    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Result of a region reduction: stat name (`<band>_<reducer>`) to value.
/// Stats the backend reported as null are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionStats(BTreeMap<String, f64>);

impl RegionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Value of `reducer` over `band`.
    pub fn stat(&self, band: &str, reducer: Reducer) -> Option<f64> {
        self.get(&reducer.output_name(band))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a JSON object, keeping finite numeric entries only.
    pub fn from_json_object(obj: &Map<String, Value>) -> Self {
        let mut stats = Self::new();
        for (k, v) in obj {
            if let Some(x) = v.as_f64().filter(|x| x.is_finite()) {
                stats.insert(k.clone(), x);
            }
        }
        stats
    }
}

/// Read-only queries against a geospatial backend. Calls block until the
/// backend answers.
pub trait RemoteBackend {
    fn fetch_raster(&self, key: &AssetKey) -> Result<RasterHandle, GatewayError>;

    fn fetch_feature_collection(&self, key: &AssetKey) -> Result<CollectionHandle, GatewayError>;

    /// Reduce the raster's active bands over `region` with every reducer in
    /// one round trip. `scale` is the pixel size in metres; `max_pixels`
    /// bounds the work the backend may do.
    fn reduce_region(
        &self,
        raster: &RasterHandle,
        region: &Region,
        reducers: &[Reducer],
        scale: f64,
        max_pixels: f64,
    ) -> Result<RegionStats, GatewayError>;
}

impl<B: RemoteBackend + ?Sized> RemoteBackend for Box<B> {
    fn fetch_raster(&self, key: &AssetKey) -> Result<RasterHandle, GatewayError> {
        (**self).fetch_raster(key)
    }

    fn fetch_feature_collection(&self, key: &AssetKey) -> Result<CollectionHandle, GatewayError> {
        (**self).fetch_feature_collection(key)
    }

    fn reduce_region(
        &self,
        raster: &RasterHandle,
        region: &Region,
        reducers: &[Reducer],
        scale: f64,
        max_pixels: f64,
    ) -> Result<RegionStats, GatewayError> {
        (**self).reduce_region(raster, region, reducers, scale, max_pixels)
    }
}

/// Where a binary's backend comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSource {
    /// JSON assets under a local directory.
    Fixtures(PathBuf),
    /// Earth Engine REST with an optional OAuth access token.
    EarthEngine { access_token: Option<String> },
}

impl BackendSource {
    pub fn open(&self, config: &DashboardConfig) -> Result<Box<dyn RemoteBackend>, GatewayError> {
        match self {
            BackendSource::Fixtures(root) => {
                log::info!("using fixture backend at {}", root.display());
                Ok(Box::new(FixtureBackend::new(root.clone())))
            }
            #[cfg(feature = "http")]
            BackendSource::EarthEngine { access_token } => {
                log::info!("using Earth Engine at {}", config.earth_engine.endpoint);
                let client = EarthEngineClient::new(&config.earth_engine, config.retry, access_token.clone())?;
                Ok(Box::new(client))
            }
            #[cfg(not(feature = "http"))]
            BackendSource::EarthEngine { .. } => {
                let _ = config;
                Err(GatewayError::Transport("built without the `http` feature; use fixtures".into()))
            }
        }
    }
}

/// Reject reduction budgets no backend would accept.
pub(crate) fn check_budget(scale: f64, max_pixels: f64) -> Result<(), GatewayError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(GatewayError::Compute(format!("scale must be positive, got {scale}")));
    }
    if !(max_pixels >= 1.0) {
        return Err(GatewayError::Compute(format!("max_pixels must be at least 1, got {max_pixels}")));
    }
    Ok(())
}
