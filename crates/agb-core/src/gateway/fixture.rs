//! Backend over JSON assets on disk.
//!
//! An asset key `a/b/c` maps to `<root>/a/b/c.json`, holding either a
//! GeoJSON `FeatureCollection` or an `Image`:
//!
//! ```json
//! {"type": "Image", "native_scale_m": 100,
//!  "bands": {"agbd": {"width": 2, "height": 1, "data": [12.5, null],
//!                     "min_lon": 111.6, "max_lon": 112.3, "min_lat": -3.6, "max_lat": -2.5}}}
//! ```
//!
//! Reductions run locally over cell centres inside the region, stepping by
//! `scale / native_scale_m` cells.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{check_budget, CollectionHandle, Feature, RasterHandle, Reducer, RegionStats, RemoteBackend};
use crate::assets::AssetKey;
use crate::error::GatewayError;
use crate::geometry::Region;
use crate::raster::RasterGrid;

fn default_native_scale() -> f64 {
    100.0
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum FixtureAsset {
    FeatureCollection {
        #[serde(default)]
        features: Vec<Feature>,
    },
    Image {
        bands: BTreeMap<String, RasterGrid>,
        /// Ground size of one cell in metres.
        #[serde(default = "default_native_scale")]
        native_scale_m: f64,
    },
}

#[derive(Debug, Clone)]
pub struct FixtureBackend {
    root: PathBuf,
}

impl FixtureBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `key`, or `None` for keys that would escape the root.
    fn path_for(&self, key: &AssetKey) -> Option<PathBuf> {
        let ok = key
            .segments()
            .all(|s| !s.is_empty() && s != "." && s != ".." && !s.contains('\\'));
        ok.then(|| self.root.join(format!("{key}.json")))
    }

    fn load(&self, key: &AssetKey) -> Result<FixtureAsset, GatewayError> {
        let path = self.path_for(key).ok_or_else(|| GatewayError::NotFound(key.clone()))?;
        log::debug!("fixture: reading {}", path.display());
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(GatewayError::NotFound(key.clone())),
            Err(e) => return Err(GatewayError::Compute(format!("cannot read {}: {e}", path.display()))),
        };
        serde_json::from_str(&text)
            .map_err(|e| GatewayError::Compute(format!("malformed asset {}: {e}", path.display())))
    }
}

impl RemoteBackend for FixtureBackend {
    fn fetch_raster(&self, key: &AssetKey) -> Result<RasterHandle, GatewayError> {
        match self.load(key)? {
            FixtureAsset::Image { bands, .. } => Ok(RasterHandle::new(key.clone(), bands.into_keys().collect())),
            FixtureAsset::FeatureCollection { .. } => {
                Err(GatewayError::Compute(format!("{key} is a feature collection, not an image")))
            }
        }
    }

    fn fetch_feature_collection(&self, key: &AssetKey) -> Result<CollectionHandle, GatewayError> {
        match self.load(key)? {
            FixtureAsset::FeatureCollection { features } => Ok(CollectionHandle::new(key.clone(), features)),
            FixtureAsset::Image { .. } => {
                Err(GatewayError::Compute(format!("{key} is an image, not a feature collection")))
            }
        }
    }

    fn reduce_region(
        &self,
        raster: &RasterHandle,
        region: &Region,
        reducers: &[Reducer],
        scale: f64,
        max_pixels: f64,
    ) -> Result<RegionStats, GatewayError> {
        check_budget(scale, max_pixels)?;
        let FixtureAsset::Image { bands, native_scale_m } = self.load(raster.key())? else {
            return Err(GatewayError::Compute(format!("{} is not an image", raster.key())));
        };

        let stride = (scale / native_scale_m).round().max(1.0) as usize;
        let wanted: Vec<String> = match raster.selected_band() {
            Some(b) => vec![b.to_string()],
            None => bands.keys().cloned().collect(),
        };

        let mut stats = RegionStats::new();
        for band in &wanted {
            let grid = bands
                .get(band)
                .ok_or_else(|| GatewayError::Compute(format!("{} has no band {band:?}", raster.key())))?;
            if !grid.is_well_formed() {
                return Err(GatewayError::Compute(format!("band {band:?} of {} is malformed", raster.key())));
            }

            let summary = grid.summarize(region, stride);
            if summary.sampled as f64 > max_pixels {
                return Err(GatewayError::Compute(format!(
                    "too many pixels in the region: found {}, but max_pixels allows only {max_pixels}",
                    summary.sampled
                )));
            }

            for &reducer in reducers {
                let value = match reducer {
                    Reducer::Mean => summary.mean(),
                    Reducer::Min => summary.min(),
                    Reducer::Max => summary.max(),
                };
                if let Some(v) = value {
                    stats.insert(reducer.output_name(band), v);
                }
            }
        }
        Ok(stats)
    }
}
