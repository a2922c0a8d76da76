use serde::{Deserialize, Deserializer, Serialize};

use crate::coords::{Bbox, LatLon};
use crate::geometry::Region;

/// A single-band raster stored as f32 values, row-major.
/// Row 0 is the southernmost row (min_lat). NaN marks nodata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterGrid {
    /// Row-major cell values; `null` in JSON reads as NaN.
    #[serde(deserialize_with = "null_as_nan_vec")]
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

fn null_as_nan_vec<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f32>, D::Error> {
    let v: Vec<Option<f32>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f32::NAN)).collect())
}

/// Running mean/min/max over the valid cells of a raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSummary {
    /// Cells visited inside the region, including nodata.
    pub sampled: u64,
    /// Cells that carried a value.
    pub valid: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl CellSummary {
    fn empty() -> Self {
        Self { sampled: 0, valid: 0, sum: 0.0, min: f64::INFINITY, max: f64::NEG_INFINITY }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.valid > 0).then(|| self.sum / self.valid as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (self.valid > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.valid > 0).then_some(self.max)
    }
}

impl RasterGrid {
    /// Create a new grid filled with the given value.
    pub fn new(width: usize, height: usize, bounds: Bbox, fill: f32) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            min_lon: bounds.min_lon,
            max_lon: bounds.max_lon,
            min_lat: bounds.min_lat,
            max_lat: bounds.max_lat,
        }
    }

    /// True when `data` matches the declared dimensions and the bounds are non-empty.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.width.checked_mul(self.height) == Some(self.data.len())
            && self.max_lon > self.min_lon
            && self.max_lat > self.min_lat
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// Geographic centre of cell (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> LatLon {
        let dx = (self.max_lon - self.min_lon) / self.width as f64;
        let dy = (self.max_lat - self.min_lat) / self.height as f64;
        LatLon::new(
            self.min_lat + (row as f64 + 0.5) * dy,
            self.min_lon + (col as f64 + 0.5) * dx,
        )
    }

    /// Summarise every `stride`-th cell whose centre lies inside `region`.
    /// Cells outside the region's bbox are skipped without a containment test.
    pub fn summarize(&self, region: &Region, stride: usize) -> CellSummary {
        let stride = stride.max(1);
        let bbox = region.bbox();
        let mut acc = CellSummary::empty();

        for r in (0..self.height).step_by(stride) {
            for c in (0..self.width).step_by(stride) {
                let p = self.pixel_center(r, c);
                if !bbox.contains(p) || !region.contains(p) {
                    continue;
                }
                acc.sampled += 1;
                let v = self.get(r, c);
                if v.is_nan() {
                    continue;
                }
                let v = f64::from(v);
                acc.valid += 1;
                acc.sum += v;
                acc.min = acc.min.min(v);
                acc.max = acc.max.max(v);
            }
        }
        acc
    }
}
