//! Asset keys and the catalog that builds them.
//!
//! Every remote object is named `<namespace>/<category>/<name>` or, for
//! per-year assets, `<namespace>/<category>/<name>_<year>`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default Earth Engine asset namespace holding the precomputed results.
pub const DEFAULT_NAMESPACE: &str = "projects/ee-sorayatriutami/assets";
pub const DEFAULT_CATEGORY: &str = "agb";

/// Years with precomputed AGB rasters.
pub const DEFAULT_YEARS: [u16; 3] = [2021, 2022, 2023];

/// Opaque identifier of one remote raster or feature collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments of the key. Empty segments are kept so callers can
    /// reject malformed keys.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last path segment, e.g. `agb_2021`.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A year picked from the dashboard's year selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(u16);

impl Year {
    /// Accept `value` only when it is one of `allowed`.
    pub fn checked(value: u16, allowed: &[u16]) -> Option<Self> {
        allowed.contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical assets the dashboard reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Single-band AGB density raster for one year.
    AgbRaster(Year),
    /// Per-pixel AGB trend raster (Ton/Ha/year).
    AgbTrend,
    /// Total AGB per year.
    YearlyTotals,
    /// Year-over-year AGB change.
    YearlyChange,
    /// Model RMSE per year.
    RmsePerYear,
    /// Observed vs predicted AGB sample pairs for one year.
    ObservedVsPredicted(Year),
}

impl AssetKind {
    pub fn is_raster(self) -> bool {
        matches!(self, AssetKind::AgbRaster(_) | AssetKind::AgbTrend)
    }
}

/// Builds asset keys deterministically from namespace, category and year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCatalog {
    namespace: String,
    category: String,
}

impl AssetCatalog {
    pub fn new(namespace: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into().trim_end_matches('/').to_string(),
            category: category.into().trim_matches('/').to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self, kind: AssetKind) -> AssetKey {
        let name = match kind {
            AssetKind::AgbRaster(year) => format!("agb_{year}"),
            AssetKind::AgbTrend => "agb_trend".to_string(),
            AssetKind::YearlyTotals => "AGBP_per_year".to_string(),
            AssetKind::YearlyChange => "AGBP_Diff_per_year".to_string(),
            AssetKind::RmsePerYear => "RMSE_per_year".to_string(),
            AssetKind::ObservedVsPredicted(year) => format!("Observed_vs_Predicted_{year}"),
        };
        AssetKey(format!("{}/{}/{}", self.namespace, self.category, name))
    }

    /// Every logical asset for the given years, rasters first.
    pub fn all_kinds(years: &[Year]) -> Vec<AssetKind> {
        let mut kinds: Vec<AssetKind> = years.iter().map(|&y| AssetKind::AgbRaster(y)).collect();
        kinds.push(AssetKind::AgbTrend);
        kinds.push(AssetKind::YearlyTotals);
        kinds.push(AssetKind::YearlyChange);
        kinds.push(AssetKind::RmsePerYear);
        kinds.extend(years.iter().map(|&y| AssetKind::ObservedVsPredicted(y)));
        kinds
    }
}

impl Default for AssetCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE, DEFAULT_CATEGORY)
    }
}
