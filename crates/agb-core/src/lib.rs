//! Back end of the Tanjung Puting aboveground-biomass dashboard.
//!
//! The crate fetches precomputed AGB rasters and yearly tables through a
//! [`gateway::RemoteBackend`], adapts them to typed tables and derived
//! metrics, and composes serializable page models in [`dashboard`].

pub mod assets;
pub mod cache;
pub mod config;
pub mod coords;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod geometry;
pub mod metrics;
pub mod palette;
pub mod raster;
pub mod table;

pub use assets::{AssetCatalog, AssetKey, AssetKind, Year};
pub use config::DashboardConfig;
pub use dashboard::Dashboard;
pub use error::{ConfigError, GatewayError, MetricError};
pub use gateway::{Reducer, RemoteBackend};
pub use geometry::Region;
pub use palette::Palette;
