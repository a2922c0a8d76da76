/// Asset probe: resolves every catalog asset against the configured backend
/// and runs the statistics reduction for each year. Prints a JSON report and
/// exits non-zero when any asset is unusable.
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use agb_core::assets::{AssetCatalog, AssetKind};
use agb_core::config::DashboardConfig;
use agb_core::gateway::{BackendSource, Reducer, RegionStats, RemoteBackend};
use agb_core::geometry::Region;

#[derive(Parser, Debug)]
#[command(name = "agb-probe", about = "Check that every AGB asset resolves and reduces")]
struct Args {
    /// Read assets from this fixture directory instead of Earth Engine.
    #[arg(long, conflicts_with = "token")]
    fixtures: Option<PathBuf>,

    /// Earth Engine OAuth access token (falls back to $EE_ACCESS_TOKEN).
    #[arg(long)]
    token: Option<String>,

    /// JSON config file; missing fields take their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct AssetReport {
    key: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<RegionStats>,
}

fn probe(backend: &dyn RemoteBackend, config: &DashboardConfig, kind: AssetKind) -> AssetReport {
    let key = config.catalog().key(kind);
    let outcome = match kind {
        AssetKind::AgbRaster(_) => backend
            .fetch_raster(&key)
            .and_then(|r| r.select(&config.band))
            .and_then(|r| {
                backend.reduce_region(
                    &r,
                    &Region::tanjung_puting(),
                    &Reducer::MEAN_MIN_MAX,
                    config.reduce.scale,
                    config.reduce.max_pixels,
                )
            })
            .map(|stats| (format!("bands reduced: {}", stats.names().count()), Some(stats))),
        AssetKind::AgbTrend => backend
            .fetch_raster(&key)
            .map(|r| (format!("bands: {}", r.bands().join(", ")), None)),
        _ => backend
            .fetch_feature_collection(&key)
            .map(|fc| (format!("{} features", fc.len()), None)),
    };

    match outcome {
        Ok((detail, stats)) => {
            log::info!("ok   {key}: {detail}");
            AssetReport { key: key.to_string(), ok: true, detail: Some(detail), stats }
        }
        Err(e) => {
            log::warn!("FAIL {key}: {e}");
            AssetReport { key: key.to_string(), ok: false, detail: Some(e.to_string()), stats: None }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DashboardConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    let source = match args.fixtures {
        Some(root) => BackendSource::Fixtures(root),
        None => BackendSource::EarthEngine {
            access_token: args.token.or_else(|| std::env::var("EE_ACCESS_TOKEN").ok()),
        },
    };
    let backend = source.open(&config).context("opening backend")?;

    let reports: Vec<AssetReport> = AssetCatalog::all_kinds(&config.all_years())
        .into_iter()
        .map(|kind| probe(backend.as_ref(), &config, kind))
        .collect();

    println!("{}", serde_json::to_string_pretty(&reports)?);

    let failed = reports.iter().filter(|r| !r.ok).count();
    if failed > 0 {
        bail!("{failed} of {} assets failed", reports.len());
    }
    Ok(())
}
