/// Renders one dashboard page model as JSON.
///
/// Home page:  split map (AGB 2021 vs trend) and study-area summary.
/// Map page:   AGB overlay for a year, region statistics, model accuracy
///             donut and the yearly trend charts.
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};

use agb_core::config::DashboardConfig;
use agb_core::dashboard::Dashboard;
use agb_core::gateway::{BackendSource, RemoteBackend};
use agb_core::palette::Palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Page {
    Home,
    Map,
}

#[derive(Parser, Debug)]
#[command(name = "dashboard", about = "Compose an AGB dashboard page as JSON")]
struct Args {
    #[arg(long, value_enum, default_value = "home")]
    page: Page,

    /// Year shown on the map page.
    #[arg(short, long, default_value = "2021")]
    year: u16,

    /// Colour palette of the map overlay (Greens, Viridis, Plasma, Earth).
    #[arg(short, long, default_value = "Greens")]
    palette: Palette,

    /// Read assets from this fixture directory instead of Earth Engine.
    #[arg(long, conflicts_with = "token")]
    fixtures: Option<PathBuf>,

    /// Earth Engine OAuth access token (falls back to $EE_ACCESS_TOKEN).
    #[arg(long)]
    token: Option<String>,

    /// JSON config file; missing fields take their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the page here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn render<B: RemoteBackend>(dashboard: &Dashboard<B>, args: &Args) -> Result<String> {
    let json = match args.page {
        Page::Home => serde_json::to_string_pretty(&dashboard.home_page())?,
        Page::Map => {
            let config = dashboard.config();
            let year = config
                .year(args.year)
                .ok_or_else(|| anyhow!("year {} is not one of {:?}", args.year, config.years))?;
            serde_json::to_string_pretty(&dashboard.map_page(year, args.palette))?
        }
    };
    Ok(json)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DashboardConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    let source = match &args.fixtures {
        Some(root) => BackendSource::Fixtures(root.clone()),
        None => BackendSource::EarthEngine {
            access_token: args.token.clone().or_else(|| std::env::var("EE_ACCESS_TOKEN").ok()),
        },
    };
    let backend = source.open(&config).context("opening backend")?;
    let dashboard = Dashboard::new(backend, config);

    let json = render(&dashboard, &args)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }

    let report = dashboard.backend().report();
    log::debug!("cache: {report:?}");
    Ok(())
}
