//! Page composition.
//!
//! Pulls assets through the cached gateway, adapts them, and builds the page
//! models. No error leaves this module: every failed section becomes a
//! [`Notice`] and the section renders empty.

pub mod view;

use crate::assets::{AssetCatalog, AssetKind, Year};
use crate::config::DashboardConfig;
use crate::error::{GatewayError, MetricError};
use crate::gateway::{CachedBackend, RasterHandle, Reducer, RegionStats, RemoteBackend};
use crate::geometry::Region;
use crate::metrics::{self, format_area_ha, format_density, AccuracyBreakdown};
use crate::palette::{normalize_hex, Palette, VisParams, DENSITY_RAMP, TREND_RAMP};
use crate::table::{project_with, ColumnKind, Schema, Table};

use view::{
    ChartTab, DonutChart, HomePage, LineChart, MapLayer, MapOverlay, MapPage, MetricCard, Notice, NoticeLevel,
    SplitMap,
};

const TREND_COLOR: &str = "#9ACD32";
const NO_PERFORMANCE_DATA: &str = "No RMSE or observed data for this year.";

/// The dashboard back end: one cached gateway, one region, one config.
pub struct Dashboard<B> {
    backend: CachedBackend<B>,
    config: DashboardConfig,
    catalog: AssetCatalog,
    region: Region,
}

/// Notices collected while composing one page.
struct Notices(Vec<Notice>);

impl Notices {
    fn push(&mut self, section: &'static str, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Error => log::warn!("[{section}] {message}"),
            _ => log::info!("[{section}] {message}"),
        }
        self.0.push(Notice { section, level, message });
    }
}

fn rmse_schema() -> Schema {
    Schema::new(&[("year", ColumnKind::Integer), ("rmse", ColumnKind::Float)])
}

fn year_span(years: &[Year]) -> String {
    match (years.iter().min(), years.iter().max()) {
        (Some(a), Some(b)) if a != b => format!("{a} - {b}"),
        (Some(a), _) => a.to_string(),
        _ => String::new(),
    }
}

impl<B: RemoteBackend> Dashboard<B> {
    pub fn new(backend: B, config: DashboardConfig) -> Self {
        Self::with_region(backend, config, Region::tanjung_puting())
    }

    pub fn with_region(backend: B, config: DashboardConfig, region: Region) -> Self {
        let catalog = config.catalog();
        Self { backend: CachedBackend::new(backend), config, catalog, region }
    }

    pub fn backend(&self) -> &CachedBackend<B> {
        &self.backend
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Fetch a raster and narrow it to the configured band.
    pub fn raster(&self, kind: AssetKind) -> Result<RasterHandle, GatewayError> {
        self.backend.fetch_raster(&self.catalog.key(kind))?.select(&self.config.band)
    }

    /// Fetch and project a feature collection.
    pub fn table(&self, kind: AssetKind, schema: &Schema) -> Result<Table, GatewayError> {
        let fc = self.backend.fetch_feature_collection(&self.catalog.key(kind))?;
        Ok(project_with(&fc, schema))
    }

    /// Mean, min and max AGB density over the study area for `year`.
    pub fn region_stats(&self, year: Year) -> Result<RegionStats, GatewayError> {
        let raster = self.raster(AssetKind::AgbRaster(year))?;
        let reduce = self.config.reduce;
        self.backend
            .reduce_region(&raster, &self.region, &Reducer::MEAN_MIN_MAX, reduce.scale, reduce.max_pixels)
    }

    /// Model accuracy for `year` from its RMSE row and observed `agbd` series.
    /// `Ok(None)` when either is missing. A zero observed mean yields
    /// [`AccuracyBreakdown::zero_error`].
    pub fn accuracy(&self, year: Year, rmse: &Table) -> Result<Option<AccuracyBreakdown>, GatewayError> {
        let observed =
            self.table(AssetKind::ObservedVsPredicted(year), &Schema::floats(&["agbd", "agbd_predicted"]))?;
        let series = observed.numbers("agbd");
        let rmse_value = rmse.find_first("year", f64::from(year.get())).and_then(|row| row.get("rmse").as_f64());
        let Some(rmse_value) = rmse_value.filter(|_| !series.is_empty()) else {
            return Ok(None);
        };
        // `series` is non-empty, so NoData here means a zero mean.
        let breakdown = match AccuracyBreakdown::compute(rmse_value, &series) {
            Ok(b) => b,
            Err(MetricError::NoData(_)) => AccuracyBreakdown::zero_error(),
        };
        Ok(Some(breakdown))
    }

    /// Load a table, or an empty one plus a notice.
    fn table_or_empty(&self, kind: AssetKind, schema: &Schema, section: &'static str, notices: &mut Notices) -> Table {
        self.table(kind, schema).unwrap_or_else(|e| {
            notices.push(section, NoticeLevel::Error, format!("Error loading {}: {e}", self.catalog.key(kind).name()));
            Table::empty(schema)
        })
    }

    pub fn home_page(&self) -> HomePage {
        let mut notices = Notices(Vec::new());
        let years = self.config.all_years();
        let band = &self.config.band;

        let split_map = match years.first() {
            None => None,
            Some(&first) => {
                let left = self.raster(AssetKind::AgbRaster(first));
                let right = self.raster(AssetKind::AgbTrend);
                match (left, right) {
                    (Ok(l), Ok(r)) => {
                        let left = MapLayer {
                            name: format!("AGB {first}"),
                            raster: l,
                            vis: VisParams::new(0.0, 300.0, normalize_hex(DENSITY_RAMP), band),
                        };
                        let right = MapLayer {
                            name: "Trend AGB".to_string(),
                            raster: r,
                            vis: VisParams::new(-20.0, 5.0, normalize_hex(TREND_RAMP), band),
                        };
                        Some(SplitMap {
                            view: self.config.home_view,
                            left_colorbar: left.colorbar(format!("AGB {first} (Ton/Ha)")),
                            right_colorbar: right.colorbar("Trend AGB (Ton/Ha/year)"),
                            left,
                            right,
                        })
                    }
                    (l, r) => {
                        for e in [l.err(), r.err()].into_iter().flatten() {
                            notices.push("split_map", NoticeLevel::Error, format!("Failed to load data: {e}"));
                        }
                        None
                    }
                }
            }
        };

        let mut summary = vec![
            MetricCard { label: "Study Area".into(), value: self.region.name().to_string(), help: None },
            MetricCard { label: "Area Coverage".into(), value: format_area_ha(self.region.area_ha()), help: None },
        ];
        if let Some(card) = self.model_accuracy_card(&years, &mut notices) {
            summary.push(card);
        }
        summary.push(MetricCard {
            label: "Years Analyzed".into(),
            value: year_span(&years).replace(' ', ""),
            help: None,
        });

        log::info!("composed home page ({} notices)", notices.0.len());
        HomePage {
            title: format!("Aboveground Biomass Monitor System for {}", self.region.name()),
            split_map,
            summary,
            notices: notices.0,
        }
    }

    /// Mean accuracy over every year that has RMSE and observations.
    fn model_accuracy_card(&self, years: &[Year], notices: &mut Notices) -> Option<MetricCard> {
        let rmse = self.table_or_empty(AssetKind::RmsePerYear, &rmse_schema(), "summary", notices);
        let accuracies: Vec<f64> = years
            .iter()
            .filter_map(|&y| match self.accuracy(y, &rmse) {
                Ok(b) => b.map(|b| b.accuracy_pct),
                Err(e) => {
                    log::debug!("no accuracy for {y}: {e}");
                    None
                }
            })
            .collect();
        let Some(mean) = metrics::mean(&accuracies) else {
            notices.push("summary", NoticeLevel::Info, "Model accuracy is not available.");
            return None;
        };
        Some(MetricCard {
            label: "Model Accuracy".into(),
            value: format!("{mean:.1}%"),
            help: Some(format!("Mean over {} of {} years", accuracies.len(), years.len())),
        })
    }

    pub fn map_page(&self, year: Year, palette: Palette) -> MapPage {
        let mut notices = Notices(Vec::new());

        let totals_schema = Schema::new(&[("year", ColumnKind::Integer), ("total_agb", ColumnKind::Float)]);
        let change_schema = Schema::new(&[("year", ColumnKind::Integer), ("change", ColumnKind::Float)]);
        let totals = self.table_or_empty(AssetKind::YearlyTotals, &totals_schema, "trends", &mut notices);
        let change = self.table_or_empty(AssetKind::YearlyChange, &change_schema, "trends", &mut notices);
        let rmse = self.table_or_empty(AssetKind::RmsePerYear, &rmse_schema(), "performance", &mut notices);

        let overlay = self.overlay(year, palette, &mut notices);
        let statistics = self.statistics(year, &mut notices);
        let performance = self.performance(year, &rmse, &mut notices);

        let span = year_span(&self.config.all_years());
        let trends = vec![
            self.trend_tab(
                "Total Aboveground Biomass",
                &span,
                "The total mass of living vegetation above the ground surface within the study area",
                &totals,
                ("total_agb", "AGB (Ton)"),
                &mut notices,
            ),
            self.trend_tab(
                "Model RMSE",
                &span,
                "Predictive accuracy measure that calculates the average difference between predicted and actual values.",
                &rmse,
                ("rmse", "RMSE (Ton/Ha)"),
                &mut notices,
            ),
            self.trend_tab(
                "AGB Change",
                &span,
                "Year-over-year change in total aboveground biomass",
                &change,
                ("change", "Change (Ton)"),
                &mut notices,
            ),
        ];

        log::info!("composed map page for {year} with {palette} ({} notices)", notices.0.len());
        MapPage { year: year.get(), palette, overlay, statistics, performance, trends, notices: notices.0 }
    }

    fn overlay(&self, year: Year, palette: Palette, notices: &mut Notices) -> Option<MapOverlay> {
        match self.raster(AssetKind::AgbRaster(year)) {
            Ok(raster) => {
                let layer = MapLayer {
                    name: format!("AGB {year}"),
                    raster,
                    vis: VisParams::new(0.0, 300.0, palette.colors(), &self.config.band),
                };
                Some(MapOverlay { view: self.config.map_view, colorbar: layer.colorbar("AGB (Ton/Ha)"), layer })
            }
            Err(e) => {
                notices.push("map", NoticeLevel::Error, format!("AGB data for {year} not available: {e}"));
                None
            }
        }
    }

    fn statistics(&self, year: Year, notices: &mut Notices) -> Vec<MetricCard> {
        let stats = match self.region_stats(year) {
            Ok(s) => s,
            Err(e) => {
                notices.push("statistics", NoticeLevel::Error, format!("Error calculating stats: {e}"));
                return Vec::new();
            }
        };
        let band = &self.config.band;
        let Some(mean) = stats.stat(band, Reducer::Mean) else {
            notices.push(
                "statistics",
                NoticeLevel::Warning,
                format!("No AGB values for {year} inside {}.", self.region.name()),
            );
            return Vec::new();
        };

        let mut cards = vec![MetricCard {
            label: format!("Average AGB {year}"),
            value: format_density(mean),
            help: Some("Average aboveground biomass value per hectare (Density)".into()),
        }];
        for (reducer, label) in [(Reducer::Min, "Minimum"), (Reducer::Max, "Maximum")] {
            if let Some(v) = stats.stat(band, reducer) {
                cards.push(MetricCard { label: format!("{label} AGB {year}"), value: format_density(v), help: None });
            }
        }
        cards
    }

    fn performance(&self, year: Year, rmse: &Table, notices: &mut Notices) -> Option<DonutChart> {
        match self.accuracy(year, rmse) {
            Ok(Some(b)) => {
                if b.out_of_range {
                    notices.push(
                        "performance",
                        NoticeLevel::Warning,
                        format!("Model accuracy {} is outside 0-100%: RMSE exceeds the mean observed AGB.", b.label()),
                    );
                }
                Some(DonutChart::from_breakdown(b))
            }
            Ok(None) => {
                notices.push("performance", NoticeLevel::Info, NO_PERFORMANCE_DATA);
                None
            }
            Err(e) => {
                notices.push("performance", NoticeLevel::Error, format!("Error loading performance data: {e}"));
                None
            }
        }
    }

    fn trend_tab(
        &self,
        tab: &str,
        span: &str,
        help: &str,
        table: &Table,
        (y, y_label): (&str, &str),
        notices: &mut Notices,
    ) -> ChartTab {
        let chart = if table.is_empty() {
            notices.push("trends", NoticeLevel::Warning, format!("{tab} data is not available."));
            None
        } else {
            Some(LineChart {
                x: "year".into(),
                y: y.into(),
                x_label: "Year".into(),
                y_label: y_label.into(),
                color: TREND_COLOR,
                data: table.sorted_by("year"),
            })
        };
        ChartTab { tab: tab.to_string(), title: format!("{tab} {span}"), help: help.to_string(), chart }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FixtureBackend;
    use serde_json::{json, Value};
    use std::fs;
    use std::path::Path;

    fn write(root: &Path, key: &str, body: Value) {
        let path = root.join(format!("{key}.json"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body.to_string()).unwrap();
    }

    fn table(rows: Value) -> Value {
        let features: Vec<Value> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|p| json!({"type": "Feature", "geometry": null, "properties": p}))
            .collect();
        json!({"type": "FeatureCollection", "features": features})
    }

    /// One raster covering the park with constant value `v`, nodata elsewhere.
    fn raster(v: f64) -> Value {
        json!({
            "type": "Image",
            "native_scale_m": 100,
            "bands": {"agbd": {
                "width": 3, "height": 3,
                "min_lon": 111.6, "max_lon": 112.3, "min_lat": -3.6, "max_lat": -2.5,
                "data": [v, v, null, v, v, v, null, v, null]
            }}
        })
    }

    fn seed(root: &Path) {
        let ns = "projects/ee-sorayatriutami/assets/agb";
        write(root, &format!("{ns}/agb_2021"), raster(150.0));
        write(root, &format!("{ns}/agb_trend"), raster(-2.0));
        write(root, &format!("{ns}/AGBP_per_year"), table(json!([
            {"year": 2023, "total_agb": 5.1e7},
            {"year": 2021, "total_agb": 5.4e7},
            {"year": 2022, "total_agb": 5.2e7}
        ])));
        write(root, &format!("{ns}/RMSE_per_year"), table(json!([
            {"year": 2021, "rmse": 30.0},
            {"year": 2022, "rmse": 28.5}
        ])));
        write(root, &format!("{ns}/Observed_vs_Predicted_2021"), table(json!([
            {"agbd": 100.0, "agbd_predicted": 90.0},
            {"agbd": 200.0, "agbd_predicted": 210.0},
            {"agbd": null}
        ])));
    }

    fn dashboard(root: &Path) -> Dashboard<FixtureBackend> {
        Dashboard::new(FixtureBackend::new(root), DashboardConfig::default())
    }

    fn year(y: u16) -> Year {
        DashboardConfig::default().year(y).unwrap()
    }

    #[test]
    fn region_stats_for_2021_render_with_unit() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let d = dashboard(dir.path());
        let stats = d.region_stats(year(2021)).unwrap();
        for r in Reducer::MEAN_MIN_MAX {
            assert!(stats.stat("agbd", r).is_some(), "missing {r}");
        }
        assert_eq!(format_density(stats.stat("agbd", Reducer::Mean).unwrap()), "150.0 Ton/ha");
    }

    #[test]
    fn map_page_2021_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let page = dashboard(dir.path()).map_page(year(2021), Palette::Viridis);

        let overlay = page.overlay.as_ref().unwrap();
        assert_eq!(overlay.layer.name, "AGB 2021");
        assert_eq!(overlay.layer.vis.palette, Palette::Viridis.colors());
        assert_eq!(overlay.layer.raster.selected_band(), Some("agbd"));

        assert_eq!(page.statistics[0].label, "Average AGB 2021");
        assert_eq!(page.statistics[0].value, "150.0 Ton/ha");

        let donut = page.performance.as_ref().unwrap();
        assert_eq!(donut.label, "80.0%");
        assert_eq!(donut.segments[0].category, "Error");

        let totals = page.trends[0].chart.as_ref().unwrap();
        assert_eq!(totals.data.numbers("year"), vec![2021.0, 2022.0, 2023.0]);
        assert_eq!(page.trends[0].title, "Total Aboveground Biomass 2021 - 2023");

        // AGBP_Diff_per_year was never seeded.
        assert!(page.trends[2].chart.is_none());
        assert_eq!(page.notices_for("trends").count(), 2);
        assert_eq!(page.notices_for("map").count(), 0);
    }

    #[test]
    fn missing_year_degrades_to_notices() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let page = dashboard(dir.path()).map_page(year(2022), Palette::Greens);
        assert!(page.overlay.is_none());
        assert!(page.statistics.is_empty());
        assert!(page.performance.is_none());
        assert_eq!(page.notices_for("map").next().unwrap().level, NoticeLevel::Error);
        assert_eq!(page.notices_for("statistics").count(), 1);
        assert_eq!(page.notices_for("performance").count(), 1);
    }

    #[test]
    fn rmse_without_observations_is_info_notice() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        write(
            dir.path(),
            "projects/ee-sorayatriutami/assets/agb/Observed_vs_Predicted_2021",
            table(json!([])),
        );
        let page = dashboard(dir.path()).map_page(year(2021), Palette::Earth);
        assert!(page.performance.is_none());
        let n = page.notices_for("performance").next().unwrap();
        assert_eq!((n.level, n.message.as_str()), (NoticeLevel::Info, NO_PERFORMANCE_DATA));
    }

    #[test]
    fn repeated_renders_reuse_cached_queries() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let d = dashboard(dir.path());
        let first = d.map_page(year(2021), Palette::Greens);
        let before = d.backend().report();
        let second = d.map_page(year(2021), Palette::Greens);
        let after = d.backend().report();
        assert_eq!(first, second);
        assert_eq!(before.reductions.misses, after.reductions.misses);
        assert_eq!(before.rasters.misses, after.rasters.misses);
        assert!(after.collections.hits > before.collections.hits);
    }

    #[test]
    fn home_page_split_map() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let page = dashboard(dir.path()).home_page();
        let split = page.split_map.unwrap();
        assert_eq!(split.left.name, "AGB 2021");
        assert_eq!(split.right_colorbar.label, "Trend AGB (Ton/Ha/year)");
        assert_eq!((split.right.vis.min, split.right.vis.max), (-20.0, 5.0));
        let labels: Vec<&str> = page.summary.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Study Area", "Area Coverage", "Model Accuracy", "Years Analyzed"]);
        assert!(page.summary[1].value.ends_with(" Ha"));
        // Only 2021 has observations; 30 against a mean of 150.
        assert_eq!(page.summary[2].value, "80.0%");
        assert_eq!(page.summary[3].value, "2021-2023");
        assert!(page.notices.is_empty());
    }

    #[test]
    fn home_page_without_trend_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        fs::remove_file(dir.path().join("projects/ee-sorayatriutami/assets/agb/agb_trend.json")).unwrap();
        let page = dashboard(dir.path()).home_page();
        assert!(page.split_map.is_none());
        assert_eq!(page.notices.len(), 1);
        assert_eq!(page.notices[0].level, NoticeLevel::Error);
    }

    #[test]
    fn page_serializes_for_rendering_surface() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let page = dashboard(dir.path()).map_page(year(2021), Palette::Plasma);
        let v = serde_json::to_value(&page).unwrap();
        assert_eq!(v["palette"], "Plasma");
        assert_eq!(v["statistics"][0]["value"], "150.0 Ton/ha");
        assert_eq!(v["trends"][0]["chart"]["data"]["rows"][0], json!([2021, 5.4e7]));
    }

    #[test]
    fn zero_observed_mean_renders_full_accuracy_donut() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        write(
            dir.path(),
            "projects/ee-sorayatriutami/assets/agb/Observed_vs_Predicted_2021",
            table(json!([{"agbd": 0.0, "agbd_predicted": 4.0}, {"agbd": 0.0, "agbd_predicted": 2.0}])),
        );
        let page = dashboard(dir.path()).map_page(year(2021), Palette::Greens);
        let donut = page.performance.as_ref().unwrap();
        assert_eq!(donut.label, "100.0%");
        assert_eq!(donut.segments[0].value, 0.0);
        assert_eq!(page.notices_for("performance").count(), 0);
    }

    #[test]
    fn rmse_above_observed_mean_warns() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        write(
            dir.path(),
            "projects/ee-sorayatriutami/assets/agb/Observed_vs_Predicted_2021",
            table(json!([{"agbd": 10.0}, {"agbd": 20.0}])),
        );
        let page = dashboard(dir.path()).map_page(year(2021), Palette::Greens);
        let donut = page.performance.as_ref().unwrap();
        assert!(donut.breakdown.out_of_range);
        assert_eq!(donut.label, "-100.0%");
        let n = page.notices_for("performance").next().unwrap();
        assert_eq!(n.level, NoticeLevel::Warning);
    }

    #[test]
    fn home_page_without_rmse_omits_accuracy_card() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        fs::remove_file(dir.path().join("projects/ee-sorayatriutami/assets/agb/RMSE_per_year.json")).unwrap();
        let page = dashboard(dir.path()).home_page();
        assert!(page.summary.iter().all(|c| c.label != "Model Accuracy"));
        let levels: Vec<NoticeLevel> = page.notices.iter().map(|n| n.level).collect();
        assert_eq!(levels, [NoticeLevel::Error, NoticeLevel::Info]);
    }
}
