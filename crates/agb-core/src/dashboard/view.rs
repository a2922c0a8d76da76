//! Serializable page models handed to the rendering surface.

use serde::Serialize;

use crate::coords::MapView;
use crate::gateway::RasterHandle;
use crate::metrics::AccuracyBreakdown;
use crate::palette::{Palette, VisParams};
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Inline message shown in place of (or next to) a page section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub section: &'static str,
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    pub name: String,
    pub raster: RasterHandle,
    pub vis: VisParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Colorbar {
    pub label: String,
    pub vis: VisParams,
}

impl MapLayer {
    pub fn colorbar(&self, label: impl Into<String>) -> Colorbar {
        Colorbar { label: label.into(), vis: self.vis.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOverlay {
    pub view: MapView,
    pub layer: MapLayer,
    pub colorbar: Colorbar,
}

/// Two rasters compared side by side with a draggable divider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitMap {
    pub view: MapView,
    pub left: MapLayer,
    pub right: MapLayer,
    pub left_colorbar: Colorbar,
    pub right_colorbar: Colorbar,
}

/// A single headline number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricCard {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub x: String,
    pub y: String,
    pub x_label: String,
    pub y_label: String,
    pub color: &'static str,
    /// Rows sorted by `x`; the x axis is categorical.
    pub data: Table,
}

/// One tab of the trend section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartTab {
    pub tab: String,
    pub title: String,
    pub help: String,
    /// Absent when the backing table is empty; a notice explains why.
    pub chart: Option<LineChart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonutSegment {
    pub category: &'static str,
    pub value: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonutChart {
    pub segments: Vec<DonutSegment>,
    /// Centre text, e.g. `"82.4%"`.
    pub label: String,
    pub breakdown: AccuracyBreakdown,
}

impl DonutChart {
    pub const ERROR_COLOR: &'static str = "#E74C3C";
    pub const ACCURACY_COLOR: &'static str = "#4CAF50";

    pub fn from_breakdown(breakdown: AccuracyBreakdown) -> Self {
        Self {
            segments: vec![
                DonutSegment { category: "Error", value: breakdown.error_pct, color: Self::ERROR_COLOR },
                DonutSegment { category: "Accuracy", value: breakdown.accuracy_pct, color: Self::ACCURACY_COLOR },
            ],
            label: breakdown.label(),
            breakdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomePage {
    pub title: String,
    pub split_map: Option<SplitMap>,
    pub summary: Vec<MetricCard>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPage {
    pub year: u16,
    pub palette: Palette,
    pub overlay: Option<MapOverlay>,
    pub statistics: Vec<MetricCard>,
    pub performance: Option<DonutChart>,
    pub trends: Vec<ChartTab>,
    pub notices: Vec<Notice>,
}

impl MapPage {
    pub fn notices_for<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a Notice> + 'a {
        self.notices.iter().filter(move |n| n.section == section)
    }
}
