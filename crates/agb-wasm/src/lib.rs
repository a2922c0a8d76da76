use js_sys::Array;
use wasm_bindgen::prelude::*;

use agb_core::assets::AssetKey;
use agb_core::gateway::{CollectionHandle, Feature};
use agb_core::metrics::{self, AccuracyBreakdown};
use agb_core::palette::Palette;
use agb_core::table::{self, Table};
use serde::Deserialize;

#[derive(Deserialize)]
struct CollectionJson {
    #[serde(default)]
    features: Vec<Feature>,
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn project_json(collection_json: &str, columns: &[String]) -> Result<Table, String> {
    let parsed: CollectionJson =
        serde_json::from_str(collection_json).map_err(|e| format!("Invalid feature collection: {e}"))?;
    let handle = CollectionHandle::new(AssetKey::new("inline"), parsed.features);
    let names: Vec<&str> = columns.iter().map(String::as_str).collect();
    Ok(table::project(&handle, &names))
}

/// Project a GeoJSON FeatureCollection onto `columns` (all numeric).
/// Returns `{columns, rows}`; missing or non-numeric properties are null.
#[wasm_bindgen]
pub fn project_table(collection_json: &str, columns: Array) -> Result<JsValue, JsValue> {
    let columns: Vec<String> = columns.iter().filter_map(|v| v.as_string()).collect();
    let table = project_json(collection_json, &columns).map_err(|e| JsValue::from_str(&e))?;
    to_js(&table)
}

/// Accuracy breakdown `{error_pct, accuracy_pct, out_of_range}` of `error`
/// against the mean of `series`.
#[wasm_bindgen]
pub fn accuracy(error: f64, series: &[f64]) -> Result<JsValue, JsValue> {
    let breakdown = AccuracyBreakdown::compute(error, series).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_js(&breakdown)
}

/// Hex colours of a named palette, or an error for unknown names.
#[wasm_bindgen]
pub fn palette(name: &str) -> Result<Array, JsValue> {
    let palette: Palette = name.parse().map_err(|e: String| JsValue::from_str(&e))?;
    Ok(palette.colors().into_iter().map(JsValue::from).collect())
}

#[wasm_bindgen]
pub fn format_density(value: f64) -> String {
    metrics::format_density(value)
}
