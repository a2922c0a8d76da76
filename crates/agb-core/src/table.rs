//! Tabular adapter: projects feature-collection property bags onto a
//! declared, typed column set.
//!
//! Projection never fails. Absent properties, non-numeric values and values
//! that do not fit the column kind all become [`Cell::Null`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::CollectionHandle;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Whole numbers, e.g. `year`. Fractional input becomes null.
    Integer,
    Float,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered set of columns a projection emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Duplicate names keep their first occurrence.
    pub fn new(columns: &[(&str, ColumnKind)]) -> Self {
        let mut out: Vec<Column> = Vec::with_capacity(columns.len());
        for &(name, kind) in columns {
            if !out.iter().any(|c| c.name == name) {
                out.push(Column { name: name.to_string(), kind });
            }
        }
        Self { columns: out }
    }

    /// Every column typed as [`ColumnKind::Float`].
    pub fn floats(names: &[&str]) -> Self {
        let cols: Vec<(&str, ColumnKind)> = names.iter().map(|&n| (n, ColumnKind::Float)).collect();
        Self::new(&cols)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// One table cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Null,
}

impl Cell {
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(v as f64),
            Cell::Float(v) => Some(v),
            Cell::Null => None,
        }
    }

    pub fn is_null(self) -> bool {
        matches!(self, Cell::Null)
    }

    fn cast(value: Option<&Value>, kind: ColumnKind) -> Cell {
        let num = match value {
            Some(Value::Number(n)) => {
                if let (ColumnKind::Integer, Some(i)) = (kind, n.as_i64()) {
                    return Cell::Int(i);
                }
                n.as_f64()
            }
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let Some(v) = num.filter(|v| v.is_finite()) else {
            return Cell::Null;
        };
        match kind {
            ColumnKind::Float => Cell::Float(v),
            ColumnKind::Integer if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Cell::Int(v as i64),
            ColumnKind::Integer => Cell::Null,
        }
    }
}

/// Rectangular result of a projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [Column],
    cells: &'a [Cell],
}

impl Row<'_> {
    pub fn get(&self, column: &str) -> Cell {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .map_or(Cell::Null, |i| self.cells[i])
    }

    pub fn cells(&self) -> &[Cell] {
        self.cells
    }
}

impl Table {
    /// A table with the schema's columns and no rows.
    pub fn empty(schema: &Schema) -> Self {
        Self { columns: schema.columns.clone(), rows: Vec::new() }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row { columns: &self.columns, cells })
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }

    /// All cells of `column`; empty if the column is not declared.
    pub fn column(&self, column: &str) -> Vec<Cell> {
        match self.index_of(column) {
            Some(i) => self.rows.iter().map(|r| r[i]).collect(),
            None => Vec::new(),
        }
    }

    /// Non-null values of `column` as f64.
    pub fn numbers(&self, column: &str) -> Vec<f64> {
        self.column(column).into_iter().filter_map(Cell::as_f64).collect()
    }

    /// Mean of the non-null values of `column`.
    pub fn mean(&self, column: &str) -> Option<f64> {
        metrics::mean(&self.numbers(column))
    }

    /// First row whose `column` equals `value`.
    pub fn find_first(&self, column: &str, value: f64) -> Option<Row<'_>> {
        let i = self.index_of(column)?;
        self.rows
            .iter()
            .find(|r| r[i].as_f64() == Some(value))
            .map(|cells| Row { columns: &self.columns, cells })
    }

    /// Copy sorted ascending by `column`; nulls last, ties keep backend order.
    pub fn sorted_by(&self, column: &str) -> Table {
        let mut rows = self.rows.clone();
        if let Some(i) = self.index_of(column) {
            rows.sort_by(|a, b| match (a[i].as_f64(), b[i].as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }
        Table { columns: self.columns.clone(), rows }
    }
}

/// Project `collection` onto `column_names`, all typed as floats.
pub fn project(collection: &CollectionHandle, column_names: &[&str]) -> Table {
    project_with(collection, &Schema::floats(column_names))
}

/// Project `collection` onto a typed schema: one row per feature in backend
/// order, exactly the schema's columns per row.
pub fn project_with(collection: &CollectionHandle, schema: &Schema) -> Table {
    let rows: Vec<Vec<Cell>> = collection
        .features()
        .iter()
        .map(|f| {
            schema
                .columns
                .iter()
                .map(|c| Cell::cast(f.properties.get(&c.name), c.kind))
                .collect()
        })
        .collect();

    log::debug!(
        "projected {} features of {} onto {:?}",
        rows.len(),
        collection.key(),
        schema.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
    );

    Table { columns: schema.columns.clone(), rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetKey;
    use crate::gateway::Feature;
    use serde_json::json;

    fn collection(props: Vec<Value>) -> CollectionHandle {
        let features = props
            .into_iter()
            .map(|p| Feature { properties: p.as_object().cloned().unwrap_or_default() })
            .collect();
        CollectionHandle::new(AssetKey::new("test/agb/fc"), features)
    }

    #[test]
    fn keeps_cardinality_and_shape() {
        let fc = collection(vec![
            json!({"year": 2023, "total_agb": 3.5, "extra": "x"}),
            json!({"year": 2021, "total_agb": 1.5}),
            json!({"year": 2022}),
        ]);
        let t = project(&fc, &["year", "total_agb"]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.column_names(), vec!["year", "total_agb"]);
        assert!(t.rows().all(|r| r.cells().len() == 2));
    }

    #[test]
    fn empty_collection_projects_to_empty_table() {
        let t = project(&collection(vec![]), &["year", "rmse"]);
        assert!(t.is_empty());
        assert_eq!(t.column_names(), vec!["year", "rmse"]);
        assert_eq!(t.mean("rmse"), None);
    }

    #[test]
    fn missing_property_yields_null() {
        let t = project(&collection(vec![json!({"year": 2022})]), &["year", "change"]);
        let row = t.rows().next().unwrap();
        assert_eq!(row.get("year"), Cell::Float(2022.0));
        assert_eq!(row.get("change"), Cell::Null);
    }

    #[test]
    fn malformed_values_become_null() {
        let schema = Schema::new(&[("year", ColumnKind::Integer), ("rmse", ColumnKind::Float)]);
        let fc = collection(vec![
            json!({"year": "2021", "rmse": "12.5"}),
            json!({"year": 2021.5, "rmse": true}),
            json!({"year": [2021], "rmse": {"v": 1}}),
            json!({"year": 2023.0, "rmse": "n/a"}),
        ]);
        let t = project_with(&fc, &schema);
        assert_eq!(t.column("year"), vec![Cell::Int(2021), Cell::Null, Cell::Null, Cell::Int(2023)]);
        assert_eq!(t.column("rmse"), vec![Cell::Float(12.5), Cell::Null, Cell::Null, Cell::Null]);
    }

    #[test]
    fn duplicate_columns_collapse() {
        let t = project(&collection(vec![json!({"a": 1})]), &["a", "a", "b"]);
        assert_eq!(t.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn sorted_by_puts_nulls_last() {
        let fc = collection(vec![json!({"year": 2023}), json!({}), json!({"year": 2021})]);
        let t = project(&fc, &["year"]).sorted_by("year");
        assert_eq!(t.column("year"), vec![Cell::Float(2021.0), Cell::Float(2023.0), Cell::Null]);
    }

    #[test]
    fn find_first_matches_numeric_value() {
        let schema = Schema::new(&[("year", ColumnKind::Integer), ("rmse", ColumnKind::Float)]);
        let fc = collection(vec![json!({"year": 2021, "rmse": 40.0}), json!({"year": 2022, "rmse": 35.0})]);
        let t = project_with(&fc, &schema);
        assert_eq!(t.find_first("year", 2022.0).map(|r| r.get("rmse")), Some(Cell::Float(35.0)));
        assert!(t.find_first("year", 2030.0).is_none());
    }

    #[test]
    fn cells_serialize_as_plain_json() {
        let t = project(&collection(vec![json!({"a": 1.5})]), &["a", "b"]);
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["rows"], json!([[1.5, null]]));
    }
}
