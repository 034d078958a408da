// Column-aware reveal delays for a masonry-like layout.
// Items are clustered into columns by their left edge; columns reveal one after another.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::types::ElementRect;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSettings {
    /// Left edges within this many px share a column.
    pub tolerance_px: f64,
    /// Extra delay per column, left to right.
    pub column_stagger_ms: f64,
    /// Extra delay per item down a column.
    pub row_stagger_ms: f64,
    pub base_delay_ms: f64,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        ColumnSettings {
            tolerance_px: 6.0,
            column_stagger_ms: 300.0,
            row_stagger_ms: 0.0,
            base_delay_ms: 200.0,
        }
    }
}

/// Where one item landed and when it should appear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemPlacement {
    pub column: usize,
    pub row: usize,
    pub delay_ms: f64,
}

/// Placements indexed like the input items.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub column_lefts: Vec<f64>,
    pub items: Vec<ItemPlacement>,
}

impl ColumnLayout {
    pub fn column_count(&self) -> usize {
        self.column_lefts.len()
    }
}

/// Cluster `items` into columns relative to `container` and assign delays.
pub fn measure_columns(container: ElementRect, items: &[ElementRect], settings: &ColumnSettings) -> ColumnLayout {
    let lefts: Vec<f64> = items.iter().map(|r| (r.left - container.left).round()).collect();

    let mut column_lefts: Vec<f64> = Vec::new();
    for &l in &lefts {
        if !column_lefts.iter().any(|u| (u - l).abs() < settings.tolerance_px) {
            column_lefts.push(l);
        }
    }
    column_lefts.sort_by(|a, b| a.total_cmp(b));

    let columns: Vec<usize> = lefts.iter().map(|&l| nearest_column(&column_lefts, l)).collect();

    let mut placements = vec![
        ItemPlacement {
            column: 0,
            row: 0,
            delay_ms: settings.base_delay_ms,
        };
        items.len()
    ];
    for col in 0..column_lefts.len() {
        let mut members: Vec<usize> = (0..items.len()).filter(|&i| columns[i] == col).collect();
        members.sort_by(|&a, &b| items[a].top.total_cmp(&items[b].top));
        for (row, &i) in members.iter().enumerate() {
            placements[i] = ItemPlacement {
                column: col,
                row,
                delay_ms: settings.base_delay_ms
                    + col as f64 * settings.column_stagger_ms
                    + row as f64 * settings.row_stagger_ms,
            };
        }
    }

    ColumnLayout {
        column_lefts,
        items: placements,
    }
}

fn nearest_column(column_lefts: &[f64], left: f64) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, u) in column_lefts.iter().enumerate() {
        let d = (u - left).abs();
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

#[derive(Deserialize)]
struct ColumnRequest {
    container: ElementRect,
    items: Vec<ElementRect>,
    #[serde(default)]
    settings: ColumnSettings,
}

/// WASM entry: `{ container, items, settings? }` in, `ColumnLayout` JSON out.
#[wasm_bindgen(js_name = measureColumns)]
pub fn measure_columns_json(request_json: &str) -> Result<String, JsValue> {
    let request: ColumnRequest = serde_json::from_str(request_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid column request: {}", e)))?;
    let layout = measure_columns(request.container, &request.items, &request.settings);
    serde_json::to_string(&layout).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
