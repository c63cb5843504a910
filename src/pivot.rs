use anyhow::Result;
use std::collections::{BTreeMap, HashMap};

use crate::data::{Measure, RecordTable};
use crate::style::join_key;
use crate::ChartError;

/// Column key of a wide table: category value, then the optional second
/// dimension value, then the optional scenario label.
pub type SeriesKey = Vec<String>;

/// Row key of a wide table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub axis: String,
    pub scenario: Option<String>,
    /// Position of the scenario in the caller's list (0 when scenarios are not in the row key).
    pub order: usize,
}

/// Pivoted data handed to the renderer: one row per axis value (and
/// scenario, for stacked bars), one column per category combination.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub axis_column: String,
    pub rows: Vec<RowKey>,
    pub columns: Vec<SeriesKey>,
    /// `values[row][column]`, zero where no observation exists.
    pub values: Vec<Vec<f64>>,
}

impl WideTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, key: &[String]) -> Option<usize> {
        self.columns.iter().position(|c| c.as_slice() == key)
    }

    pub fn column(&self, key: &[String]) -> Option<Vec<f64>> {
        let idx = self.column_index(key)?;
        Some(self.values.iter().map(|row| row[idx]).collect())
    }

    pub fn axis_values(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.axis.as_str()).collect()
    }

    /// Sum of every cell.
    pub fn total(&self) -> f64 {
        self.values.iter().flatten().sum()
    }
}

/// Which values to pull out of the record tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparisonRequest {
    /// Axis column, usually the year.
    pub x_var: String,
    /// Category column whose values become series or stacked segments.
    pub y_var: String,
    /// Axis values in display order.
    pub years: Vec<String>,
    /// Category values in display order (bottom to top for stacked bars).
    pub data: Vec<String>,
    pub z: Option<Dimension>,
    /// Keep only rows where this column equals this value.
    pub narrow: Option<(String, String)>,
}

impl ComparisonRequest {
    pub fn new<Y, D, S, T>(x_var: &str, y_var: &str, years: Y, data: D) -> Self
    where
        Y: IntoIterator<Item = S>,
        S: Into<String>,
        D: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            x_var: x_var.to_string(),
            y_var: y_var.to_string(),
            years: years.into_iter().map(Into::into).collect(),
            data: data.into_iter().map(Into::into).collect(),
            z: None,
            narrow: None,
        }
    }

    pub fn with_z<V, S>(mut self, column: &str, values: V) -> Self
    where
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.z = Some(Dimension {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn narrowed_to(mut self, column: &str, value: &str) -> Self {
        self.narrow = Some((column.to_string(), value.to_string()));
        self
    }
}

/// A second categorical dimension and the values to keep from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub column: String,
    pub values: Vec<String>,
}

/// The scenario that alone keeps its row for the baseline axis value.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub scenario: String,
    pub axis_value: String,
}

/// Where the scenario label ends up in the wide table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScenarioPlacement {
    /// Part of the row key (stacked bars).
    Rows,
    /// Last part of the column key (multi-scenario series).
    Columns,
    /// Single-scenario charts.
    Omitted,
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

fn position(wanted: &[String], value: &str) -> Option<usize> {
    wanted.iter().position(|w| w == value)
}

type RowOrd = (usize, usize);
type ColOrd = (usize, usize, usize);

/// Filter each source table to the request and pivot the result.
///
/// Rows follow the requested axis order, then the scenario order. Columns
/// follow the nested request order and only exist for combinations that
/// were observed. Source tables are read, never modified.
pub(crate) fn reshape(
    sources: &[(&str, &RecordTable)],
    request: &ComparisonRequest,
    placement: ScenarioPlacement,
    baseline: Option<&Baseline>,
) -> Result<WideTable> {
    let mut rows: BTreeMap<RowOrd, RowKey> = BTreeMap::new();
    let mut columns: BTreeMap<ColOrd, SeriesKey> = BTreeMap::new();
    let mut cells: HashMap<(RowOrd, ColOrd), f64> = HashMap::new();

    for (order, (label, table)) in sources.iter().enumerate() {
        let (measure, measure_idx) = Measure::resolve(table)?;
        let x_idx = table.require_column(&request.x_var)?;
        let y_idx = table.require_column(&request.y_var)?;
        let z = match &request.z {
            Some(dim) => Some((table.require_column(&dim.column)?, dim)),
            None => None,
        };
        let narrow = match &request.narrow {
            Some((col, value)) => Some((table.require_column(col)?, value.as_str())),
            None => None,
        };
        let drop_baseline = match (placement, baseline) {
            (ScenarioPlacement::Rows, Some(b)) if b.scenario != *label => Some(b.axis_value.as_str()),
            _ => None,
        };

        let mut kept = 0usize;
        for row in &table.rows {
            let axis = cell(row, x_idx);
            let category = cell(row, y_idx);
            let Some(year_pos) = position(&request.years, axis) else { continue };
            let Some(data_pos) = position(&request.data, category) else { continue };
            let z_pos = match z {
                Some((idx, dim)) => match position(&dim.values, cell(row, idx)) {
                    Some(p) => p,
                    None => continue,
                },
                None => 0,
            };
            if let Some((idx, value)) = narrow {
                if cell(row, idx) != value {
                    continue;
                }
            }
            if drop_baseline == Some(axis) {
                continue;
            }

            let value = measure.parse(cell(row, measure_idx))?;

            let row_ord = match placement {
                ScenarioPlacement::Rows => (year_pos, order),
                _ => (year_pos, 0),
            };
            let col_ord = match placement {
                ScenarioPlacement::Columns => (data_pos, z_pos, order),
                _ => (data_pos, z_pos, 0),
            };

            rows.entry(row_ord).or_insert_with(|| RowKey {
                axis: axis.to_string(),
                scenario: (placement == ScenarioPlacement::Rows).then(|| label.to_string()),
                order: row_ord.1,
            });
            let key = columns.entry(col_ord).or_insert_with(|| {
                let mut key = vec![category.to_string()];
                if let Some((idx, _)) = z {
                    key.push(cell(row, idx).to_string());
                }
                if placement == ScenarioPlacement::Columns {
                    key.push(label.to_string());
                }
                key
            });

            if cells.insert((row_ord, col_ord), value).is_some() {
                return Err(ChartError::AmbiguousPivot {
                    axis: axis.to_string(),
                    series: join_key(key),
                }
                .into());
            }
            kept += 1;
        }
        log::trace!(
            "scenario '{}': kept {} of {} rows using '{}'",
            label,
            kept,
            table.len(),
            measure.name()
        );
    }

    let row_ords: Vec<RowOrd> = rows.keys().copied().collect();
    let col_ords: Vec<ColOrd> = columns.keys().copied().collect();
    let values = row_ords
        .iter()
        .map(|r| {
            col_ords
                .iter()
                .map(|c| cells.get(&(*r, *c)).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();

    Ok(WideTable {
        axis_column: request.x_var.clone(),
        rows: rows.into_values().collect(),
        columns: columns.into_values().collect(),
        values,
    })
}
