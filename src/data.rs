use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::ChartError;

/// One named entity's observations: string cells under named columns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct RecordTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecordTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from container records, one JSON object per record.
    ///
    /// Columns are the union of record fields in first-seen order; a field a
    /// record lacks reads as an empty cell. `[]` is a symbol with no records.
    pub fn from_json(value: &Value) -> Result<Self> {
        let records = value
            .as_array()
            .ok_or_else(|| anyhow!("Symbol records must be an array of objects"))?;

        let mut objects = Vec::with_capacity(records.len());
        let mut headers: Vec<String> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let fields = record
                .as_object()
                .ok_or_else(|| anyhow!("Record {} is not an object", i))?;
            for field in fields.keys() {
                if !headers.contains(field) {
                    headers.push(field.clone());
                }
            }
            objects.push(fields);
        }

        let rows = objects
            .iter()
            .enumerate()
            .map(|(i, fields)| {
                headers
                    .iter()
                    .map(|column| match fields.get(column) {
                        Some(Value::String(s)) => Ok(s.clone()),
                        Some(Value::Number(n)) => Ok(n.to_string()),
                        Some(Value::Bool(b)) => Ok(b.to_string()),
                        Some(Value::Null) | None => Ok(String::new()),
                        Some(_) => Err(anyhow!(
                            "Record {} has a nested value in column '{}'",
                            i,
                            column
                        )),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, ChartError> {
        self.column_index(name)
            .ok_or_else(|| ChartError::ColumnNotFound(name.to_string()))
    }

    /// True if at least one row holds `value` in column `col`.
    pub fn contains_value(&self, col: usize, value: &str) -> bool {
        self.rows.iter().any(|row| row.get(col).map(String::as_str) == Some(value))
    }

    /// Distinct values of a column in first-seen order.
    pub fn distinct(&self, col: usize) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if let Some(cell) = row.get(col) {
                if !seen.contains(&cell.as_str()) {
                    seen.push(cell);
                }
            }
        }
        seen
    }
}

impl TryFrom<Value> for RecordTable {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json(&value)
    }
}

/// The measurement column of a record table.
///
/// Parameters carry "value", variables and equations carry "level".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Value,
    Level,
}

impl Measure {
    /// "value" wins when a table carries both columns.
    pub fn resolve(table: &RecordTable) -> Result<(Measure, usize), ChartError> {
        if let Some(idx) = table.column_index("value") {
            Ok((Measure::Value, idx))
        } else if let Some(idx) = table.column_index("level") {
            Ok((Measure::Level, idx))
        } else {
            Err(ChartError::MissingMeasurement)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Measure::Value => "value",
            Measure::Level => "level",
        }
    }

    pub fn parse(&self, cell: &str) -> Result<f64, ChartError> {
        cell.trim().parse::<f64>().map_err(|_| ChartError::InvalidMeasurement {
            column: self.name().to_string(),
            value: cell.to_string(),
        })
    }
}

/// A record table plus the label it is displayed under.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub label: String,
    pub table: RecordTable,
}

impl Scenario {
    pub fn new(label: impl Into<String>, table: RecordTable) -> Self {
        Self { label: label.into(), table }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::table;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_measure_prefers_value() {
        let both = table(&["year", "level", "value"], &[&["2020", "1", "2"]]);
        assert_eq!(Measure::resolve(&both).unwrap(), (Measure::Value, 2));

        let level_only = table(&["year", "level"], &[&["2020", "1"]]);
        assert_eq!(Measure::resolve(&level_only).unwrap(), (Measure::Level, 1));
    }

    #[test]
    fn test_measure_missing() {
        let t = table(&["year", "marginal"], &[]);
        assert_eq!(Measure::resolve(&t), Err(ChartError::MissingMeasurement));
    }

    #[test]
    fn test_measure_parse_error() {
        let err = Measure::Level.parse("n/a").unwrap_err();
        assert!(err.to_string().contains("'n/a'"));
        assert_eq!(Measure::Value.parse(" 3.5 ").unwrap(), 3.5);
    }

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        let t = table(&["tech"], &[&["wind"], &["coal"], &["wind"], &["gas"]]);
        assert_eq!(t.distinct(0), vec!["wind", "coal", "gas"]);
        assert!(t.contains_value(0, "coal"));
        assert!(!t.contains_value(0, "solar"));
    }

    #[test]
    fn test_from_json() {
        let value = json!([
            {"year": "2020", "value": 1.5},
            {"year": "2030", "value": null}
        ]);
        let t = RecordTable::from_json(&value).unwrap();
        let year = t.column_index("year").unwrap();
        let val = t.column_index("value").unwrap();
        assert_eq!(t.rows[0][year], "2020");
        assert_eq!(t.rows[0][val], "1.5");
        assert_eq!(t.rows[1][val], "");
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(RecordTable::from_json(&json!({"year": 1})).is_err());
        assert!(RecordTable::from_json(&json!([1, 2])).is_err());
        assert!(RecordTable::from_json(&json!([{"year": [2020]}])).is_err());
    }

    #[test]
    fn test_from_json_empty_records() {
        let t = RecordTable::from_json(&json!([])).unwrap();
        assert!(t.headers.is_empty());
        assert!(t.is_empty());
    }

    #[test]
    fn test_from_json_unions_fields() {
        let t = RecordTable::from_json(&json!([
            {"year": "2020", "level": 1},
            {"year": "2030", "marginal": 0.5}
        ]))
        .unwrap();
        assert_eq!(t.headers, vec!["year", "level", "marginal"]);
        assert_eq!(t.rows[0], vec!["2020", "1", ""]);
        assert_eq!(t.rows[1], vec!["2030", "", "0.5"]);
    }
}
