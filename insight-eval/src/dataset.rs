//! Tabular dataset loading from CSV and JSON files

use indexmap::IndexSet;
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Error type for dataset loading
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(String),
}

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Parse a raw CSV field
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Missing,
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            Value::String(s) if s.trim().is_empty() => Cell::Missing,
            Value::String(s) => Cell::Text(s.clone()),
            Value::Bool(b) => Cell::Text(b.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Inferred kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Empty,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Empty => "empty",
        }
    }
}

/// In-memory table. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// Build a dataset from already-parsed rows. Short rows are padded with `Missing`.
    pub fn from_rows(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Missing);
                row
            })
            .collect();
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Load a dataset, picking the parser from the file extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => {
                let file = std::fs::File::open(path)?;
                Self::from_csv_reader(name, file)
            }
            "json" => {
                let content = std::fs::read_to_string(path)?;
                Self::from_json_str(name, &content)
            }
            other => Err(DatasetError::UnsupportedFormat(format!(
                "{} (expected .csv or .json)",
                if other.is_empty() { "<none>" } else { other }
            ))),
        }
    }

    /// Parse CSV with a header row
    pub fn from_csv_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        if columns.is_empty() {
            return Err(DatasetError::Parse("CSV has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::parse).collect());
        }

        Ok(Self::from_rows(name, columns, rows))
    }

    /// Parse a JSON array of objects, or an object with a `records` array
    pub fn from_json_str(name: impl Into<String>, content: &str) -> Result<Self, DatasetError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| DatasetError::Parse(e.to_string()))?;

        let records = match &value {
            Value::Array(arr) => arr,
            Value::Object(obj) => obj
                .get("records")
                .and_then(|r| r.as_array())
                .ok_or_else(|| DatasetError::Parse("expected an array or a 'records' array".to_string()))?,
            _ => return Err(DatasetError::Parse("expected an array of objects".to_string())),
        };

        // Column order follows first appearance across records
        let mut columns: IndexSet<String> = IndexSet::new();
        for (idx, record) in records.iter().enumerate() {
            let obj = record
                .as_object()
                .ok_or_else(|| DatasetError::Parse(format!("record {} is not an object", idx)))?;
            for key in obj.keys() {
                columns.insert(key.clone());
            }
        }

        let rows = records
            .iter()
            .filter_map(|r| r.as_object())
            .map(|obj| {
                columns
                    .iter()
                    .map(|c| obj.get(c).map(Cell::from_json).unwrap_or(Cell::Missing))
                    .collect()
            })
            .collect();

        Ok(Self::from_rows(name, columns.into_iter().collect(), rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Numeric values of a column, skipping missing and text cells
    pub fn numeric_values(&self, column: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Cell::as_number))
            .collect()
    }

    /// Text values of a column, skipping missing and numeric cells
    pub fn text_values(&self, column: usize) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Cell::as_text))
            .collect()
    }

    /// Pairs of numeric values where both columns are present in a row
    pub fn numeric_pairs(&self, a: usize, b: usize) -> Vec<(f64, f64)> {
        self.rows
            .iter()
            .filter_map(|row| {
                let x = row.get(a).and_then(Cell::as_number)?;
                let y = row.get(b).and_then(Cell::as_number)?;
                Some((x, y))
            })
            .collect()
    }

    /// A column is numeric when most of its present cells are numbers
    pub fn column_kind(&self, column: usize) -> ColumnKind {
        let mut numbers = 0usize;
        let mut texts = 0usize;
        for row in &self.rows {
            match row.get(column) {
                Some(Cell::Number(_)) => numbers += 1,
                Some(Cell::Text(_)) => texts += 1,
                _ => {}
            }
        }
        if numbers == 0 && texts == 0 {
            ColumnKind::Empty
        } else if numbers >= texts {
            ColumnKind::Numeric
        } else {
            ColumnKind::Categorical
        }
    }

    /// Short description used in prompts when the caller gives no summary
    pub fn summary(&self) -> String {
        let described: Vec<String> = (0..self.columns.len())
            .map(|i| format!("{} ({})", self.columns[i], self.column_kind(i).as_str()))
            .collect();
        format!(
            "{}: {} rows, {} columns: {}",
            self.name,
            self.rows.len(),
            self.columns.len(),
            described.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CSV: &str = "Item_Identifier,Item_Weight,Item_Type,Item_MRP\n\
FDA15,9.3,Dairy,249.8\n\
DRC01,5.92,Soft Drinks,48.27\n\
FDN15,,Meat,141.62\n";

    #[test]
    fn test_csv_parsing() {
        let ds = Dataset::from_csv_reader("sample", SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.columns().len(), 4);
        let weight = ds.column_index("item_weight").unwrap();
        assert_eq!(ds.numeric_values(weight), vec![9.3, 5.92]);
        assert_eq!(ds.column_kind(weight), ColumnKind::Numeric);
        let item_type = ds.column_index("Item_Type").unwrap();
        assert_eq!(ds.column_kind(item_type), ColumnKind::Categorical);
        assert_eq!(ds.text_values(item_type), vec!["Dairy", "Soft Drinks", "Meat"]);
    }

    #[test]
    fn test_json_records() {
        let json = r#"{"records": [
            {"region": "north", "sales": 10},
            {"region": "south", "sales": 12.5, "returns": null}
        ]}"#;
        let ds = Dataset::from_json_str("regions", json).unwrap();
        assert_eq!(ds.columns(), &["region", "sales", "returns"]);
        assert_eq!(ds.numeric_values(1), vec![10.0, 12.5]);
        assert_eq!(ds.column_kind(2), ColumnKind::Empty);
    }

    #[test]
    fn test_json_rejects_scalars() {
        assert!(matches!(
            Dataset::from_json_str("bad", "[1, 2]"),
            Err(DatasetError::Parse(_))
        ));
    }

    #[test]
    fn test_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE_CSV.as_bytes()).unwrap();

        let ds = Dataset::from_path(&path).unwrap();
        assert_eq!(ds.name, "train");
        assert_eq!(ds.len(), 3);

        let missing = Dataset::from_path(dir.path().join("missing.csv"));
        assert!(matches!(missing, Err(DatasetError::Io(_))));

        let unsupported = Dataset::from_path(dir.path().join("data.parquet"));
        assert!(matches!(unsupported, Err(DatasetError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_numeric_pairs_skip_missing() {
        let ds = Dataset::from_csv_reader("sample", SAMPLE_CSV.as_bytes()).unwrap();
        let pairs = ds.numeric_pairs(1, 3);
        assert_eq!(pairs, vec![(9.3, 249.8), (5.92, 48.27)]);
    }

    #[test]
    fn test_summary_lists_columns() {
        let ds = Dataset::from_csv_reader("sample", SAMPLE_CSV.as_bytes()).unwrap();
        let summary = ds.summary();
        assert!(summary.starts_with("sample: 3 rows, 4 columns"));
        assert!(summary.contains("Item_MRP (numeric)"));
    }
}
