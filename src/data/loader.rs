use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{Dataset, Measurement};
use crate::config::ColumnMapping;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Unsupported file extension: .{0}")]
    UnsupportedFormat(String),
    #[error("Source table is missing the '{0}' column")]
    MissingColumn(String),
    #[error("Row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },
    #[error("No usable measurements in {}", .0.display())]
    Empty(PathBuf),
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load the measurement table from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one measurement per line
/// * `.json`    – `[{ "Municipality": "...", "Year": 2010, ... }, ...]`
/// * `.parquet` – flat columns as written by `df.to_parquet()`
///
/// Source columns are located through `columns`. Rows that cannot be coerced
/// are dropped and counted; a table with no usable rows is an error.
pub fn load_file(path: &Path, columns: &ColumnMapping) -> Result<Dataset, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let builder = match ext.as_str() {
        "csv" => load_csv(path, columns)?,
        "json" => load_json(path, columns)?,
        "parquet" | "pq" => load_parquet(path, columns)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    builder.finish(path)
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Raw cells and row coercion
// ---------------------------------------------------------------------------

/// A source cell before type coercion.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Cell {
    fn as_text(&self) -> Option<String> {
        match self {
            Cell::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Cell::Integer(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Null => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Integer(i) => Some(*i as f64),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Bool(_) | Cell::Null => None,
        }
    }
}

/// Why a source row was left out of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rejection {
    RepeatedHeader,
    MissingCategory,
    BadYear,
    BadConcentration,
}

/// Positions of the mapped columns within a source row.
#[derive(Debug, Clone)]
struct ColumnIndex {
    municipality: usize,
    heavy_metal: usize,
    land_use: usize,
    year: usize,
    concentration: usize,
    sampling_period: Option<usize>,
    sampling_date: Option<usize>,
    names: ColumnMapping,
}

impl ColumnIndex {
    fn resolve(headers: &[String], columns: &ColumnMapping) -> Result<Self, LoadError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| find(name).ok_or_else(|| LoadError::MissingColumn(name.to_string()));

        Ok(ColumnIndex {
            municipality: require(&columns.municipality)?,
            heavy_metal: require(&columns.heavy_metal)?,
            land_use: require(&columns.land_use)?,
            year: require(&columns.year)?,
            concentration: require(&columns.concentration)?,
            sampling_period: find(&columns.sampling_period),
            sampling_date: find(&columns.sampling_date),
            names: columns.clone(),
        })
    }

    /// Coerce one row into a [`Measurement`].
    fn coerce(&self, cells: &[Cell]) -> Result<Measurement, Rejection> {
        let cell = |i: usize| cells.get(i).unwrap_or(&Cell::Null);

        let category = |i: usize, header: &str| -> Result<String, Rejection> {
            match cell(i).as_text() {
                Some(text) if text == header => Err(Rejection::RepeatedHeader),
                Some(text) => Ok(text),
                None => Err(Rejection::MissingCategory),
            }
        };

        let municipality = category(self.municipality, &self.names.municipality)?;
        let heavy_metal = category(self.heavy_metal, &self.names.heavy_metal)?;
        let land_use = category(self.land_use, &self.names.land_use)?;

        let year = cell(self.year)
            .as_f64()
            .filter(|y| y.is_finite() && y.fract() == 0.0)
            .filter(|y| *y >= i32::MIN as f64 && *y <= i32::MAX as f64)
            .ok_or(Rejection::BadYear)? as i32;

        let concentration = cell(self.concentration)
            .as_f64()
            .filter(|c| c.is_finite() && *c >= 0.0)
            .ok_or(Rejection::BadConcentration)?;

        Ok(Measurement {
            municipality,
            heavy_metal,
            land_use,
            year,
            concentration,
            sampling_period: self.sampling_period.and_then(|i| cell(i).as_text()),
            sampling_date: self.sampling_date.and_then(|i| cell(i).as_text()),
        })
    }
}

/// Accumulates coerced rows and counts the rejected ones.
struct TableBuilder {
    index: ColumnIndex,
    records: Vec<Measurement>,
    rejected: BTreeMap<Rejection, usize>,
}

impl TableBuilder {
    fn new(index: ColumnIndex) -> Self {
        TableBuilder {
            index,
            records: Vec::new(),
            rejected: BTreeMap::new(),
        }
    }

    fn push(&mut self, cells: &[Cell]) {
        match self.index.coerce(cells) {
            Ok(m) => self.records.push(m),
            Err(reason) => *self.rejected.entry(reason).or_default() += 1,
        }
    }

    fn finish(self, path: &Path) -> Result<Dataset, LoadError> {
        let dropped: usize = self.rejected.values().sum();
        if dropped > 0 {
            log::warn!(
                "Dropped {dropped} rows from {} during coercion: {:?}",
                path.display(),
                self.rejected
            );
        }
        if self.records.is_empty() {
            return Err(LoadError::Empty(path.to_path_buf()));
        }

        let dataset = Dataset::from_records(self.records);
        let cats = dataset.categories();
        log::info!(
            "Loaded {} measurements from {} ({} municipalities, {} metals, {} land uses, years {})",
            dataset.len(),
            path.display(),
            cats.municipalities.len(),
            cats.heavy_metals.len(),
            cats.land_uses.len(),
            cats.year_bounds
        );
        Ok(dataset)
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one measurement per record.
/// All cells are read as text and coerced by [`ColumnIndex::coerce`].
fn load_csv(path: &Path, columns: &ColumnMapping) -> Result<TableBuilder, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(open(path)?);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut builder = TableBuilder::new(ColumnIndex::resolve(&headers, columns)?);

    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| LoadError::InvalidRecord {
            row: row_no,
            reason: e.to_string(),
        })?;
        let cells: Vec<Cell> = record.iter().map(|v| Cell::Text(v.to_string())).collect();
        builder.push(&cells);
    }

    Ok(builder)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   {
///     "Municipality": "Zurich",
///     "Heavy metal": "Cadmium",
///     "Land use": "Agricultural",
///     "Year": 2010,
///     "Heavy metal concentration (mg/kg DM)": 0.5
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path, columns: &ColumnMapping) -> Result<TableBuilder, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let root: JsonValue = serde_json::from_str(&text)?;

    let records = root.as_array().ok_or_else(|| LoadError::InvalidRecord {
        row: 0,
        reason: "expected a top-level JSON array".to_string(),
    })?;

    // Columns are looked up by name, so the header list is just the mapping.
    let headers = vec![
        columns.municipality.clone(),
        columns.heavy_metal.clone(),
        columns.land_use.clone(),
        columns.year.clone(),
        columns.concentration.clone(),
        columns.sampling_period.clone(),
        columns.sampling_date.clone(),
    ];
    let mut builder = TableBuilder::new(ColumnIndex::resolve(&headers, columns)?);

    for (i, rec) in records.iter().enumerate() {
        let obj = rec.as_object().ok_or_else(|| LoadError::InvalidRecord {
            row: i,
            reason: "not a JSON object".to_string(),
        })?;

        if i == 0 {
            for required in &headers[..5] {
                if !obj.contains_key(required) {
                    return Err(LoadError::MissingColumn(required.clone()));
                }
            }
        }

        let cells: Vec<Cell> = headers
            .iter()
            .map(|h| obj.get(h).map(json_to_cell).unwrap_or(Cell::Null))
            .collect();
        builder.push(&cells);
    }

    Ok(builder)
}

fn json_to_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::String(s) => Cell::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Cell::Float(f)
            } else {
                Cell::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Cell::Bool(*b),
        JsonValue::Null => Cell::Null,
        other => Cell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per source field.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`); dictionary-encoded and other column
/// types fall back to their display text.
fn load_parquet(path: &Path, columns: &ColumnMapping) -> Result<TableBuilder, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut table = TableBuilder::new(ColumnIndex::resolve(&headers, columns)?);

    for batch_result in reader {
        let batch = batch_result?;
        let n_cols = batch.num_columns();

        for row in 0..batch.num_rows() {
            let cells: Vec<Cell> = (0..n_cols)
                .map(|c| extract_cell(batch.column(c), row))
                .collect();
            table.push(&cells);
        }
    }

    Ok(table)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Null;
    }
    match col.data_type() {
        DataType::Utf8 => Cell::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Cell::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .map_or(Cell::Null, |arr| Cell::Integer(arr.value(row) as i64)),
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .map_or(Cell::Null, |arr| Cell::Integer(arr.value(row))),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .map_or(Cell::Null, |arr| Cell::Float(arr.value(row) as f64)),
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .map_or(Cell::Null, |arr| Cell::Float(arr.value(row))),
        DataType::Boolean => col
            .as_any()
            .downcast_ref::<BooleanArray>()
            .map_or(Cell::Null, |arr| Cell::Bool(arr.value(row))),
        _ => array_value_to_string(col.as_ref(), row)
            .map(Cell::Text)
            .unwrap_or(Cell::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> ColumnIndex {
        let columns = ColumnMapping::default();
        let headers = vec![
            columns.municipality.clone(),
            columns.heavy_metal.clone(),
            columns.land_use.clone(),
            columns.year.clone(),
            columns.concentration.clone(),
        ];
        ColumnIndex::resolve(&headers, &columns).unwrap()
    }

    fn text_row(values: [&str; 5]) -> Vec<Cell> {
        values.iter().map(|v| Cell::Text(v.to_string())).collect()
    }

    #[test]
    fn test_coerce_valid_row() {
        let m = index()
            .coerce(&text_row(["Zurich", "Cadmium", "Agricultural", "2010.0", " 0.5 "]))
            .unwrap();
        assert_eq!(m, Measurement::new("Zurich", "Cadmium", "Agricultural", 2010, 0.5));
        assert_eq!(m.sampling_period, None);
    }

    #[test]
    fn test_coerce_rejections() {
        let idx = index();
        let cases = [
            (["Municipality", "Heavy metal", "Land use", "Year", "x"], Rejection::RepeatedHeader),
            (["Zurich", "Heavy metal", "Urban", "2010", "1"], Rejection::RepeatedHeader),
            (["", "Lead", "Urban", "2010", "1"], Rejection::MissingCategory),
            (["Zurich", "Lead", "Urban", "twenty", "1"], Rejection::BadYear),
            (["Zurich", "Lead", "Urban", "2010.5", "1"], Rejection::BadYear),
            (["Zurich", "Lead", "Urban", "2010", "n/a"], Rejection::BadConcentration),
            (["Zurich", "Lead", "Urban", "2010", "-0.1"], Rejection::BadConcentration),
            (["Zurich", "Lead", "Urban", "2010", "NaN"], Rejection::BadConcentration),
        ];
        for (row, expected) in cases {
            assert_eq!(idx.coerce(&text_row(row)), Err(expected), "row {row:?}");
        }
    }

    #[test]
    fn test_coerce_typed_cells() {
        let cells = vec![
            Cell::Text("Basel".into()),
            Cell::Text("Lead".into()),
            Cell::Text("Urban".into()),
            Cell::Integer(2011),
            Cell::Float(2.0),
        ];
        let m = index().coerce(&cells).unwrap();
        assert_eq!(m.year, 2011);
        assert_eq!(m.concentration, 2.0);

        let short = vec![Cell::Text("Basel".into())];
        assert_eq!(index().coerce(&short), Err(Rejection::MissingCategory));
    }

    #[test]
    fn test_missing_column() {
        let headers = vec!["Municipality".to_string(), "Year".to_string()];
        let err = ColumnIndex::resolve(&headers, &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "Heavy metal"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_file(Path::new("measurements.xlsx"), &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ref e) if e == "xlsx"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_file(Path::new("/nonexistent/data.csv"), &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
