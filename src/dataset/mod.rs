//! Dataset loading from CSV and JSON files.
//!
//! This module turns a tabular file into an ordered list of [`Record`]s.
//! Column presence is never enforced here: a configured column that does
//! not exist simply reads as absent on every record.

use crate::models::Record;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Input file format.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Detect from the file extension
    #[default]
    Auto,
    /// Comma-separated values with a header row
    Csv,
    /// Array of flat JSON objects
    Json,
}

/// Errors raised while loading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv parse error at line {line}: {reason}")]
    Csv { line: u64, reason: String },
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("json row {row} is not an object")]
    NotAnObject { row: usize },
    #[error("json document must be an array of objects or an object with a `data` array")]
    UnexpectedShape,
    #[error("cannot detect input format from extension of {0}; pass --input-format")]
    UnknownFormat(PathBuf),
}

/// A loaded table.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Where the rows came from.
    pub source: String,
    /// Column names. CSV keeps header order; JSON lists keys in the order rows
    /// introduce them, with each row's keys sorted alphabetically.
    pub headers: Vec<String>,
    /// Rows in file order.
    pub records: Vec<Record>,
}

impl Dataset {
    /// Number of loaded rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no rows were loaded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the subset of `fields` that no header names.
    pub fn missing_columns<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        fields
            .into_iter()
            .filter(|f| !self.headers.iter().any(|h| h == f))
            .collect()
    }
}

impl InputFormat {
    /// Resolve `Auto` using the extension of `path`.
    pub fn resolve(self, path: &Path) -> Result<Self, DatasetError> {
        if self != InputFormat::Auto {
            return Ok(self);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("csv") => Ok(InputFormat::Csv),
            Some("json") => Ok(InputFormat::Json),
            _ => Err(DatasetError::UnknownFormat(path.to_path_buf())),
        }
    }
}

/// Load a dataset file.
pub fn load_dataset(path: &Path, format: InputFormat) -> Result<Dataset, DatasetError> {
    let format = format.resolve(path)?;
    debug!("Loading {} as {:?}", path.display(), format);

    let io_err = |source: std::io::Error| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut dataset = match format {
        InputFormat::Csv => parse_csv(BufReader::new(file))?,
        InputFormat::Json => {
            let mut content = String::new();
            BufReader::new(file)
                .read_to_string(&mut content)
                .map_err(io_err)?;
            parse_json(&content)?
        }
        InputFormat::Auto => return Err(DatasetError::UnknownFormat(path.to_path_buf())),
    };

    dataset.source = path.display().to_string();
    Ok(dataset)
}

/// Parse CSV with a header row. Cell values are kept verbatim.
pub fn parse_csv<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(map_csv_error)?
        .iter()
        .map(String::from)
        .collect();

    let mut records = Vec::new();
    let mut blank = 0usize;

    for row in csv_reader.records() {
        let row = row.map_err(map_csv_error)?;
        if row.len() > headers.len() {
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            warn!(
                "Line {} has {} cells but only {} headers; extra cells ignored",
                line,
                row.len(),
                headers.len()
            );
        }

        let record: Record = headers.iter().cloned().zip(row.iter()).collect();
        if record.is_blank() {
            blank += 1;
            continue;
        }
        records.push(record);
    }

    if blank > 0 {
        debug!("Skipped {} blank CSV rows", blank);
    }

    Ok(Dataset {
        source: String::new(),
        headers,
        records,
    })
}

/// Parse a JSON array of flat objects, or an object wrapping one in `data`.
pub fn parse_json(content: &str) -> Result<Dataset, DatasetError> {
    let document: Value = serde_json::from_str(content)?;

    let rows = match document {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(DatasetError::UnexpectedShape),
        },
        _ => return Err(DatasetError::UnexpectedShape),
    };

    let mut headers: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(rows.len());

    for (row_index, row) in rows.into_iter().enumerate() {
        let Value::Object(object) = row else {
            return Err(DatasetError::NotAnObject { row: row_index });
        };

        let mut record = Record::new();
        for (key, value) in object {
            if !headers.contains(&key) {
                headers.push(key.clone());
            }
            if let Some(text) = scalar_text(value) {
                record.insert(key, text);
            }
        }

        if record.is_blank() {
            continue;
        }
        records.push(record);
    }

    Ok(Dataset {
        source: String::new(),
        headers,
        records,
    })
}

/// Text form of a scalar JSON value; `None` for null and nested values.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn map_csv_error(err: csv::Error) -> DatasetError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    DatasetError::Csv {
        line,
        reason: err.to_string(),
    }
}
