//! Tabular sink interfaces.
//!
//! A sink consumes row batches together with their declared schema; the
//! database writers proper (SQLite, DuckDB) live outside the crate and
//! implement the same trait. `MemorySink` backs tests and inspection,
//! `JsonlSink` writes one JSON object per row into one file per table.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::errors::ExtractError;
use crate::projector::{CellValue, Row};
use crate::schema::TableSchema;
use crate::types::TableName;

/// Consumer of row batches with a declared schema.
pub trait TableSink {
    /// Append rows conforming to `schema` to the table it names.
    fn write_rows(&mut self, schema: &TableSchema, rows: &[Row]) -> Result<(), ExtractError>;

    /// Flush buffered output. Sinks must be flushable at any point.
    fn flush(&mut self) -> Result<(), ExtractError> {
        Ok(())
    }
}

/// In-memory sink retaining every row, keyed by table name.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Accumulated rows per table, in write order.
    pub tables: IndexMap<TableName, Vec<Row>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows accumulated for `table`.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total row count across tables.
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

impl TableSink for MemorySink {
    fn write_rows(&mut self, schema: &TableSchema, rows: &[Row]) -> Result<(), ExtractError> {
        self.tables
            .entry(schema.name.clone())
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }
}

/// Render a row as a JSON object keyed by column name.
pub fn row_to_json(schema: &TableSchema, row: &Row) -> Value {
    let mut object = Map::new();
    for (column, cell) in schema.primary_key.iter().zip(&row.key) {
        object.insert(column.name.clone(), cell.to_json());
    }
    for (column, cell) in schema.data_columns.iter().zip(&row.data) {
        let value = cell.as_ref().map(CellValue::to_json).unwrap_or(Value::Null);
        object.insert(column.name.clone(), value);
    }
    Value::Object(object)
}

/// Sink writing `<table>.jsonl` files under a directory.
pub struct JsonlSink {
    dir: PathBuf,
    writers: HashMap<TableName, BufWriter<File>>,
}

impl JsonlSink {
    /// Create a sink writing into `dir` (created if absent).
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ExtractError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writers: HashMap::new(),
        })
    }

    fn writer(&mut self, table: &str) -> Result<&mut BufWriter<File>, ExtractError> {
        match self.writers.entry(table.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let path = self.dir.join(format!("{table}.jsonl"));
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|err| ExtractError::SinkWrite {
                        table: table.to_string(),
                        details: err.to_string(),
                    })?;
                Ok(entry.insert(BufWriter::new(file)))
            }
        }
    }
}

impl TableSink for JsonlSink {
    fn write_rows(&mut self, schema: &TableSchema, rows: &[Row]) -> Result<(), ExtractError> {
        let sink_error = |err: std::io::Error| ExtractError::SinkWrite {
            table: schema.name.clone(),
            details: err.to_string(),
        };
        let lines: Vec<String> = rows
            .iter()
            .map(|row| row_to_json(schema, row).to_string())
            .collect();
        let writer = self.writer(&schema.name)?;
        for line in lines {
            writer.write_all(line.as_bytes()).map_err(sink_error)?;
            writer.write_all(b"\n").map_err(sink_error)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ExtractError> {
        for (table, writer) in &mut self.writers {
            writer.flush().map_err(|err| ExtractError::SinkWrite {
                table: table.clone(),
                details: err.to_string(),
            })?;
        }
        Ok(())
    }
}
