//! Frictionless-style datapackage descriptor emission.
//!
//! The descriptor is a mechanical transcription of the compiled table
//! schemas: one resource per table with field names, field types, and the
//! primary key.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::ExtractError;
use crate::schema::{Column, TableSchema};
use crate::taxonomy::DataType;
use crate::types::TableName;

/// Frictionless field type label for a primitive type.
pub fn field_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::String => "string",
        DataType::Integer => "integer",
        DataType::Decimal | DataType::Monetary | DataType::Percent => "number",
        DataType::Date => "date",
        DataType::Boolean => "boolean",
    }
}

/// A field descriptor, as per Frictionless table-schema specs.
#[derive(Clone, Debug, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub type_: &'static str,
    #[serde(rename = "format")]
    pub format_: &'static str,
    pub description: String,
}

impl FieldDescriptor {
    fn from_column(column: &Column) -> Self {
        Self {
            name: column.name.clone(),
            title: if column.label.is_empty() {
                column.name.clone()
            } else {
                column.label.clone()
            },
            type_: field_type(column.data_type),
            format_: "default",
            description: column.documentation.clone(),
        }
    }
}

/// A table schema descriptor: fields plus primary key.
#[derive(Clone, Debug, Serialize)]
pub struct SchemaDescriptor {
    pub fields: Vec<FieldDescriptor>,
    pub primary_key: Vec<String>,
}

/// Dialect block naming the backing table.
#[derive(Clone, Debug, Serialize)]
pub struct Dialect {
    pub table: TableName,
}

/// A tabular data resource, as per Frictionless data-resource specs.
#[derive(Clone, Debug, Serialize)]
pub struct Resource {
    pub path: String,
    pub profile: &'static str,
    pub name: TableName,
    pub dialect: Dialect,
    pub title: String,
    pub description: String,
    #[serde(rename = "format")]
    pub format_: &'static str,
    pub mediatype: &'static str,
    pub schema: SchemaDescriptor,
}

impl Resource {
    /// Transcribe one table schema into a resource descriptor.
    pub fn from_schema(schema: &TableSchema, db_uri: &str) -> Self {
        let fields: Vec<FieldDescriptor> =
            schema.columns().map(FieldDescriptor::from_column).collect();
        let primary_key = schema
            .primary_key
            .iter()
            .map(|column| column.name.clone())
            .collect();
        Self {
            path: db_uri.to_string(),
            profile: "tabular-data-resource",
            name: schema.name.clone(),
            dialect: Dialect {
                table: schema.name.clone(),
            },
            title: format!("{} - {}", schema.stem, schema.period_type.table_suffix()),
            description: String::new(),
            format_: "sqlite",
            mediatype: "application/vnd.sqlite3",
            schema: SchemaDescriptor {
                fields,
                primary_key,
            },
        }
    }
}

/// A data package over every compiled table.
#[derive(Clone, Debug, Serialize)]
pub struct Datapackage {
    pub profile: &'static str,
    pub name: String,
    pub title: String,
    pub resources: Vec<Resource>,
}

impl Datapackage {
    /// Build a descriptor for a compiled schema set.
    pub fn from_schemas(
        name: impl Into<String>,
        db_uri: &str,
        schemas: &IndexMap<TableName, TableSchema>,
    ) -> Self {
        let name = name.into();
        Self {
            profile: "tabular-data-package",
            title: format!("{name} data extracted from XBRL filings"),
            name,
            resources: schemas
                .values()
                .map(|schema| Resource::from_schema(schema, db_uri))
                .collect(),
        }
    }

    /// Serialize the descriptor to pretty JSON.
    pub fn to_json(&self) -> Result<String, ExtractError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ExtractError::TaxonomyDocument(err.to_string()))
    }

    /// Write the descriptor to a JSON file.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ExtractError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
