//! Taxonomy metadata output grouped by table.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::ExtractError;
use crate::schema::TableSchema;
use crate::taxonomy::{Reference, TaxonomyModel};
use crate::types::TableName;

/// Concept-level metadata carried for one output column.
#[derive(Clone, Debug, Serialize)]
pub struct ConceptMetadata {
    /// Column name in the output table.
    pub column: String,
    /// Source concept name.
    pub concept: String,
    /// Human-readable label.
    pub label: String,
    /// Documentation string.
    pub documentation: String,
    /// Unit hint, when the taxonomy declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Reference metadata (form, schedule, page).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}

/// Collect per-column concept metadata for every table.
pub fn table_metadata(
    model: &TaxonomyModel,
    schemas: &IndexMap<TableName, TableSchema>,
) -> IndexMap<TableName, Vec<ConceptMetadata>> {
    let mut output = IndexMap::new();
    for (name, schema) in schemas {
        let mut columns = Vec::new();
        for column in schema.columns() {
            let Some(concept_name) = column.concept.as_deref() else {
                continue;
            };
            let Some(concept) = model.concept(concept_name) else {
                continue;
            };
            columns.push(ConceptMetadata {
                column: column.name.clone(),
                concept: concept.name.clone(),
                label: concept.label.clone(),
                documentation: concept.documentation.clone(),
                unit: concept.unit.clone(),
                references: concept.references.clone(),
            });
        }
        output.insert(name.clone(), columns);
    }
    output
}

/// Write grouped metadata to a JSON file.
pub fn write_metadata(
    path: impl AsRef<Path>,
    model: &TaxonomyModel,
    schemas: &IndexMap<TableName, TableSchema>,
) -> Result<(), ExtractError> {
    let metadata = table_metadata(model, schemas);
    let json = serde_json::to_string_pretty(&metadata)
        .map_err(|err| ExtractError::TaxonomyDocument(err.to_string()))?;
    std::fs::write(path, json)?;
    Ok(())
}
