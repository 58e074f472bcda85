use std::io;

use thiserror::Error;

use crate::types::{FilingName, RoleUri, TableName};

/// Error type for taxonomy validation, filing parsing, and sink failures.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("taxonomy reference '{reference}' does not resolve")]
    TaxonomyIncomplete { reference: String },
    #[error("link role '{role}' contains a concept cycle through '{concept}'")]
    TaxonomyCyclic { role: RoleUri, concept: String },
    #[error("table name '{name}' is produced by more than one link role")]
    SchemaConflict { name: TableName },
    #[error("filing '{filing}' has a malformed context: {details}")]
    ContextMalformed { filing: FilingName, details: String },
    #[error("filing '{filing}' could not be read: {details}")]
    FilingUnreadable { filing: FilingName, details: String },
    #[error("filing '{filing}' exceeded the per-filing timeout")]
    FilingTimeout { filing: FilingName },
    #[error("sink write failed for table '{table}': {details}")]
    SinkWrite { table: TableName, details: String },
    #[error("taxonomy document malformed: {0}")]
    TaxonomyDocument(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExtractError {
    /// True when the error aborts the whole run rather than one filing.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::TaxonomyIncomplete { .. }
            | Self::TaxonomyCyclic { .. }
            | Self::SchemaConflict { .. }
            | Self::TaxonomyDocument(_)
            | Self::SinkWrite { .. }
            | Self::Io(_) => true,
            Self::ContextMalformed { .. }
            | Self::FilingUnreadable { .. }
            | Self::FilingTimeout { .. } => false,
        }
    }

    /// Short machine-readable kind label used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaxonomyIncomplete { .. } => "taxonomy_incomplete",
            Self::TaxonomyCyclic { .. } => "taxonomy_cyclic",
            Self::SchemaConflict { .. } => "schema_conflict",
            Self::ContextMalformed { .. } => "context_malformed",
            Self::FilingUnreadable { .. } => "filing_unreadable",
            Self::FilingTimeout { .. } => "filing_timeout",
            Self::SinkWrite { .. } => "sink_write",
            Self::TaxonomyDocument(_) => "taxonomy_document",
            Self::Io(_) => "io",
        }
    }
}
