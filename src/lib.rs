#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Reusable command-line runners shared by downstream binaries.
pub mod apps;
/// Extraction configuration types.
pub mod config;
/// Centralized constants used across reader, compiler, and runner.
pub mod constants;
/// Frictionless-style datapackage descriptor emission.
pub mod datapackage;
/// Filing parsing and the canonical-signature fact index.
pub mod instance;
/// Taxonomy metadata output grouped by table.
pub mod metadata;
/// Fact projection into typed table rows.
pub mod projector;
/// Parallel batch extraction and row merging.
pub mod runner;
/// Table schema derivation from link roles.
pub mod schema;
/// Tabular sink interfaces and built-in sinks.
pub mod sink;
/// Taxonomy model and provider interfaces.
pub mod taxonomy;
/// Input transports used for filing discovery.
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Name normalization helpers.
pub mod utils;

mod errors;
mod hash;

pub use config::ExtractionConfig;
pub use datapackage::Datapackage;
pub use errors::ExtractError;
pub use instance::{Context, DimensionSignature, Fact, Instance, InstanceReader, Period};
pub use projector::{CellValue, FactProjector, ProjectionCounters, Row};
pub use runner::{
    BatchRunner, CancellationToken, FilingRef, FilingSource, RunSummary,
};
pub use schema::{Column, ColumnType, SchemaCompiler, TableSchema};
pub use sink::{JsonlSink, MemorySink, TableSink};
pub use taxonomy::{
    Axis, AxisKind, Concept, DataType, InMemoryTaxonomy, JsonTaxonomyProvider, LinkRole,
    PeriodType, RoleDef, TaxonomyModel, TaxonomyProvider,
};
pub use types::{
    AxisName, ConceptName, ContextId, EntityId, FilingName, LexicalValue, RoleUri, TableName,
};
