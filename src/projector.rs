//! Fact projection into typed table rows.
//!
//! The projector matches a table's axis set against the canonical signatures
//! of a parsed filing (strict set-equality), groups the matching facts by
//! context, and emits one typed row per context. Lexical values that fail to
//! parse degrade to null cells; they never fail the filing.

use chrono::{NaiveDate, SecondsFormat};
use indexmap::IndexMap;
use serde_json::Value;

use crate::instance::{Fact, Instance, Period};
use crate::schema::TableSchema;
use crate::taxonomy::DataType;
use crate::types::ContextId;

/// A typed cell value.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl CellValue {
    /// Parse a lexical value as `data_type`; `None` when the form is invalid.
    pub fn parse(data_type: DataType, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match data_type {
            DataType::String => Some(Self::Text(raw.to_string())),
            DataType::Integer => raw.parse::<i64>().ok().map(Self::Integer),
            DataType::Decimal | DataType::Monetary | DataType::Percent => {
                raw.parse::<f64>().ok().map(Self::Real)
            }
            DataType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(Self::Date),
            DataType::Boolean => match raw {
                "true" | "1" => Some(Self::Boolean(true)),
                "false" | "0" => Some(Self::Boolean(false)),
                _ => None,
            },
        }
    }

    /// Canonical text rendering, also used for primary-key comparison.
    pub fn render(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Real(value) => value.to_string(),
            Self::Boolean(value) => value.to_string(),
            Self::Date(value) => value.format("%Y-%m-%d").to_string(),
        }
    }

    /// JSON rendering following the column storage classes: dates stay
    /// ISO-8601 text and booleans become `"true"`/`"false"`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(value) => Value::String(value.clone()),
            Self::Integer(value) => Value::from(*value),
            Self::Real(value) => Value::from(*value),
            Self::Boolean(value) => Value::String(value.to_string()),
            Self::Date(value) => Value::String(value.format("%Y-%m-%d").to_string()),
        }
    }
}

/// One output row: primary-key cells (never null) plus data cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// Cells aligned to the schema's primary-key columns.
    pub key: Vec<CellValue>,
    /// Cells aligned to the schema's data columns.
    pub data: Vec<Option<CellValue>>,
}

impl Row {
    /// Canonical primary-key rendering used as the merge key.
    pub fn key_strings(&self) -> Vec<String> {
        self.key.iter().map(CellValue::render).collect()
    }
}

/// Non-error projection counters, reported in the run summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProjectionCounters {
    /// Lexical values that failed to parse and degraded to null.
    pub type_coercion_skipped: u64,
    /// Duplicate facts dropped in favor of a later one in document order.
    pub duplicate_fact_dropped: u64,
}

impl ProjectionCounters {
    /// Fold another counter set into this one.
    pub fn absorb(&mut self, other: ProjectionCounters) {
        self.type_coercion_skipped += other.type_coercion_skipped;
        self.duplicate_fact_dropped += other.duplicate_fact_dropped;
    }
}

/// Projects one filing's facts into one table schema.
pub struct FactProjector<'a> {
    schema: &'a TableSchema,
}

impl<'a> FactProjector<'a> {
    /// Create a projector for `schema`.
    pub fn new(schema: &'a TableSchema) -> Self {
        Self { schema }
    }

    /// Project the matching facts of `instance` into rows.
    ///
    /// A fact matches iff its context's axis set equals the table's axis set
    /// exactly and its period type matches the table's discriminator. Rows
    /// whose data cells are all null are dropped.
    pub fn project(&self, instance: &Instance) -> (Vec<Row>, ProjectionCounters) {
        let mut counters = ProjectionCounters::default();
        let mut rows = Vec::new();

        for (signature, facts) in &instance.facts {
            if !self.schema.matches_axes(&signature.axis_names()) {
                continue;
            }
            // Group co-contextual facts, preserving document order per group.
            let mut groups: IndexMap<&ContextId, Vec<&Fact>> = IndexMap::new();
            for fact in facts {
                if self.schema.data_column_index(&fact.concept).is_none() {
                    continue;
                }
                let Some(context) = instance.context(&fact.context_id) else {
                    continue;
                };
                if context.period.period_type() != self.schema.period_type {
                    continue;
                }
                groups.entry(&fact.context_id).or_default().push(fact);
            }

            for (context_id, group) in groups {
                let Some(context) = instance.context(context_id) else {
                    continue;
                };
                let key = self.key_cells(instance, context, &mut counters);
                let mut data: Vec<Option<CellValue>> =
                    vec![None; self.schema.data_columns.len()];
                // A cell may legitimately hold null after a parse failure, so
                // duplicate detection tracks writes, not cell contents.
                let mut written = vec![false; self.schema.data_columns.len()];
                for fact in group {
                    let Some(index) = self.schema.data_column_index(&fact.concept) else {
                        continue;
                    };
                    if written[index] {
                        counters.duplicate_fact_dropped += 1;
                    }
                    written[index] = true;
                    let parsed =
                        CellValue::parse(self.schema.data_columns[index].data_type, &fact.value);
                    if parsed.is_none() {
                        counters.type_coercion_skipped += 1;
                    }
                    data[index] = parsed;
                }
                if data.iter().all(Option::is_none) {
                    continue;
                }
                rows.push(Row { key, data });
            }
        }

        (rows, counters)
    }

    /// Primary-key cells for one context, in schema order.
    fn key_cells(
        &self,
        instance: &Instance,
        context: &crate::instance::Context,
        counters: &mut ProjectionCounters,
    ) -> Vec<CellValue> {
        let mut key = vec![
            CellValue::Text(context.entity_id.clone()),
            CellValue::Text(instance.filing_name.clone()),
            CellValue::Text(
                instance
                    .publication_time
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            ),
        ];
        match context.period {
            Period::Instant(date) => key.push(CellValue::Date(date)),
            Period::Duration { start, end } => {
                key.push(CellValue::Date(start));
                key.push(CellValue::Date(end));
            }
        }
        for axis_column in &self.schema.primary_key[key.len()..] {
            let Some(axis) = axis_column.concept.as_deref() else {
                continue;
            };
            let raw = context.signature.value_of(axis).unwrap_or_default();
            match CellValue::parse(axis_column.data_type, raw) {
                Some(cell) => key.push(cell),
                None => {
                    // Primary-key cells are never null; fall back to the raw
                    // lexical form when a typed axis value fails to parse.
                    counters.type_coercion_skipped += 1;
                    key.push(CellValue::Text(raw.to_string()));
                }
            }
        }
        key
    }
}
