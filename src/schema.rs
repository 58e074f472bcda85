//! Table schema derivation from link roles.
//!
//! Each link role yields up to two tables (instant and duration). Data
//! columns come from the role's leaf concepts in depth-first traversal order;
//! axis columns come from axis concepts found in the role tree and join the
//! primary key. Compilation is deterministic: the same taxonomy always yields
//! the same table set, column order included.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::constants::schema::{
    COLLISION_HASH_WIDTH, END_DATE, ENTITY_ID, FILING_NAME, INSTANT_DATE, PUBLICATION_TIME,
    START_DATE,
};
use crate::errors::ExtractError;
use crate::hash::short_hex;
use crate::taxonomy::{Concept, DataType, LinkRole, PeriodType, TaxonomyModel};
use crate::types::{AxisName, ConceptName, TableName};
use crate::utils::{lowercase_uppercase_runs, to_snake_case};

/// Storage class of an output column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// UTF-8 text (also carries dates as ISO-8601 and booleans as
    /// `"true"`/`"false"`).
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
}

impl ColumnType {
    /// Storage class for a primitive data type.
    pub fn from_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Monetary | DataType::Decimal | DataType::Percent => Self::Real,
            DataType::Integer => Self::Integer,
            DataType::String | DataType::Date | DataType::Boolean => Self::Text,
        }
    }
}

/// One output column, either primary-key or data.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Snake-case column name.
    pub name: String,
    /// Originating concept or axis name, absent for bookkeeping columns.
    pub concept: Option<ConceptName>,
    /// Primitive type of values in this column.
    pub data_type: DataType,
    /// Storage class in the output database.
    pub column_type: ColumnType,
    /// Unit hint carried as metadata (not a column of its own).
    pub unit: Option<String>,
    /// Human-readable label from the taxonomy.
    pub label: String,
    /// Documentation string from the taxonomy.
    pub documentation: String,
}

impl Column {
    fn bookkeeping(name: &str, data_type: DataType, label: &str, documentation: &str) -> Self {
        Self {
            name: name.to_string(),
            concept: None,
            data_type,
            column_type: ColumnType::from_data_type(data_type),
            unit: None,
            label: label.to_string(),
            documentation: documentation.to_string(),
        }
    }

    fn from_concept(concept: &Concept) -> Self {
        Self {
            name: to_snake_case(&concept.name),
            concept: Some(concept.name.clone()),
            data_type: concept.data_type,
            column_type: ColumnType::from_data_type(concept.data_type),
            unit: concept.unit.clone(),
            label: concept.label.clone(),
            documentation: concept.documentation.clone(),
        }
    }
}

/// Derived schema of one output table.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    /// Full table name, `<stem>_<period_suffix>`.
    pub name: TableName,
    /// Normalized role stem shared by the role's tables.
    pub stem: String,
    /// Period discriminator.
    pub period_type: PeriodType,
    /// Primary-key columns: entity, filing, publication time, period fields,
    /// then axis columns sorted by name.
    pub primary_key: Vec<Column>,
    /// Data columns, one per leaf concept, in traversal order.
    pub data_columns: Vec<Column>,
    /// Axis names (taxonomy form) in sorted order; the signature match key.
    pub axes: Vec<AxisName>,
}

impl TableSchema {
    /// All columns in output order (primary key first).
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.primary_key.iter().chain(self.data_columns.iter())
    }

    /// Total column count.
    pub fn width(&self) -> usize {
        self.primary_key.len() + self.data_columns.len()
    }

    /// Position of a data column by concept name.
    pub fn data_column_index(&self, concept: &str) -> Option<usize> {
        self.data_columns
            .iter()
            .position(|column| column.concept.as_deref() == Some(concept))
    }

    /// True when the signature's sorted axis names equal this table's axes.
    pub fn matches_axes(&self, axis_names: &[&str]) -> bool {
        self.axes.len() == axis_names.len()
            && self.axes.iter().map(String::as_str).eq(axis_names.iter().copied())
    }
}

/// Leaves and axes of one role, partitioned by period type.
struct RoleFields {
    instant: Vec<ConceptName>,
    duration: Vec<ConceptName>,
    axes: Vec<AxisName>,
}

/// Compiles `TableSchema` values from a validated taxonomy model.
pub struct SchemaCompiler<'a> {
    model: &'a TaxonomyModel,
}

impl<'a> SchemaCompiler<'a> {
    /// Create a compiler over a taxonomy model.
    pub fn new(model: &'a TaxonomyModel) -> Self {
        Self { model }
    }

    /// Compile every role into table schemas, keyed by table name.
    ///
    /// `filter` optionally restricts output to tables whose stem or full name
    /// is listed. Fails with `SchemaConflict` when two roles still resolve to
    /// the same table name after collision suffixing.
    pub fn compile(
        &self,
        filter: Option<&BTreeSet<TableName>>,
    ) -> Result<IndexMap<TableName, TableSchema>, ExtractError> {
        let mut stems: IndexMap<String, &LinkRole> = IndexMap::new();
        for role in self.model.roles.values() {
            let mut stem = clean_table_stem(&role.definition);
            if stem.is_empty() {
                stem = to_snake_case(&role.uri);
            }
            if stems.contains_key(&stem) {
                stem = format!("{stem}_{}", short_hex(&role.uri, COLLISION_HASH_WIDTH));
            }
            if stems.insert(stem.clone(), role).is_some() {
                return Err(ExtractError::SchemaConflict { name: stem });
            }
        }

        let mut tables = IndexMap::new();
        for (stem, role) in &stems {
            let fields = self.role_fields(role);
            for period_type in [PeriodType::Duration, PeriodType::Instant] {
                let leaves = match period_type {
                    PeriodType::Instant => &fields.instant,
                    PeriodType::Duration => &fields.duration,
                };
                if leaves.is_empty() {
                    continue;
                }
                let name = format!("{stem}_{}", period_type.table_suffix());
                if !allowed(filter, stem, &name) {
                    continue;
                }
                let schema = self.build_schema(stem, name.clone(), period_type, leaves, &fields.axes);
                if tables.insert(name.clone(), schema).is_some() {
                    return Err(ExtractError::SchemaConflict { name });
                }
            }
        }

        debug!(tables = tables.len(), "schema compilation finished");
        Ok(tables)
    }

    /// Depth-first field discovery over one role tree.
    ///
    /// Axis nodes contribute an axis column and their subtree (the domain
    /// members) is not descended into. Duplicate concepts keep their first
    /// position; equal-named siblings therefore collapse to one column.
    fn role_fields(&self, role: &LinkRole) -> RoleFields {
        let mut instant = Vec::new();
        let mut duration = Vec::new();
        let mut axes = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        let mut stack: Vec<&str> = vec![role.root.as_str()];
        while let Some(name) = stack.pop() {
            if self.model.is_axis(name) {
                if seen.insert(name) {
                    axes.push(name.to_string());
                }
                continue;
            }
            let children = role.children_of(name);
            if !children.is_empty() {
                // Reverse push keeps declared order on a pop-based stack.
                for child in children.iter().rev() {
                    stack.push(child.as_str());
                }
                continue;
            }
            if name == role.root {
                continue;
            }
            if !seen.insert(name) {
                continue;
            }
            if let Some(concept) = self.model.concept(name) {
                match concept.period_type {
                    PeriodType::Instant => instant.push(concept.name.clone()),
                    PeriodType::Duration => duration.push(concept.name.clone()),
                }
            }
        }

        axes.sort();
        RoleFields {
            instant,
            duration,
            axes,
        }
    }

    fn build_schema(
        &self,
        stem: &str,
        name: TableName,
        period_type: PeriodType,
        leaves: &[ConceptName],
        axes: &[AxisName],
    ) -> TableSchema {
        let mut primary_key = vec![
            Column::bookkeeping(
                ENTITY_ID,
                DataType::String,
                "Entity Identifier",
                "Unique identifier of respondent",
            ),
            Column::bookkeeping(FILING_NAME, DataType::String, "Filing Name", "Name of filing"),
            Column::bookkeeping(
                PUBLICATION_TIME,
                DataType::String,
                "Publication Time",
                "Time the filing was published",
            ),
        ];
        match period_type {
            PeriodType::Instant => primary_key.push(Column::bookkeeping(
                INSTANT_DATE,
                DataType::Date,
                "Instant Date",
                "Date of instant period",
            )),
            PeriodType::Duration => {
                primary_key.push(Column::bookkeeping(
                    START_DATE,
                    DataType::Date,
                    "Start Date",
                    "Start date of report period",
                ));
                primary_key.push(Column::bookkeeping(
                    END_DATE,
                    DataType::Date,
                    "End Date",
                    "End date of report period",
                ));
            }
        }
        for axis_name in axes {
            let data_type = self
                .model
                .axes
                .get(axis_name)
                .map(|axis| axis.value_type())
                .unwrap_or(DataType::String);
            let label = self
                .model
                .concept(axis_name)
                .map(|concept| concept.label.clone())
                .unwrap_or_default();
            primary_key.push(Column {
                name: to_snake_case(axis_name),
                concept: Some(axis_name.clone()),
                data_type,
                column_type: ColumnType::from_data_type(data_type),
                unit: None,
                label,
                documentation: String::new(),
            });
        }

        let data_columns = leaves
            .iter()
            .filter_map(|leaf| self.model.concept(leaf))
            .map(Column::from_concept)
            .collect();

        TableSchema {
            name,
            stem: stem.to_string(),
            period_type,
            primary_key,
            data_columns,
            axes: axes.to_vec(),
        }
    }
}

fn allowed(filter: Option<&BTreeSet<TableName>>, stem: &str, name: &str) -> bool {
    match filter {
        Some(tables) => tables.contains(stem) || tables.contains(name),
        None => true,
    }
}

/// Normalize a role definition into a table stem.
///
/// Definitions shaped `"<page> - Schedule - <title>"` are rearranged to
/// `<title>_<page>` before snake-casing, mirroring the upstream form layout.
pub fn clean_table_stem(definition: &str) -> String {
    let normalized = lowercase_uppercase_runs(definition);
    let parts: Vec<&str> = normalized.split(" - Schedule - ").collect();
    let rearranged = if parts.len() == 2 {
        format!("{}_{}", parts[1], parts[0])
    } else {
        normalized
    };
    to_snake_case(&rearranged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{Axis, InMemoryTaxonomy, RoleDef, TaxonomyProvider};

    fn provider() -> impl TaxonomyProvider {
        let concepts = vec![
            Concept::new("PlantAbstract", DataType::String, PeriodType::Duration),
            Concept::new("PlantNameAxis", DataType::String, PeriodType::Duration),
            Concept::new("PlantBalance", DataType::Monetary, PeriodType::Instant)
                .with_unit("USD"),
            Concept::new("PlantAdditions", DataType::Monetary, PeriodType::Duration),
            Concept::new("PlantCity", DataType::String, PeriodType::Duration),
        ];
        let role = RoleDef {
            uri: "http://example.com/roles/plant".to_string(),
            definition: "104 - Schedule - Electric Plant".to_string(),
            root: "PlantAbstract".to_string(),
            arcs: vec![
                ("PlantAbstract".to_string(), "PlantNameAxis".to_string()),
                ("PlantAbstract".to_string(), "PlantBalance".to_string()),
                ("PlantAbstract".to_string(), "PlantAdditions".to_string()),
                ("PlantAbstract".to_string(), "PlantCity".to_string()),
            ],
        };
        InMemoryTaxonomy::new(concepts, vec![role], Vec::new())
    }

    #[test]
    fn compiles_instant_and_duration_tables() {
        let model = TaxonomyModel::from_provider(&provider()).unwrap();
        let tables = SchemaCompiler::new(&model).compile(None).unwrap();

        assert_eq!(tables.len(), 2);
        let duration = &tables["electric_plant_104_duration"];
        let instant = &tables["electric_plant_104_instant"];

        let duration_names: Vec<&str> =
            duration.data_columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(duration_names, ["plant_additions", "plant_city"]);
        assert_eq!(instant.data_columns.len(), 1);
        assert_eq!(instant.data_columns[0].unit.as_deref(), Some("USD"));

        let pk_names: Vec<&str> =
            instant.primary_key.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            pk_names,
            ["entity_id", "filing_name", "publication_time", "date", "plant_name_axis"]
        );
    }

    #[test]
    fn compilation_is_deterministic() {
        let model = TaxonomyModel::from_provider(&provider()).unwrap();
        let first = SchemaCompiler::new(&model).compile(None).unwrap();
        let second = SchemaCompiler::new(&model).compile(None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn colliding_stems_get_role_hash_suffixes() {
        let concepts = vec![
            Concept::new("Root", DataType::String, PeriodType::Duration),
            Concept::new("Value", DataType::Decimal, PeriodType::Duration),
        ];
        let role = |uri: &str| RoleDef {
            uri: uri.to_string(),
            definition: "Same Name".to_string(),
            root: "Root".to_string(),
            arcs: vec![("Root".to_string(), "Value".to_string())],
        };
        let provider = InMemoryTaxonomy::new(
            concepts,
            vec![role("role:one"), role("role:two")],
            Vec::new(),
        );
        let model = TaxonomyModel::from_provider(&provider).unwrap();
        let tables = SchemaCompiler::new(&model).compile(None).unwrap();

        assert_eq!(tables.len(), 2);
        assert!(tables.contains_key("same_name_duration"));
        let suffixed = tables
            .keys()
            .find(|name| *name != "same_name_duration")
            .unwrap();
        assert!(suffixed.starts_with("same_name_"));
        assert!(suffixed.ends_with("_duration"));
    }

    #[test]
    fn filter_accepts_stem_or_full_name() {
        let model = TaxonomyModel::from_provider(&provider()).unwrap();
        let by_stem: BTreeSet<TableName> =
            ["electric_plant_104".to_string()].into_iter().collect();
        let tables = SchemaCompiler::new(&model).compile(Some(&by_stem)).unwrap();
        assert_eq!(tables.len(), 2);

        let by_name: BTreeSet<TableName> =
            ["electric_plant_104_instant".to_string()].into_iter().collect();
        let tables = SchemaCompiler::new(&model).compile(Some(&by_name)).unwrap();
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn typed_axes_use_their_declared_type() {
        let concepts = vec![
            Concept::new("Root", DataType::String, PeriodType::Duration),
            Concept::new("ReportYearAxis", DataType::String, PeriodType::Duration),
            Concept::new("Value", DataType::Decimal, PeriodType::Duration),
        ];
        let role = RoleDef {
            uri: "role:typed".to_string(),
            definition: "Typed".to_string(),
            root: "Root".to_string(),
            arcs: vec![
                ("Root".to_string(), "ReportYearAxis".to_string()),
                ("Root".to_string(), "Value".to_string()),
            ],
        };
        let provider = InMemoryTaxonomy::new(
            concepts,
            vec![role],
            vec![Axis::typed("ReportYearAxis", DataType::Integer)],
        );
        let model = TaxonomyModel::from_provider(&provider).unwrap();
        let tables = SchemaCompiler::new(&model).compile(None).unwrap();
        let table = &tables["typed_duration"];
        let axis_column = table
            .primary_key
            .iter()
            .find(|column| column.name == "report_year_axis")
            .unwrap();
        assert_eq!(axis_column.column_type, ColumnType::Integer);
    }
}
