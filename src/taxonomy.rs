//! Taxonomy model and provider interfaces.
//!
//! Ownership model:
//! - `TaxonomyProvider` is the loader-facing seam that supplies flat concept,
//!   role, and axis lists.
//! - `TaxonomyModel` owns the validated, cross-referenced form: concept and
//!   axis maps plus one adjacency list per link role. It is built once per run
//!   and shared read-only with every worker.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::constants::schema::AXIS_NAME_SUFFIX;
use crate::errors::ExtractError;
use crate::types::{AxisName, ConceptName, RoleUri};
use crate::utils::normalize_inline_whitespace;

/// Primitive data type of a concept or typed axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Integer,
    Decimal,
    Monetary,
    Percent,
    Date,
    Boolean,
}

impl DataType {
    /// Map an XSD-style base type name onto a primitive type.
    ///
    /// Unrecognized bases degrade to `String`, matching the permissive
    /// treatment of filer-defined types.
    pub fn from_base(base: &str) -> Self {
        match base.to_ascii_lowercase().as_str() {
            "integer" | "int" | "long" | "gyear" => Self::Integer,
            "decimal" | "float" | "double" => Self::Decimal,
            "monetary" | "monetaryitemtype" => Self::Monetary,
            "percent" | "percentitemtype" => Self::Percent,
            "date" => Self::Date,
            "boolean" => Self::Boolean,
            _ => Self::String,
        }
    }
}

/// Period type a concept reports under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Instant,
    Duration,
}

impl PeriodType {
    /// Table-name suffix for this period type.
    pub fn table_suffix(&self) -> &'static str {
        match self {
            Self::Instant => crate::constants::schema::INSTANT_TABLE_SUFFIX,
            Self::Duration => crate::constants::schema::DURATION_TABLE_SUFFIX,
        }
    }
}

/// Reference metadata attached to a concept (regulatory form, schedule, page).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Reference name, e.g. `Form1`.
    pub name: String,
    /// Named reference parts, e.g. `Schedule` -> `104`.
    #[serde(default)]
    pub parts: IndexMap<String, String>,
}

/// A taxonomy concept. Value object; one concept may appear in many roles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Concept {
    /// Qualified name with the namespace prefix stripped.
    pub name: ConceptName,
    /// Primitive data type of reported values.
    pub data_type: DataType,
    /// Period type facts of this concept must carry.
    pub period_type: PeriodType,
    /// Optional unit hint (e.g. `USD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Longer documentation string.
    #[serde(default)]
    pub documentation: String,
    /// Reference metadata carried into the taxonomy metadata output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}

impl Concept {
    /// Minimal concept constructor used by providers and tests.
    pub fn new(
        name: impl Into<ConceptName>,
        data_type: DataType,
        period_type: PeriodType,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            period_type,
            unit: None,
            label: String::new(),
            documentation: String::new(),
            references: Vec::new(),
        }
    }

    /// Attach a unit hint.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Attach a label and documentation string.
    pub fn with_docs(mut self, label: impl Into<String>, documentation: impl Into<String>) -> Self {
        self.label = label.into();
        self.documentation = documentation.into();
        self
    }
}

/// How an axis draws its values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum AxisKind {
    /// Values enumerated by the taxonomy.
    Explicit {
        /// Allowed member names; empty when the domain is open-ended.
        #[serde(default)]
        domain: Vec<String>,
    },
    /// Filer-supplied values of a declared primitive type.
    Typed {
        /// Primitive type of supplied values.
        value_type: DataType,
    },
}

/// A named dimension that may appear in context signatures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis name as declared by the taxonomy.
    pub name: AxisName,
    /// Explicit or typed variant.
    pub kind: AxisKind,
}

impl Axis {
    /// Explicit axis with an enumerated (possibly empty) domain.
    pub fn explicit(name: impl Into<AxisName>, domain: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: AxisKind::Explicit { domain },
        }
    }

    /// Typed axis carrying values of `value_type`.
    pub fn typed(name: impl Into<AxisName>, value_type: DataType) -> Self {
        Self {
            name: name.into(),
            kind: AxisKind::Typed { value_type },
        }
    }

    /// Primitive type of this axis's values (`String` for explicit axes).
    pub fn value_type(&self) -> DataType {
        match &self.kind {
            AxisKind::Explicit { .. } => DataType::String,
            AxisKind::Typed { value_type } => *value_type,
        }
    }
}

/// Provider-facing definition of a link role: root plus declared arcs.
#[derive(Clone, Debug)]
pub struct RoleDef {
    /// Role URI.
    pub uri: RoleUri,
    /// Human-readable definition, later normalized into the table stem.
    pub definition: String,
    /// Root concept of the role's DAG.
    pub root: ConceptName,
    /// Parent-child arcs in declared order.
    pub arcs: Vec<(ConceptName, ConceptName)>,
}

/// A validated link role holding its concept DAG as an adjacency list.
#[derive(Clone, Debug)]
pub struct LinkRole {
    /// Role URI.
    pub uri: RoleUri,
    /// Human-readable definition.
    pub definition: String,
    /// Root concept name.
    pub root: ConceptName,
    /// Children per concept, in declared arc order.
    pub children: IndexMap<ConceptName, Vec<ConceptName>>,
}

impl LinkRole {
    /// Children of `concept` inside this role, empty when it is a leaf.
    pub fn children_of(&self, concept: &str) -> &[ConceptName] {
        self.children
            .get(concept)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Loader-facing seam supplying flat taxonomy pieces.
///
/// Implementations may read a taxonomy document, an archive, or synthesize
/// the lists in memory; for a fixed source the output must be deterministic.
pub trait TaxonomyProvider {
    /// Every concept referenced by any role.
    fn concepts(&self) -> Result<Vec<Concept>, ExtractError>;
    /// Every link role with its declared arcs.
    fn roles(&self) -> Result<Vec<RoleDef>, ExtractError>;
    /// Declared axes. Concepts named `*Axis` are registered implicitly even
    /// when absent from this list.
    fn axes(&self) -> Result<Vec<Axis>, ExtractError>;
}

/// Validated, immutable taxonomy: concepts, roles, and axes fully resolved.
#[derive(Clone, Debug)]
pub struct TaxonomyModel {
    /// Concepts by qualified name (case-sensitive).
    pub concepts: IndexMap<ConceptName, Concept>,
    /// Link roles by URI, in provider order.
    pub roles: IndexMap<RoleUri, LinkRole>,
    /// Axes by name.
    pub axes: IndexMap<AxisName, Axis>,
}

impl TaxonomyModel {
    /// Build and validate a model from a provider.
    ///
    /// Fails with `TaxonomyIncomplete` on any dangling reference and with
    /// `TaxonomyCyclic` when a role's arcs form a cycle.
    pub fn from_provider(provider: &dyn TaxonomyProvider) -> Result<Self, ExtractError> {
        let mut concepts = IndexMap::new();
        for concept in provider.concepts()? {
            concepts.insert(concept.name.clone(), concept);
        }

        let mut axes: IndexMap<AxisName, Axis> = IndexMap::new();
        for axis in provider.axes()? {
            axes.insert(axis.name.clone(), axis);
        }
        for name in concepts.keys() {
            if name.ends_with(AXIS_NAME_SUFFIX) && !axes.contains_key(name) {
                axes.insert(name.clone(), Axis::explicit(name.clone(), Vec::new()));
            }
        }

        let mut roles = IndexMap::new();
        for def in provider.roles()? {
            let role = Self::resolve_role(def, &concepts)?;
            Self::check_acyclic(&role)?;
            roles.insert(role.uri.clone(), role);
        }

        debug!(
            concepts = concepts.len(),
            roles = roles.len(),
            axes = axes.len(),
            "taxonomy model built"
        );
        Ok(Self {
            concepts,
            roles,
            axes,
        })
    }

    /// True when `name` identifies an axis.
    pub fn is_axis(&self, name: &str) -> bool {
        self.axes.contains_key(name)
    }

    /// Look up a concept by qualified name.
    pub fn concept(&self, name: &str) -> Option<&Concept> {
        self.concepts.get(name)
    }

    fn resolve_role(
        def: RoleDef,
        concepts: &IndexMap<ConceptName, Concept>,
    ) -> Result<LinkRole, ExtractError> {
        let dangling = |name: &str| ExtractError::TaxonomyIncomplete {
            reference: format!("{} (role '{}')", name, def.uri),
        };
        if !concepts.contains_key(&def.root) {
            return Err(dangling(&def.root));
        }

        let mut children: IndexMap<ConceptName, Vec<ConceptName>> = IndexMap::new();
        children.insert(def.root.clone(), Vec::new());
        for (parent, child) in &def.arcs {
            if !concepts.contains_key(parent) {
                return Err(dangling(parent));
            }
            if !concepts.contains_key(child) {
                return Err(dangling(child));
            }
            children.entry(parent.clone()).or_default().push(child.clone());
            children.entry(child.clone()).or_default();
        }

        Ok(LinkRole {
            uri: def.uri,
            definition: def.definition,
            root: def.root,
            children,
        })
    }

    /// Depth-first cycle check over one role's adjacency list.
    fn check_acyclic(role: &LinkRole) -> Result<(), ExtractError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Open,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        // Stack entries are (concept, child position), giving an iterative
        // DFS that survives deep trees.
        let mut stack: Vec<(&str, usize)> = vec![(role.root.as_str(), 0)];
        marks.insert(role.root.as_str(), Mark::Open);

        while let Some((concept, pos)) = stack.pop() {
            let kids = role.children_of(concept);
            if pos >= kids.len() {
                marks.insert(concept, Mark::Done);
                continue;
            }
            stack.push((concept, pos + 1));
            let child = kids[pos].as_str();
            match marks.get(child) {
                Some(Mark::Open) => {
                    return Err(ExtractError::TaxonomyCyclic {
                        role: role.uri.clone(),
                        concept: child.to_string(),
                    })
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(child, Mark::Open);
                    stack.push((child, 0));
                }
            }
        }
        Ok(())
    }
}

/// In-memory provider for tests and programmatic taxonomies.
pub struct InMemoryTaxonomy {
    concepts: Vec<Concept>,
    roles: Vec<RoleDef>,
    axes: Vec<Axis>,
}

impl InMemoryTaxonomy {
    /// Create a provider from prebuilt pieces.
    pub fn new(concepts: Vec<Concept>, roles: Vec<RoleDef>, axes: Vec<Axis>) -> Self {
        Self {
            concepts,
            roles,
            axes,
        }
    }
}

impl TaxonomyProvider for InMemoryTaxonomy {
    fn concepts(&self) -> Result<Vec<Concept>, ExtractError> {
        Ok(self.concepts.clone())
    }

    fn roles(&self) -> Result<Vec<RoleDef>, ExtractError> {
        Ok(self.roles.clone())
    }

    fn axes(&self) -> Result<Vec<Axis>, ExtractError> {
        Ok(self.axes.clone())
    }
}

/// Provider over a relationship-view JSON document.
///
/// The document shape is the nested-list form emitted by taxonomy tooling:
/// a top-level `roles` array whose entries are
/// `["linkRole", {"role", "definition"}, ..., ["concept", {...}, {...}, children...]]`,
/// plus an optional `axes` array of typed-axis declarations.
pub struct JsonTaxonomyProvider {
    document: Value,
}

impl JsonTaxonomyProvider {
    /// Parse a provider from raw JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExtractError> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|err| ExtractError::TaxonomyDocument(err.to_string()))?;
        Ok(Self { document })
    }

    /// Read a provider from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Read a provider from an entry inside a zip archive.
    pub fn from_zip(path: impl AsRef<Path>, entry: &str) -> Result<Self, ExtractError> {
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|err| ExtractError::TaxonomyDocument(err.to_string()))?;
        let mut entry = archive
            .by_name(entry)
            .map_err(|err| ExtractError::TaxonomyDocument(err.to_string()))?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    fn roles_array(&self) -> Result<&Vec<Value>, ExtractError> {
        self.document
            .get("roles")
            .and_then(Value::as_array)
            .ok_or_else(|| ExtractError::TaxonomyDocument("missing 'roles' array".into()))
    }

    /// Walk one concept list, accumulating concepts and arcs.
    fn walk_concept(
        node: &Value,
        concepts: &mut IndexMap<ConceptName, Concept>,
        arcs: &mut Vec<(ConceptName, ConceptName)>,
    ) -> Result<ConceptName, ExtractError> {
        let malformed = |details: &str| ExtractError::TaxonomyDocument(details.to_string());
        let list = node
            .as_array()
            .ok_or_else(|| malformed("concept entry is not a list"))?;
        if list.first().and_then(Value::as_str) != Some("concept") {
            return Err(malformed("concept entry must start with 'concept'"));
        }
        let head = list
            .get(1)
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("concept entry missing name object"))?;
        let detail = list
            .get(2)
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("concept entry missing detail object"))?;

        let raw_name = head
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("concept entry missing 'name'"))?;
        let name = strip_prefix(raw_name).to_string();

        if !concepts.contains_key(&name) {
            let data_type = detail
                .get("type")
                .and_then(Value::as_str)
                .map(DataType::from_base)
                .unwrap_or(DataType::String);
            let period_type = match detail.get("periodType").and_then(Value::as_str) {
                Some("instant") => PeriodType::Instant,
                _ => PeriodType::Duration,
            };
            // Labels and documentation arrive as raw document text and may
            // carry line breaks and indentation runs.
            let mut concept = Concept::new(name.clone(), data_type, period_type).with_docs(
                normalize_inline_whitespace(
                    head.get("label").and_then(Value::as_str).unwrap_or(""),
                ),
                normalize_inline_whitespace(
                    detail
                        .get("documentation")
                        .and_then(Value::as_str)
                        .unwrap_or(""),
                ),
            );
            if let Some(unit) = detail.get("unit").and_then(Value::as_str) {
                concept = concept.with_unit(unit);
            }
            if let Some(references) = detail.get("references") {
                concept.references =
                    serde_json::from_value(references.clone()).unwrap_or_default();
            }
            concepts.insert(name.clone(), concept);
        }

        for child in &list[3..] {
            let child_name = Self::walk_concept(child, concepts, arcs)?;
            arcs.push((name.clone(), child_name));
        }
        Ok(name)
    }
}

/// Strip a namespace prefix (`ferc:PlantNameAxis` -> `PlantNameAxis`).
pub fn strip_prefix(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

impl TaxonomyProvider for JsonTaxonomyProvider {
    fn concepts(&self) -> Result<Vec<Concept>, ExtractError> {
        let mut concepts = IndexMap::new();
        let mut arcs = Vec::new();
        for role in self.roles_array()? {
            if let Some(tree) = role.as_array().and_then(|list| list.last()) {
                Self::walk_concept(tree, &mut concepts, &mut arcs)?;
            }
        }
        Ok(concepts.into_values().collect())
    }

    fn roles(&self) -> Result<Vec<RoleDef>, ExtractError> {
        let malformed = |details: &str| ExtractError::TaxonomyDocument(details.to_string());
        let mut defs = Vec::new();
        for role in self.roles_array()? {
            let list = role
                .as_array()
                .ok_or_else(|| malformed("role entry is not a list"))?;
            if list.first().and_then(Value::as_str) != Some("linkRole") {
                return Err(malformed("role entry must start with 'linkRole'"));
            }
            let info = list
                .get(1)
                .and_then(Value::as_object)
                .ok_or_else(|| malformed("role entry missing info object"))?;
            let uri = info
                .get("role")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("role entry missing 'role' uri"))?
                .to_string();
            let definition = info
                .get("definition")
                .and_then(Value::as_str)
                .unwrap_or(&uri)
                .to_string();
            let tree = list
                .last()
                .filter(|value| value.is_array())
                .ok_or_else(|| malformed("role entry missing concept tree"))?;

            let mut concepts = IndexMap::new();
            let mut arcs = Vec::new();
            let root = Self::walk_concept(tree, &mut concepts, &mut arcs)?;
            defs.push(RoleDef {
                uri,
                definition,
                root,
                arcs,
            });
        }
        Ok(defs)
    }

    fn axes(&self) -> Result<Vec<Axis>, ExtractError> {
        let Some(entries) = self.document.get("axes").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        let mut axes = Vec::new();
        for entry in entries {
            let Some(object) = entry.as_object() else {
                continue;
            };
            let Some(name) = object.get("name").and_then(Value::as_str) else {
                continue;
            };
            let name = strip_prefix(name).to_string();
            let axis = match object.get("dimensionType").and_then(Value::as_str) {
                Some("typed") => {
                    let value_type = object
                        .get("valueType")
                        .and_then(Value::as_str)
                        .map(DataType::from_base)
                        .unwrap_or(DataType::String);
                    Axis::typed(name, value_type)
                }
                _ => {
                    let domain = object
                        .get("domain")
                        .and_then(Value::as_array)
                        .map(|values| {
                            values
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    Axis::explicit(name, domain)
                }
            };
            axes.push(axis);
        }
        Ok(axes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_role(uri: &str, arcs: Vec<(&str, &str)>) -> RoleDef {
        RoleDef {
            uri: uri.to_string(),
            definition: format!("Definition of {uri}"),
            root: "Root".to_string(),
            arcs: arcs
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        }
    }

    fn concept_set(names: &[&str]) -> Vec<Concept> {
        names
            .iter()
            .map(|name| Concept::new(*name, DataType::Decimal, PeriodType::Duration))
            .collect()
    }

    #[test]
    fn builds_model_and_registers_suffix_axes() {
        let provider = InMemoryTaxonomy::new(
            concept_set(&["Root", "PlantNameAxis", "Balance"]),
            vec![linear_role(
                "role:one",
                vec![("Root", "PlantNameAxis"), ("Root", "Balance")],
            )],
            Vec::new(),
        );
        let model = TaxonomyModel::from_provider(&provider).unwrap();
        assert!(model.is_axis("PlantNameAxis"));
        assert!(!model.is_axis("Balance"));
        assert_eq!(model.roles["role:one"].children_of("Root").len(), 2);
    }

    #[test]
    fn rejects_dangling_arc_endpoints() {
        let provider = InMemoryTaxonomy::new(
            concept_set(&["Root"]),
            vec![linear_role("role:bad", vec![("Root", "Missing")])],
            Vec::new(),
        );
        let err = TaxonomyModel::from_provider(&provider).unwrap_err();
        assert!(matches!(err, ExtractError::TaxonomyIncomplete { .. }));
    }

    #[test]
    fn rejects_cycles() {
        let provider = InMemoryTaxonomy::new(
            concept_set(&["Root", "A", "B"]),
            vec![linear_role(
                "role:cyclic",
                vec![("Root", "A"), ("A", "B"), ("B", "A")],
            )],
            Vec::new(),
        );
        let err = TaxonomyModel::from_provider(&provider).unwrap_err();
        assert!(matches!(err, ExtractError::TaxonomyCyclic { .. }));
    }

    #[test]
    fn json_provider_parses_relationship_view() {
        let doc = serde_json::json!({
            "roles": [
                ["linkRole",
                 {"role": "http://example.com/roles/plant", "definition": "001 - Schedule - Plant"},
                 {},
                 ["concept", {"name": "ferc:PlantAbstract", "label": "Plant"},
                  {"type": "string", "periodType": "duration"},
                  ["concept", {"name": "ferc:PlantNameAxis", "label": "Plant Name"},
                   {"type": "string", "periodType": "duration"}],
                  ["concept", {"name": "ferc:PlantBalance", "label": "Balance"},
                   {"type": "monetary", "periodType": "instant", "unit": "USD",
                    "documentation": "Ending  plant\nbalance."}]]]
            ],
            "axes": [
                {"name": "ferc:ReportYearAxis", "dimensionType": "typed", "valueType": "integer"}
            ]
        });
        let provider =
            JsonTaxonomyProvider::from_bytes(doc.to_string().as_bytes()).unwrap();
        let model = TaxonomyModel::from_provider(&provider).unwrap();

        assert_eq!(model.roles.len(), 1);
        let role = &model.roles["http://example.com/roles/plant"];
        assert_eq!(role.root, "PlantAbstract");
        assert_eq!(role.children_of("PlantAbstract").len(), 2);
        assert_eq!(
            model.concept("PlantBalance").unwrap().data_type,
            DataType::Monetary
        );
        assert_eq!(
            model.concept("PlantBalance").unwrap().unit.as_deref(),
            Some("USD")
        );
        assert_eq!(
            model.concept("PlantBalance").unwrap().documentation,
            "Ending plant balance."
        );
        assert!(model.is_axis("PlantNameAxis"));
        assert_eq!(
            model.axes["ReportYearAxis"].value_type(),
            DataType::Integer
        );
    }
}
