/// Qualified concept name with the namespace prefix stripped.
/// Example: `UtilityPlantInService`
pub type ConceptName = String;
/// URI identifying a link role in the taxonomy.
/// Example: `http://ferc.gov/form/2022-01-01/roles/sched_plant`
pub type RoleUri = String;
/// Axis (dimension) name as declared by the taxonomy.
/// Example: `PlantNameAxis`
pub type AxisName = String;
/// Context identifier, local to a single filing.
/// Example: `c-27`
pub type ContextId = String;
/// Identifier of the reporting entity.
/// Example: `C000153`
pub type EntityId = String;
/// Output table name, stem plus period suffix.
/// Example: `electric_plant_in_service_duration`
pub type TableName = String;
/// Name of a filing, unique within one run.
/// Examples: `Evergy_Metro_form1_Q4_1681873359`, `f1_2023_refiled`
pub type FilingName = String;
/// Raw lexical fact or axis value as it appears in the document.
/// Examples: `7.25`, `true`, `Alpha Station`
pub type LexicalValue = String;
