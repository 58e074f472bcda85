//! End-to-end projection scenarios: one taxonomy, one filing, typed rows.

use chrono::{NaiveDate, TimeZone, Utc};
use xbrl_extract::{
    CellValue, Concept, DataType, FactProjector, InMemoryTaxonomy, InstanceReader, PeriodType,
    RoleDef, SchemaCompiler, TaxonomyModel,
};

fn minimal_model() -> TaxonomyModel {
    let concepts = vec![
        Concept::new("Root", DataType::String, PeriodType::Duration),
        Concept::new("CountOfThings", DataType::Integer, PeriodType::Instant),
        Concept::new("AmountAccrued", DataType::Decimal, PeriodType::Duration),
    ];
    let role = RoleDef {
        uri: "http://example.com/roles/r".to_string(),
        definition: "R".to_string(),
        root: "Root".to_string(),
        arcs: vec![
            ("Root".to_string(), "CountOfThings".to_string()),
            ("Root".to_string(), "AmountAccrued".to_string()),
        ],
    };
    TaxonomyModel::from_provider(&InMemoryTaxonomy::new(concepts, vec![role], Vec::new()))
        .unwrap()
}

fn axis_model() -> TaxonomyModel {
    let concepts = vec![
        Concept::new("Root", DataType::String, PeriodType::Duration),
        Concept::new("PlantNameAxis", DataType::String, PeriodType::Duration),
        Concept::new("PlantCapacity", DataType::Decimal, PeriodType::Instant),
    ];
    let role = RoleDef {
        uri: "http://example.com/roles/plant".to_string(),
        definition: "Plant".to_string(),
        root: "Root".to_string(),
        arcs: vec![
            ("Root".to_string(), "PlantNameAxis".to_string()),
            ("Root".to_string(), "PlantCapacity".to_string()),
        ],
    };
    TaxonomyModel::from_provider(&InMemoryTaxonomy::new(concepts, vec![role], Vec::new()))
        .unwrap()
}

const MINIMAL_FILING: &str = r#"<?xml version="1.0"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:f="http://example.com/form">
  <xbrli:context id="ci">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:instant>2023-01-01</xbrli:instant></xbrli:period>
  </xbrli:context>
  <xbrli:context id="cd">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier></xbrli:entity>
    <xbrli:period>
      <xbrli:startDate>2023-01-01</xbrli:startDate>
      <xbrli:endDate>2023-12-31</xbrli:endDate>
    </xbrli:period>
  </xbrli:context>
  <f:CountOfThings contextRef="ci">5</f:CountOfThings>
  <f:AmountAccrued contextRef="cd">7.25</f:AmountAccrued>
</xbrli:xbrl>"#;

#[test]
fn minimal_taxonomy_minimal_filing() {
    let model = minimal_model();
    let tables = SchemaCompiler::new(&model).compile(None).unwrap();
    assert!(tables.contains_key("r_instant"));
    assert!(tables.contains_key("r_duration"));

    let publication = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    let instance = InstanceReader::new(&model)
        .read_bytes(MINIMAL_FILING.as_bytes(), "f1", publication)
        .unwrap();

    let (instant_rows, _) = FactProjector::new(&tables["r_instant"]).project(&instance);
    assert_eq!(instant_rows.len(), 1);
    let row = &instant_rows[0];
    assert_eq!(row.key[0], CellValue::Text("E1".to_string()));
    assert_eq!(row.key[1], CellValue::Text("f1".to_string()));
    assert_eq!(
        row.key[3],
        CellValue::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
    );
    assert_eq!(row.data, vec![Some(CellValue::Integer(5))]);

    let (duration_rows, _) = FactProjector::new(&tables["r_duration"]).project(&instance);
    assert_eq!(duration_rows.len(), 1);
    let row = &duration_rows[0];
    assert_eq!(
        row.key[3],
        CellValue::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
    );
    assert_eq!(
        row.key[4],
        CellValue::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
    );
    assert_eq!(row.data, vec![Some(CellValue::Real(7.25))]);
}

#[test]
fn axis_scoped_fact_lands_in_axis_table_only() {
    let model = axis_model();
    let tables = SchemaCompiler::new(&model).compile(None).unwrap();
    let table = &tables["plant_instant"];
    assert!(table
        .primary_key
        .iter()
        .any(|column| column.name == "plant_name_axis"));

    let filing = r#"<?xml version="1.0"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:f="http://example.com/form">
  <xbrli:context id="tagged">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier>
      <xbrli:segment>
        <xbrldi:explicitMember xmlns:xbrldi="http://xbrl.org/2006/xbrldi" dimension="f:PlantNameAxis">f:Alpha</xbrldi:explicitMember>
      </xbrli:segment>
    </xbrli:entity>
    <xbrli:period><xbrli:instant>2023-06-30</xbrli:instant></xbrli:period>
  </xbrli:context>
  <xbrli:context id="bare">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:instant>2023-06-30</xbrli:instant></xbrli:period>
  </xbrli:context>
  <f:PlantCapacity contextRef="tagged">120.5</f:PlantCapacity>
  <f:PlantCapacity contextRef="bare">999.9</f:PlantCapacity>
</xbrli:xbrl>"#;

    let instance = InstanceReader::new(&model)
        .read_bytes(filing.as_bytes(), "f1", Utc::now())
        .unwrap();
    let (rows, _) = FactProjector::new(table).project(&instance);

    // Only the tagged fact matches; the bare one has a smaller axis set.
    assert_eq!(rows.len(), 1);
    let axis_cell = rows[0].key.last().unwrap();
    assert_eq!(*axis_cell, CellValue::Text("Alpha".to_string()));
    assert_eq!(rows[0].data, vec![Some(CellValue::Real(120.5))]);
}

#[test]
fn extra_axis_excludes_fact_from_narrower_table() {
    let model = axis_model();
    let tables = SchemaCompiler::new(&model).compile(None).unwrap();
    let table = &tables["plant_instant"];

    let filing = r#"<?xml version="1.0"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:f="http://example.com/form">
  <xbrli:context id="wide">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier>
      <xbrli:segment>
        <xbrldi:explicitMember xmlns:xbrldi="http://xbrl.org/2006/xbrldi" dimension="f:PlantNameAxis">f:Alpha</xbrldi:explicitMember>
        <xbrldi:explicitMember xmlns:xbrldi="http://xbrl.org/2006/xbrldi" dimension="f:ReportYearAxis">f:Y2023</xbrldi:explicitMember>
      </xbrli:segment>
    </xbrli:entity>
    <xbrli:period><xbrli:instant>2023-06-30</xbrli:instant></xbrli:period>
  </xbrli:context>
  <f:PlantCapacity contextRef="wide">120.5</f:PlantCapacity>
</xbrli:xbrl>"#;

    let instance = InstanceReader::new(&model)
        .read_bytes(filing.as_bytes(), "f1", Utc::now())
        .unwrap();
    let (rows, _) = FactProjector::new(table).project(&instance);
    assert!(rows.is_empty(), "set-equality must be strict");
}

#[test]
fn duplicate_fact_drops_earlier_value_and_counts() {
    let model = minimal_model();
    let tables = SchemaCompiler::new(&model).compile(None).unwrap();

    let filing = r#"<?xml version="1.0"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:f="http://example.com/form">
  <xbrli:context id="ci">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:instant>2023-01-01</xbrli:instant></xbrli:period>
  </xbrli:context>
  <f:CountOfThings contextRef="ci">5</f:CountOfThings>
  <f:CountOfThings contextRef="ci">6</f:CountOfThings>
</xbrli:xbrl>"#;

    let instance = InstanceReader::new(&model)
        .read_bytes(filing.as_bytes(), "f1", Utc::now())
        .unwrap();
    let (rows, counters) = FactProjector::new(&tables["r_instant"]).project(&instance);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].data, vec![Some(CellValue::Integer(6))]);
    assert_eq!(counters.duplicate_fact_dropped, 1);
}

#[test]
fn duplicate_counts_even_when_the_earlier_value_fails_to_parse() {
    let model = minimal_model();
    let tables = SchemaCompiler::new(&model).compile(None).unwrap();

    let filing = r#"<?xml version="1.0"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:f="http://example.com/form">
  <xbrli:context id="ci">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:instant>2023-01-01</xbrli:instant></xbrli:period>
  </xbrli:context>
  <f:CountOfThings contextRef="ci">n/a</f:CountOfThings>
  <f:CountOfThings contextRef="ci">6</f:CountOfThings>
</xbrli:xbrl>"#;

    let instance = InstanceReader::new(&model)
        .read_bytes(filing.as_bytes(), "f1", Utc::now())
        .unwrap();
    let (rows, counters) = FactProjector::new(&tables["r_instant"]).project(&instance);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].data, vec![Some(CellValue::Integer(6))]);
    assert_eq!(counters.duplicate_fact_dropped, 1);
    assert_eq!(counters.type_coercion_skipped, 1);
}

#[test]
fn primary_keys_are_fully_populated() {
    let model = axis_model();
    let tables = SchemaCompiler::new(&model).compile(None).unwrap();
    let table = &tables["plant_instant"];

    let filing = r#"<?xml version="1.0"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:f="http://example.com/form">
  <xbrli:context id="tagged">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier>
      <xbrli:segment>
        <xbrldi:explicitMember xmlns:xbrldi="http://xbrl.org/2006/xbrldi" dimension="f:PlantNameAxis">f:Beta</xbrldi:explicitMember>
      </xbrli:segment>
    </xbrli:entity>
    <xbrli:period><xbrli:instant>2023-06-30</xbrli:instant></xbrli:period>
  </xbrli:context>
  <f:PlantCapacity contextRef="tagged">42</f:PlantCapacity>
</xbrli:xbrl>"#;

    let instance = InstanceReader::new(&model)
        .read_bytes(filing.as_bytes(), "f1", Utc::now())
        .unwrap();
    let (rows, _) = FactProjector::new(table).project(&instance);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key.len(), table.primary_key.len());
    assert!(rows[0].key_strings().iter().all(|cell| !cell.is_empty()));
}
