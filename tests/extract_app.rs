//! Full-pipeline run through the app wiring: JSON taxonomy document in,
//! JSONL tables plus descriptors out.

use serde_json::Value;
use tempfile::tempdir;
use xbrl_extract::apps::{run_extract, ExtractCli};

const TAXONOMY: &str = r#"{
  "roles": [
    ["linkRole",
     {"role": "http://example.com/roles/plant", "definition": "104 - Schedule - Electric Plant"},
     {},
     ["concept", {"name": "f:PlantAbstract", "label": "Plant"},
      {"type": "string", "periodType": "duration"},
      ["concept", {"name": "f:PlantNameAxis", "label": "Plant Name"},
       {"type": "string", "periodType": "duration"}],
      ["concept", {"name": "f:PlantCapacity", "label": "Capacity"},
       {"type": "decimal", "periodType": "instant"}],
      ["concept", {"name": "f:PlantAdditions", "label": "Additions"},
       {"type": "monetary", "periodType": "duration", "unit": "USD"}]]]
  ]
}"#;

fn filing_xml(plant: &str, capacity: f64) -> String {
    format!(
        r#"<?xml version="1.0"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:f="http://example.com/form">
  <xbrli:context id="ci">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier>
      <xbrli:segment>
        <xbrldi:explicitMember xmlns:xbrldi="http://xbrl.org/2006/xbrldi" dimension="f:PlantNameAxis">f:{plant}</xbrldi:explicitMember>
      </xbrli:segment>
    </xbrli:entity>
    <xbrli:period><xbrli:instant>2023-12-31</xbrli:instant></xbrli:period>
  </xbrli:context>
  <xbrli:context id="cd">
    <xbrli:entity><xbrli:identifier scheme="s">E1</xbrli:identifier>
      <xbrli:segment>
        <xbrldi:explicitMember xmlns:xbrldi="http://xbrl.org/2006/xbrldi" dimension="f:PlantNameAxis">f:{plant}</xbrldi:explicitMember>
      </xbrli:segment>
    </xbrli:entity>
    <xbrli:period>
      <xbrli:startDate>2023-01-01</xbrli:startDate>
      <xbrli:endDate>2023-12-31</xbrli:endDate>
    </xbrli:period>
  </xbrli:context>
  <f:PlantCapacity contextRef="ci">{capacity}</f:PlantCapacity>
  <f:PlantAdditions contextRef="cd">1000.5</f:PlantAdditions>
</xbrli:xbrl>"#
    )
}

#[test]
fn extracts_a_directory_into_jsonl_tables_and_descriptors() {
    let temp = tempdir().unwrap();
    let taxonomy_path = temp.path().join("taxonomy.json");
    std::fs::write(&taxonomy_path, TAXONOMY).unwrap();

    let filings_dir = temp.path().join("filings");
    std::fs::create_dir_all(&filings_dir).unwrap();
    std::fs::write(filings_dir.join("alpha.xbrl"), filing_xml("Alpha", 120.5)).unwrap();
    std::fs::write(filings_dir.join("beta.xbrl"), filing_xml("Beta", 88.0)).unwrap();

    let output_dir = temp.path().join("out");
    let datapackage_path = temp.path().join("datapackage.json");
    let metadata_path = temp.path().join("metadata.json");

    let cli = ExtractCli {
        filings: vec![filings_dir],
        taxonomy: taxonomy_path,
        archive_path: None,
        workers: Some(2),
        batch_size: Some(1),
        filing_timeout: None,
        output_dir: Some(output_dir.clone()),
        datapackage_path: Some(datapackage_path.clone()),
        metadata_path: Some(metadata_path.clone()),
        tables: None,
    };
    let summary = run_extract(cli).unwrap();

    assert_eq!(summary.filings_processed, 2);
    assert_eq!(summary.filings_failed, 0);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.rows_written, 4);

    let instant = std::fs::read_to_string(
        output_dir.join("electric_plant_104_instant.jsonl"),
    )
    .unwrap();
    let rows: Vec<Value> = instant
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row["entity_id"], "E1");
        assert_eq!(row["date"], "2023-12-31");
        assert!(row["plant_name_axis"].is_string());
        assert!(row["plant_capacity"].is_number());
    }

    let datapackage: Value =
        serde_json::from_str(&std::fs::read_to_string(&datapackage_path).unwrap()).unwrap();
    assert_eq!(datapackage["profile"], "tabular-data-package");
    assert_eq!(datapackage["resources"].as_array().unwrap().len(), 2);

    let metadata: Value =
        serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();
    let columns = metadata["electric_plant_104_duration"].as_array().unwrap();
    assert!(columns
        .iter()
        .any(|column| column["column"] == "plant_additions" && column["unit"] == "USD"));
}

#[test]
fn table_allow_list_limits_the_run() {
    let temp = tempdir().unwrap();
    let taxonomy_path = temp.path().join("taxonomy.json");
    std::fs::write(&taxonomy_path, TAXONOMY).unwrap();

    let filings_dir = temp.path().join("filings");
    std::fs::create_dir_all(&filings_dir).unwrap();
    std::fs::write(filings_dir.join("alpha.xbrl"), filing_xml("Alpha", 120.5)).unwrap();

    let output_dir = temp.path().join("out");
    let cli = ExtractCli {
        filings: vec![filings_dir],
        taxonomy: taxonomy_path,
        archive_path: None,
        workers: Some(1),
        batch_size: None,
        filing_timeout: None,
        output_dir: Some(output_dir.clone()),
        datapackage_path: None,
        metadata_path: None,
        tables: Some(vec!["electric_plant_104_instant".to_string()]),
    };
    let summary = run_extract(cli).unwrap();

    assert_eq!(summary.rows_written, 1);
    assert!(output_dir.join("electric_plant_104_instant.jsonl").exists());
    assert!(!output_dir.join("electric_plant_104_duration.jsonl").exists());
}
