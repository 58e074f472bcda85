//! Reusable command-line runners shared by downstream binaries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indexmap::IndexMap;

use crate::config::ExtractionConfig;
use crate::datapackage::Datapackage;
use crate::errors::ExtractError;
use crate::metadata::write_metadata;
use crate::runner::{BatchRunner, FilingRef, RunSummary};
use crate::schema::{SchemaCompiler, TableSchema};
use crate::sink::{JsonlSink, MemorySink};
use crate::taxonomy::{JsonTaxonomyProvider, TaxonomyModel};
use crate::transport::fs::collect_filings;
use crate::types::TableName;

/// Arguments for the extraction runner.
#[derive(Debug, Parser)]
#[command(
    name = "xbrl_extract",
    disable_help_subcommand = true,
    about = "Extract data from XBRL filings",
    long_about = "Compile a taxonomy into relational table schemas, project a set of \
                  XBRL filings into them, and write the merged tables plus optional \
                  datapackage and metadata descriptors."
)]
pub struct ExtractCli {
    /// Path to a single filing, a directory of filings, or a zip archive; repeatable.
    #[arg(required = true)]
    pub filings: Vec<PathBuf>,
    /// Path to a taxonomy relationship-view JSON document, or a zip archive of one.
    #[arg(short = 't', long)]
    pub taxonomy: PathBuf,
    /// Entry-point path inside a taxonomy archive; required iff the taxonomy is a zip.
    #[arg(long = "archive-path", value_name = "ENTRY")]
    pub archive_path: Option<String>,
    /// Number of workers in the pool (defaults to one per logical core).
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,
    /// Number of filings processed per worker batch.
    #[arg(short = 'b', long = "batch-size")]
    pub batch_size: Option<usize>,
    /// Per-filing wall-clock parse budget, in seconds.
    #[arg(long = "filing-timeout", value_name = "SECONDS")]
    pub filing_timeout: Option<u64>,
    /// Write one JSONL file per table into this directory.
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Write a frictionless datapackage descriptor to this JSON file.
    #[arg(short = 's', long = "datapackage-path", value_name = "PATH")]
    pub datapackage_path: Option<PathBuf>,
    /// Write taxonomy metadata grouped by table to this JSON file.
    #[arg(short = 'm', long = "metadata-path", value_name = "PATH")]
    pub metadata_path: Option<PathBuf>,
    /// Restrict extraction to these table stems or full table names.
    #[arg(long = "tables", value_name = "TABLE", num_args = 1..)]
    pub tables: Option<Vec<TableName>>,
}

/// Run the extraction app and return its process exit code.
///
/// Exit codes: `0` on complete success, `1` on a fatal taxonomy or sink
/// error, `2` on partial success with at least one filing failure (the
/// machine-readable summary is written to stderr).
pub fn run_extract_app() -> i32 {
    let cli = ExtractCli::parse();
    match run_extract(cli) {
        Ok(summary) => {
            let code = summary.exit_code();
            if code != 0 {
                match serde_json::to_string_pretty(&summary) {
                    Ok(rendered) => eprintln!("{rendered}"),
                    Err(err) => eprintln!("[xbrl_extract] summary rendering failed: {err}"),
                }
            }
            code
        }
        Err(err) => {
            eprintln!("[xbrl_extract] fatal: {}: {err}", err.kind());
            1
        }
    }
}

/// Wire a full extraction run from parsed arguments.
pub fn run_extract(cli: ExtractCli) -> Result<RunSummary, ExtractError> {
    let provider = match &cli.archive_path {
        Some(entry) => JsonTaxonomyProvider::from_zip(&cli.taxonomy, entry)?,
        None => JsonTaxonomyProvider::from_path(&cli.taxonomy)?,
    };
    let model = Arc::new(TaxonomyModel::from_provider(&provider)?);

    let mut config = ExtractionConfig::default();
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    if let Some(batch_size) = cli.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if let Some(seconds) = cli.filing_timeout {
        config = config.with_filing_timeout(Duration::from_secs(seconds));
    }
    if let Some(tables) = &cli.tables {
        config = config.with_tables(tables.iter().cloned());
    }

    let schemas: Arc<IndexMap<TableName, TableSchema>> = Arc::new(
        SchemaCompiler::new(&model).compile(config.tables.as_ref())?,
    );

    let db_uri = cli
        .output_dir
        .as_ref()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|| "memory".to_string());
    if let Some(path) = &cli.datapackage_path {
        Datapackage::from_schemas("xbrl-extract", &db_uri, &schemas).write_json(path)?;
    }
    if let Some(path) = &cli.metadata_path {
        write_metadata(path, &model, &schemas)?;
    }

    let mut filings: Vec<FilingRef> = Vec::new();
    for path in &cli.filings {
        filings.extend(collect_filings(path)?);
    }

    let runner = BatchRunner::new(Arc::clone(&model), Arc::clone(&schemas), config);
    match &cli.output_dir {
        Some(dir) => {
            let mut sink = JsonlSink::new(dir)?;
            runner.run(filings, &mut sink)
        }
        None => {
            let mut sink = MemorySink::new();
            let summary = runner.run(filings, &mut sink)?;
            eprintln!(
                "[xbrl_extract] no output directory given; {} rows discarded",
                sink.total_rows()
            );
            Ok(summary)
        }
    }
}
