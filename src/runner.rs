//! Parallel extraction across a filing set.
//!
//! The runner fans filings out to a scoped worker pool in batches, fans the
//! per-batch row streams back in over a bounded channel, merges rows per
//! table by primary key, and hands the merged tables to the sink. The
//! taxonomy model and the compiled schemas are shared read-only; all
//! filing-local state stays inside the worker that parsed it.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant as WallClock;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::constants::runner::{KIND_WORKER_PANICKED, SUMMARY_MAX_IDENTIFIERS};
use crate::errors::ExtractError;
use crate::instance::InstanceReader;
use crate::projector::{FactProjector, ProjectionCounters, Row};
use crate::schema::TableSchema;
use crate::sink::TableSink;
use crate::taxonomy::TaxonomyModel;
use crate::types::{FilingName, TableName};

/// Where a filing's bytes come from.
#[derive(Clone, Debug)]
pub enum FilingSource {
    /// A file on disk, read lazily by the worker.
    Path(std::path::PathBuf),
    /// Bytes already in memory (archive entries, tests).
    Bytes(Arc<Vec<u8>>),
}

/// One filing queued for extraction.
#[derive(Clone, Debug)]
pub struct FilingRef {
    /// Filing name, unique within the run.
    pub name: FilingName,
    /// Byte source.
    pub source: FilingSource,
    /// Time the filing was published; drives the merge policy.
    pub publication_time: DateTime<Utc>,
}

impl FilingRef {
    /// Reference a filing on disk.
    pub fn from_path(
        name: impl Into<FilingName>,
        path: impl Into<std::path::PathBuf>,
        publication_time: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            source: FilingSource::Path(path.into()),
            publication_time,
        }
    }

    /// Reference an in-memory filing.
    pub fn from_bytes(
        name: impl Into<FilingName>,
        bytes: Vec<u8>,
        publication_time: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            source: FilingSource::Bytes(Arc::new(bytes)),
            publication_time,
        }
    }
}

/// Run-wide cancellation signal shared with workers.
///
/// Workers finish their current batch and exit; rows already merged are
/// still written.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Count plus first few offending identifiers for one failure kind.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FailureSample {
    /// Total failures of this kind.
    pub count: u64,
    /// First identifiers seen, capped at a small sample.
    pub identifiers: Vec<FilingName>,
}

/// Outcome of a run: throughput, failures by kind, non-error counters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    /// Filings extracted successfully.
    pub filings_processed: usize,
    /// Filings skipped after a recoverable failure.
    pub filings_failed: usize,
    /// Failure samples keyed by error kind.
    pub failures: IndexMap<String, FailureSample>,
    /// Rows handed to the sink.
    pub rows_written: u64,
    /// Elements whose concept the taxonomy did not know.
    pub skipped_concepts: u64,
    /// Lexical values that degraded to null.
    pub type_coercion_skipped: u64,
    /// Duplicate facts dropped by document-order tie-break.
    pub duplicate_fact_dropped: u64,
}

impl RunSummary {
    /// Record one failed filing under `kind`.
    pub fn record_failure(&mut self, kind: &str, filing: &str) {
        self.filings_failed += 1;
        let sample = self.failures.entry(kind.to_string()).or_default();
        sample.count += 1;
        if sample.identifiers.len() < SUMMARY_MAX_IDENTIFIERS {
            sample.identifiers.push(filing.to_string());
        }
    }

    /// Process exit code: 0 on full success, 2 on partial success.
    pub fn exit_code(&self) -> i32 {
        if self.filings_failed == 0 {
            0
        } else {
            2
        }
    }
}

/// Rows produced by one worker batch, tagged by table.
struct BatchOutput {
    tables: HashMap<TableName, Vec<Row>>,
    processed: usize,
    failures: Vec<(&'static str, FilingName)>,
    skipped_concepts: u64,
    counters: ProjectionCounters,
    /// A fatal error encountered mid-batch; aborts the whole run.
    fatal: Option<ExtractError>,
}

/// A merged row plus the ordering fields deciding supersession.
struct MergedRow {
    row: Row,
    publication_time: String,
    filing_name: FilingName,
}

/// Drives parallel extraction of a filing set into a sink.
pub struct BatchRunner {
    model: Arc<TaxonomyModel>,
    schemas: Arc<IndexMap<TableName, TableSchema>>,
    config: ExtractionConfig,
    cancel: CancellationToken,
}

impl BatchRunner {
    /// Create a runner over a shared taxonomy model and schema set.
    pub fn new(
        model: Arc<TaxonomyModel>,
        schemas: Arc<IndexMap<TableName, TableSchema>>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            model,
            schemas,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an external cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Extract every filing, merge rows per table, and write to `sink`.
    ///
    /// Recoverable filing failures are recorded in the summary and skipped;
    /// errors whose `is_fatal` kind says so (taxonomy, sink, I/O) abort the
    /// run before anything is written.
    pub fn run(
        &self,
        filings: Vec<FilingRef>,
        sink: &mut dyn TableSink,
    ) -> Result<RunSummary, ExtractError> {
        let mut summary = RunSummary::default();
        let total_filings = filings.len();
        let mut batches: VecDeque<(usize, Vec<FilingRef>)> = VecDeque::new();
        let mut queued = filings.into_iter().peekable();
        let mut index = 0;
        while queued.peek().is_some() {
            let batch: Vec<FilingRef> = queued.by_ref().take(self.config.batch_size).collect();
            batches.push_back((index, batch));
            index += 1;
        }
        let total_batches = batches.len();
        let queue = Mutex::new(batches);

        debug!(
            filings = total_filings,
            batches = total_batches,
            workers = self.config.workers,
            "starting extraction"
        );

        let mut merged: IndexMap<TableName, IndexMap<Vec<String>, MergedRow>> = IndexMap::new();
        let mut fatal: Option<ExtractError> = None;
        let (tx, rx) = mpsc::sync_channel::<BatchOutput>(self.config.channel_capacity);

        thread::scope(|scope| {
            for _ in 0..self.config.workers.max(1) {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    loop {
                        if self.cancel.is_cancelled() {
                            break;
                        }
                        let next = {
                            let mut queue = queue.lock().expect("filing queue poisoned");
                            queue.pop_front()
                        };
                        let Some((batch_index, batch)) = next else {
                            break;
                        };
                        let output = self.process_batch(batch);
                        debug!(batch = batch_index + 1, total_batches, "batch finished");
                        if tx.send(output).is_err() {
                            // Consumer is gone; nothing left to report to.
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for output in rx {
                if let Some(err) = output.fatal {
                    // Fatal errors abort the run; remaining workers finish
                    // their current batch and exit.
                    self.cancel.cancel();
                    if fatal.is_none() {
                        fatal = Some(err);
                    }
                    continue;
                }
                summary.filings_processed += output.processed;
                summary.skipped_concepts += output.skipped_concepts;
                summary.type_coercion_skipped += output.counters.type_coercion_skipped;
                summary.duplicate_fact_dropped += output.counters.duplicate_fact_dropped;
                for (kind, filing) in output.failures {
                    eprintln!("[xbrl_extract] filing '{filing}' skipped: {kind}");
                    summary.record_failure(kind, &filing);
                }
                for (table, rows) in output.tables {
                    let Some(schema) = self.schemas.get(&table) else {
                        continue;
                    };
                    let merged_table = merged.entry(table).or_default();
                    for row in rows {
                        merge_row(merged_table, schema, row);
                    }
                }
            }
        });

        if let Some(err) = fatal {
            return Err(err);
        }

        for (table, rows) in merged {
            let Some(schema) = self.schemas.get(&table) else {
                continue;
            };
            let rows: Vec<Row> = rows.into_values().map(|merged| merged.row).collect();
            sink.write_rows(schema, &rows)?;
            summary.rows_written += rows.len() as u64;
        }
        sink.flush()?;

        debug!(
            processed = summary.filings_processed,
            failed = summary.filings_failed,
            rows = summary.rows_written,
            "extraction finished"
        );
        Ok(summary)
    }

    /// Parse and project one batch of filings inside a worker.
    fn process_batch(&self, batch: Vec<FilingRef>) -> BatchOutput {
        let mut output = BatchOutput {
            tables: HashMap::new(),
            processed: 0,
            failures: Vec::new(),
            skipped_concepts: 0,
            counters: ProjectionCounters::default(),
            fatal: None,
        };
        for filing in batch {
            let outcome = catch_unwind(AssertUnwindSafe(|| self.process_filing(&filing)));
            match outcome {
                Ok(Ok((tables, skipped, counters))) => {
                    output.processed += 1;
                    output.skipped_concepts += skipped;
                    output.counters.absorb(counters);
                    for (table, mut rows) in tables {
                        output.tables.entry(table).or_default().append(&mut rows);
                    }
                }
                Ok(Err(err)) if err.is_fatal() => {
                    output.fatal = Some(err);
                    break;
                }
                Ok(Err(err)) => {
                    output.failures.push((err.kind(), filing.name.clone()));
                }
                Err(_) => {
                    output
                        .failures
                        .push((KIND_WORKER_PANICKED, filing.name.clone()));
                }
            }
        }
        output
    }

    /// Parse one filing and project it into every table schema.
    fn process_filing(
        &self,
        filing: &FilingRef,
    ) -> Result<(HashMap<TableName, Vec<Row>>, u64, ProjectionCounters), ExtractError> {
        let mut reader = InstanceReader::new(&self.model);
        if let Some(timeout) = self.config.filing_timeout {
            reader = reader.with_deadline(WallClock::now() + timeout);
        }
        let instance = match &filing.source {
            FilingSource::Path(path) => {
                reader.read_path(path, &filing.name, filing.publication_time)?
            }
            FilingSource::Bytes(bytes) => {
                reader.read_bytes(bytes, &filing.name, filing.publication_time)?
            }
        };

        let mut tables = HashMap::new();
        let mut counters = ProjectionCounters::default();
        for (name, schema) in self.schemas.iter() {
            let (rows, table_counters) = FactProjector::new(schema).project(&instance);
            counters.absorb(table_counters);
            if !rows.is_empty() {
                tables.insert(name.clone(), rows);
            }
        }
        Ok((tables, instance.skipped_concepts, counters))
    }
}

/// Merge one row into a table by primary key.
///
/// Distinct keys union. On a key collision the later-published filing wins
/// (filing name as the deterministic tiebreak) and its non-null data cells
/// overlay the other row, so the result does not depend on arrival order.
fn merge_row(
    table: &mut IndexMap<Vec<String>, MergedRow>,
    schema: &TableSchema,
    row: Row,
) {
    let key = row.key_strings();
    let publication_time = publication_cell(schema, &key);
    let filing_name = filing_cell(schema, &key);
    let incoming = MergedRow {
        row,
        publication_time,
        filing_name,
    };
    match table.get_mut(&key) {
        None => {
            table.insert(key, incoming);
        }
        Some(existing) => {
            let incoming_wins = (&incoming.publication_time, &incoming.filing_name)
                >= (&existing.publication_time, &existing.filing_name);
            if incoming_wins {
                let mut data = incoming.row.data;
                for (cell, fallback) in data.iter_mut().zip(existing.row.data.iter()) {
                    if cell.is_none() {
                        *cell = fallback.clone();
                    }
                }
                existing.row = Row {
                    key: incoming.row.key,
                    data,
                };
                existing.publication_time = incoming.publication_time;
                existing.filing_name = incoming.filing_name;
            } else {
                for (cell, fallback) in existing.row.data.iter_mut().zip(incoming.row.data) {
                    if cell.is_none() {
                        *cell = fallback;
                    }
                }
            }
        }
    }
}

fn publication_cell(schema: &TableSchema, key: &[String]) -> String {
    column_cell(schema, key, crate::constants::schema::PUBLICATION_TIME)
}

fn filing_cell(schema: &TableSchema, key: &[String]) -> String {
    column_cell(schema, key, crate::constants::schema::FILING_NAME)
}

fn column_cell(schema: &TableSchema, key: &[String], column: &str) -> String {
    schema
        .primary_key
        .iter()
        .position(|candidate| candidate.name == column)
        .and_then(|index| key.get(index))
        .cloned()
        .unwrap_or_default()
}
