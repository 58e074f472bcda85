use std::collections::BTreeSet;
use std::time::Duration;

use crate::constants::runner::{DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY};
use crate::types::TableName;

/// Top-level extraction configuration.
#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    /// Number of parallel workers; defaults to one per logical core.
    pub workers: usize,
    /// Max number of filings handed to a worker at a time.
    pub batch_size: usize,
    /// Bound of the worker results channel, in batches.
    ///
    /// Workers block on send once this many batches are waiting on the
    /// consumer, which is what keeps memory flat when the sink is slow.
    pub channel_capacity: usize,
    /// Optional wall-clock budget for parsing a single filing.
    pub filing_timeout: Option<Duration>,
    /// Optional allow-list restricting extraction to the named tables.
    ///
    /// Entries match either a bare stem (`electric_plant`) or a full table
    /// name (`electric_plant_instant`).
    pub tables: Option<BTreeSet<TableName>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            batch_size: DEFAULT_BATCH_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            filing_timeout: None,
            tables: None,
        }
    }
}

impl ExtractionConfig {
    /// Override the worker count (clamped to at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Override the per-worker batch size (clamped to at least one).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Override the results channel capacity (clamped to at least one).
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set a per-filing parse timeout.
    pub fn with_filing_timeout(mut self, timeout: Duration) -> Self {
        self.filing_timeout = Some(timeout);
        self
    }

    /// Restrict extraction to the given table stems or full table names.
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TableName>,
    {
        self.tables = Some(tables.into_iter().map(Into::into).collect());
        self
    }
}
