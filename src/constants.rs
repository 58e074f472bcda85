/// Constants used by the instance XML reader.
pub mod xml {
    /// Namespace of the XBRL instance vocabulary (`xbrli`).
    pub const XBRL_INSTANCE_NS: &str = "http://www.xbrl.org/2003/instance";
    /// Local name of the document root element.
    pub const ROOT_ELEMENT: &str = "xbrl";
    /// Local name of context elements.
    pub const CONTEXT_ELEMENT: &str = "context";
    /// Attribute linking a fact to its context.
    pub const CONTEXT_REF_ATTR: &str = "contextRef";
    /// Attribute naming the axis on a segment member element.
    pub const DIMENSION_ATTR: &str = "dimension";
    /// Date format used by XBRL period elements.
    pub const PERIOD_DATE_FORMAT: &str = "%Y-%m-%d";
    /// Number of XML events between cooperative deadline checks.
    pub const DEADLINE_CHECK_INTERVAL: usize = 512;
    /// Local names that never carry facts at the document top level.
    pub const NON_FACT_ELEMENTS: [&str; 4] = ["context", "unit", "schemaRef", "xbrl"];
}

/// Constants used by schema compilation and column naming.
pub mod schema {
    /// Primary-key column holding the reporting entity identifier.
    pub const ENTITY_ID: &str = "entity_id";
    /// Primary-key column holding the filing name.
    pub const FILING_NAME: &str = "filing_name";
    /// Primary-key column holding the filing publication time.
    pub const PUBLICATION_TIME: &str = "publication_time";
    /// Primary-key column holding the date of an instant period.
    pub const INSTANT_DATE: &str = "date";
    /// Primary-key column holding the start of a duration period.
    pub const START_DATE: &str = "start_date";
    /// Primary-key column holding the end of a duration period.
    pub const END_DATE: &str = "end_date";
    /// Suffix identifying axis concepts in the taxonomy.
    pub const AXIS_NAME_SUFFIX: &str = "Axis";
    /// Table-name suffix for instant tables.
    pub const INSTANT_TABLE_SUFFIX: &str = "instant";
    /// Table-name suffix for duration tables.
    pub const DURATION_TABLE_SUFFIX: &str = "duration";
    /// Number of hex digits kept from a role-URI hash on stem collisions.
    pub const COLLISION_HASH_WIDTH: usize = 8;
}

/// Constants used by the batch runner and run summaries.
pub mod runner {
    /// Default number of filings per worker batch.
    pub const DEFAULT_BATCH_SIZE: usize = 20;
    /// Default bound of the worker results channel, in batches.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;
    /// Maximum identifiers retained per failure kind in a run summary.
    pub const SUMMARY_MAX_IDENTIFIERS: usize = 10;
    /// Failure kind recorded when a worker panics inside projection.
    pub const KIND_WORKER_PANICKED: &str = "worker_panicked";
}

/// Constants used by filing discovery.
pub mod filings {
    /// File extension of XBRL instance documents.
    pub const INSTANCE_EXTENSION: &str = "xbrl";
    /// Name of the optional publication-metadata envelope inside archives.
    pub const RSSFEED_ENTRY: &str = "rssfeed";
}
