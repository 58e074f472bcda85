//! Filing parsing: contexts, facts, and the canonical signature index.
//!
//! One streaming pass over the XML builds two filing-scoped indexes:
//! contexts by id, and facts keyed by the canonical dimensional signature of
//! their context. Keying facts by signature rather than context id is what
//! lets the projector find every fact sharing a table's axis set with a
//! single lookup.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant as WallClock;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::constants::xml::{
    CONTEXT_ELEMENT, CONTEXT_REF_ATTR, DEADLINE_CHECK_INTERVAL, DIMENSION_ATTR, NON_FACT_ELEMENTS,
    PERIOD_DATE_FORMAT, ROOT_ELEMENT, XBRL_INSTANCE_NS,
};
use crate::errors::ExtractError;
use crate::taxonomy::{strip_prefix, PeriodType, TaxonomyModel};
use crate::types::{AxisName, ContextId, EntityId, FilingName, LexicalValue};

/// Reporting period of a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Period {
    /// A point in time.
    Instant(NaiveDate),
    /// A date range with `start <= end`.
    Duration {
        /// First day of the period.
        start: NaiveDate,
        /// Last day of the period.
        end: NaiveDate,
    },
}

impl Period {
    /// Period type discriminator of this period.
    pub fn period_type(&self) -> PeriodType {
        match self {
            Self::Instant(_) => PeriodType::Instant,
            Self::Duration { .. } => PeriodType::Duration,
        }
    }
}

/// Canonical dimensional signature: (axis, value) pairs sorted by axis name.
///
/// This is the map key used throughout fact indexing and table matching, so
/// equality and hashing always see one canonical ordering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionSignature(Vec<(AxisName, LexicalValue)>);

impl DimensionSignature {
    /// Build a signature, sorting pairs into canonical order.
    pub fn new(mut pairs: Vec<(AxisName, LexicalValue)>) -> Self {
        pairs.sort();
        Self(pairs)
    }

    /// Sorted (axis, value) pairs.
    pub fn pairs(&self) -> &[(AxisName, LexicalValue)] {
        &self.0
    }

    /// Sorted axis names.
    pub fn axis_names(&self) -> Vec<&str> {
        self.0.iter().map(|(axis, _)| axis.as_str()).collect()
    }

    /// Value reported for `axis`, if present.
    pub fn value_of(&self, axis: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, value)| value.as_str())
    }

    /// True when the signature carries no axes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A reporting slice: entity, period, and dimensional signature.
#[derive(Clone, Debug)]
pub struct Context {
    /// Filing-local context id.
    pub id: ContextId,
    /// Reporting entity identifier.
    pub entity_id: EntityId,
    /// Instant or duration period.
    pub period: Period,
    /// Canonical signature of the context's axes.
    pub signature: DimensionSignature,
}

/// A single reported data point.
#[derive(Clone, Debug)]
pub struct Fact {
    /// Concept name with the namespace prefix stripped.
    pub concept: String,
    /// Context the fact references.
    pub context_id: ContextId,
    /// Raw lexical value.
    pub value: LexicalValue,
    /// Position in document order, used for duplicate tie-breaks.
    pub document_order: usize,
}

/// A parsed filing: both indexes plus filing-scoped metadata.
#[derive(Debug)]
pub struct Instance {
    /// Name of the filing.
    pub filing_name: FilingName,
    /// Time the filing was published.
    pub publication_time: DateTime<Utc>,
    /// Contexts by id, in document order.
    pub contexts: IndexMap<ContextId, Context>,
    /// Facts grouped by the canonical signature of their context.
    pub facts: HashMap<DimensionSignature, Vec<Fact>>,
    /// Entity id of the first declared context.
    pub entity_id: Option<EntityId>,
    /// Count of elements whose concept the taxonomy does not know.
    pub skipped_concepts: u64,
    /// Total facts recorded.
    pub total_facts: usize,
}

impl Instance {
    /// Look up a context by id.
    pub fn context(&self, id: &str) -> Option<&Context> {
        self.contexts.get(id)
    }

    /// Facts sharing the given canonical signature.
    pub fn facts_for_signature(&self, signature: &DimensionSignature) -> &[Fact] {
        self.facts
            .get(signature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Streaming reader producing an `Instance` from one filing.
pub struct InstanceReader<'a> {
    model: &'a TaxonomyModel,
    deadline: Option<WallClock>,
}

struct PendingMember {
    axis: AxisName,
    typed: bool,
    value: String,
}

#[derive(Default)]
struct ContextDraft {
    id: ContextId,
    entity_id: Option<String>,
    dims: Vec<(AxisName, String)>,
    instant: Option<String>,
    start: Option<String>,
    end: Option<String>,
    member: Option<PendingMember>,
}

struct PendingFact {
    concept: String,
    context_id: ContextId,
    value: String,
    depth: usize,
}

impl<'a> InstanceReader<'a> {
    /// Create a reader bound to a taxonomy model.
    pub fn new(model: &'a TaxonomyModel) -> Self {
        Self {
            model,
            deadline: None,
        }
    }

    /// Abort parsing with `FilingTimeout` once `deadline` passes.
    pub fn with_deadline(mut self, deadline: WallClock) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Read a filing from a file on disk.
    pub fn read_path(
        &self,
        path: impl AsRef<Path>,
        filing_name: &str,
        publication_time: DateTime<Utc>,
    ) -> Result<Instance, ExtractError> {
        let bytes = std::fs::read(path).map_err(|err| ExtractError::FilingUnreadable {
            filing: filing_name.to_string(),
            details: err.to_string(),
        })?;
        self.read_bytes(&bytes, filing_name, publication_time)
    }

    /// Read a filing from raw bytes in a single streaming pass.
    pub fn read_bytes(
        &self,
        bytes: &[u8],
        filing_name: &str,
        publication_time: DateTime<Utc>,
    ) -> Result<Instance, ExtractError> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();

        let mut path: Vec<String> = Vec::new();
        let mut contexts: IndexMap<ContextId, Context> = IndexMap::new();
        let mut raw_facts: Vec<Fact> = Vec::new();
        let mut skipped_concepts = 0u64;
        let mut draft: Option<ContextDraft> = None;
        let mut fact: Option<PendingFact> = None;
        let mut events = 0usize;

        loop {
            if events % DEADLINE_CHECK_INTERVAL == 0 {
                if let Some(deadline) = self.deadline {
                    if WallClock::now() >= deadline {
                        return Err(ExtractError::FilingTimeout {
                            filing: filing_name.to_string(),
                        });
                    }
                }
            }
            events += 1;

            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref element)) => {
                    let name = decode_name(filing_name, element.name().as_ref())?;
                    let local = strip_prefix(&name).to_string();
                    if path.is_empty() {
                        if local != ROOT_ELEMENT {
                            return Err(malformed(
                                filing_name,
                                format!("unexpected root element '{name}'"),
                            ));
                        }
                        if !declares_instance_namespace(element) {
                            return Err(malformed(
                                filing_name,
                                "root element does not declare the XBRL instance namespace",
                            ));
                        }
                    }
                    self.on_element_open(
                        filing_name,
                        element,
                        &name,
                        &local,
                        &path,
                        &mut draft,
                        &mut fact,
                    )?;
                    path.push(local);
                }
                Ok(Event::Empty(ref element)) => {
                    // Self-closing elements never carry text; nil facts and
                    // empty members finalize immediately.
                    let name = decode_name(filing_name, element.name().as_ref())?;
                    let local = strip_prefix(&name).to_string();
                    self.on_element_open(
                        filing_name,
                        element,
                        &name,
                        &local,
                        &path,
                        &mut draft,
                        &mut fact,
                    )?;
                    path.push(local.clone());
                    self.on_element_close(
                        filing_name,
                        &local,
                        &mut path,
                        &mut contexts,
                        &mut raw_facts,
                        &mut skipped_concepts,
                        &mut draft,
                        &mut fact,
                    )?;
                }
                Ok(Event::Text(ref text)) => {
                    let value = text.unescape().map_err(|err| {
                        malformed(filing_name, format!("bad character data: {err}"))
                    })?;
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        if let Some(pending) = fact.as_mut() {
                            pending.value.push_str(trimmed);
                        } else if let Some(context) = draft.as_mut() {
                            if let Some(member) = context.member.as_mut() {
                                member.value.push_str(trimmed);
                            } else {
                                match path.last().map(String::as_str) {
                                    Some("identifier") => {
                                        context.entity_id = Some(trimmed.to_string())
                                    }
                                    Some("instant") => {
                                        context.instant = Some(trimmed.to_string())
                                    }
                                    Some("startDate") => {
                                        context.start = Some(trimmed.to_string())
                                    }
                                    Some("endDate") => context.end = Some(trimmed.to_string()),
                                    _ => {}
                                }
                            }
                        }
                    }
                }
                Ok(Event::End(ref element)) => {
                    let name = decode_name(filing_name, element.name().as_ref())?;
                    let local = strip_prefix(&name).to_string();
                    self.on_element_close(
                        filing_name,
                        &local,
                        &mut path,
                        &mut contexts,
                        &mut raw_facts,
                        &mut skipped_concepts,
                        &mut draft,
                        &mut fact,
                    )?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(malformed(
                        filing_name,
                        format!("xml error at byte {}: {err}", reader.buffer_position()),
                    ))
                }
            }
            buf.clear();
        }

        if !path.is_empty() {
            return Err(malformed(filing_name, "document truncated mid-element"));
        }

        self.finalize(filing_name, publication_time, contexts, raw_facts, skipped_concepts)
    }

    #[allow(clippy::too_many_arguments)]
    fn on_element_open(
        &self,
        filing_name: &str,
        element: &quick_xml::events::BytesStart<'_>,
        name: &str,
        local: &str,
        path: &[String],
        draft: &mut Option<ContextDraft>,
        fact: &mut Option<PendingFact>,
    ) -> Result<(), ExtractError> {
        if local == CONTEXT_ELEMENT && path.len() == 1 {
            let id = attribute(filing_name, element, "id")?.ok_or_else(|| {
                malformed(filing_name, "context element without an id attribute")
            })?;
            *draft = Some(ContextDraft {
                id,
                ..ContextDraft::default()
            });
            return Ok(());
        }

        if let Some(context) = draft.as_mut() {
            match local {
                "explicitMember" | "typedMember" => {
                    let dimension = attribute(filing_name, element, DIMENSION_ATTR)?
                        .ok_or_else(|| {
                            malformed(filing_name, "segment member without a dimension attribute")
                        })?;
                    let axis = strip_prefix(&dimension).to_string();
                    if local == "typedMember" && !self.model.axes.contains_key(&axis) {
                        return Err(malformed(
                            filing_name,
                            format!("typed axis '{axis}' is not declared by the taxonomy"),
                        ));
                    }
                    context.member = Some(PendingMember {
                        axis,
                        typed: local == "typedMember",
                        value: String::new(),
                    });
                }
                _ => {}
            }
            return Ok(());
        }

        // Candidate fact: a top-level element outside the bookkeeping set.
        if path.len() == 1 && !NON_FACT_ELEMENTS.contains(&local) {
            if let Some(context_id) = attribute(filing_name, element, CONTEXT_REF_ATTR)? {
                *fact = Some(PendingFact {
                    concept: strip_prefix(name).to_string(),
                    context_id,
                    value: String::new(),
                    depth: path.len(),
                });
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn on_element_close(
        &self,
        filing_name: &str,
        local: &str,
        path: &mut Vec<String>,
        contexts: &mut IndexMap<ContextId, Context>,
        raw_facts: &mut Vec<Fact>,
        skipped_concepts: &mut u64,
        draft: &mut Option<ContextDraft>,
        fact: &mut Option<PendingFact>,
    ) -> Result<(), ExtractError> {
        path.pop();

        if draft.is_some() {
            if local == "explicitMember" || local == "typedMember" {
                if let Some(context) = draft.as_mut() {
                    if let Some(member) = context.member.take() {
                        let axis = member.axis;
                        if context.dims.iter().any(|(existing, _)| *existing == axis) {
                            return Err(malformed(
                                filing_name,
                                format!("axis '{axis}' appears twice in context '{}'", context.id),
                            ));
                        }
                        // Explicit member values carry a namespace prefix;
                        // typed values are opaque and kept verbatim.
                        let trimmed = member.value.trim();
                        let value = if member.typed {
                            trimmed.to_string()
                        } else {
                            strip_prefix(trimmed).to_string()
                        };
                        context.dims.push((axis, value));
                    }
                }
            } else if local == CONTEXT_ELEMENT {
                if let Some(finished) = draft.take() {
                    let context = finish_context(filing_name, finished)?;
                    contexts.insert(context.id.clone(), context);
                }
            }
            return Ok(());
        }

        if fact.as_ref().is_some_and(|pending| path.len() == pending.depth) {
            if let Some(pending) = fact.take() {
                if !self.model.concepts.contains_key(&pending.concept) {
                    *skipped_concepts += 1;
                } else if !pending.value.trim().is_empty() {
                    raw_facts.push(Fact {
                        concept: pending.concept,
                        context_id: pending.context_id,
                        value: pending.value.trim().to_string(),
                        document_order: raw_facts.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn finalize(
        &self,
        filing_name: &str,
        publication_time: DateTime<Utc>,
        contexts: IndexMap<ContextId, Context>,
        raw_facts: Vec<Fact>,
        skipped_concepts: u64,
    ) -> Result<Instance, ExtractError> {
        let mut facts: HashMap<DimensionSignature, Vec<Fact>> = HashMap::new();
        let mut fact_ids: HashMap<(ContextId, String), u32> = HashMap::new();
        let total_facts = raw_facts.len();

        for fact in raw_facts {
            let context = contexts.get(&fact.context_id).ok_or_else(|| {
                malformed(
                    filing_name,
                    format!(
                        "fact '{}' references undeclared context '{}'",
                        fact.concept, fact.context_id
                    ),
                )
            })?;
            *fact_ids
                .entry((fact.context_id.clone(), fact.concept.clone()))
                .or_default() += 1;
            facts.entry(context.signature.clone()).or_default().push(fact);
        }

        let duplicated = fact_ids.values().filter(|count| **count > 1).count();
        if duplicated > 0 {
            debug!(filing = filing_name, duplicated, "filing repeats fact identifiers");
        }

        let entity_id = contexts.values().next().map(|c| c.entity_id.clone());
        Ok(Instance {
            filing_name: filing_name.to_string(),
            publication_time,
            contexts,
            facts,
            entity_id,
            skipped_concepts,
            total_facts,
        })
    }
}

fn finish_context(filing_name: &str, draft: ContextDraft) -> Result<Context, ExtractError> {
    let entity_id = draft
        .entity_id
        .ok_or_else(|| malformed(filing_name, format!("context '{}' has no entity", draft.id)))?;

    let period = match (draft.instant, draft.start, draft.end) {
        (Some(instant), None, None) => Period::Instant(parse_date(filing_name, &instant)?),
        (None, Some(start), Some(end)) => {
            let start = parse_date(filing_name, &start)?;
            let end = parse_date(filing_name, &end)?;
            if start > end {
                return Err(malformed(
                    filing_name,
                    format!("context '{}' period starts after it ends", draft.id),
                ));
            }
            Period::Duration { start, end }
        }
        _ => {
            return Err(malformed(
                filing_name,
                format!("context '{}' has no usable period", draft.id),
            ))
        }
    };

    Ok(Context {
        id: draft.id,
        entity_id,
        period,
        signature: DimensionSignature::new(draft.dims),
    })
}

fn parse_date(filing_name: &str, value: &str) -> Result<NaiveDate, ExtractError> {
    // Period values may carry a time suffix; the date prefix is what keys rows.
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, PERIOD_DATE_FORMAT)
        .map_err(|_| malformed(filing_name, format!("unparseable period date '{value}'")))
}

fn attribute(
    filing_name: &str,
    element: &quick_xml::events::BytesStart<'_>,
    name: &str,
) -> Result<Option<String>, ExtractError> {
    for attr in element.attributes() {
        let attr =
            attr.map_err(|err| malformed(filing_name, format!("bad attribute: {err}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| malformed(filing_name, format!("bad attribute name: {err}")))?;
        if strip_prefix(key) == name {
            let value = attr
                .unescape_value()
                .map_err(|err| malformed(filing_name, format!("bad attribute value: {err}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn declares_instance_namespace(element: &quick_xml::events::BytesStart<'_>) -> bool {
    element.attributes().flatten().any(|attr| {
        attr.key.as_ref().starts_with(b"xmlns")
            && attr.value.as_ref() == XBRL_INSTANCE_NS.as_bytes()
    })
}

fn decode_name(filing_name: &str, raw: &[u8]) -> Result<String, ExtractError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|err| malformed(filing_name, format!("bad element name: {err}")))
}

fn malformed(filing_name: &str, details: impl Into<String>) -> ExtractError {
    ExtractError::ContextMalformed {
        filing: filing_name.to_string(),
        details: details.into(),
    }
}
