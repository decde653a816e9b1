//! Core domain types for Dossier research runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DossierError, Result};

// ---------------------------------------------------------------------------
// ReportId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for research run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub Uuid);

impl ReportId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReportId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// The person being researched. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Full name. Never blank.
    pub name: String,
    /// Current or most relevant company.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Job title or role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Externally supplied profile URL. Always wins over discovered links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_identifier: Option<String>,
}

impl Subject {
    /// Create a subject from a name, rejecting blank input. Runs of
    /// whitespace in the name collapse to a single space.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = collapse_whitespace(&name.into());
        if name.is_empty() {
            return Err(DossierError::validation("subject name must not be empty"));
        }
        Ok(Self {
            name,
            company: None,
            role: None,
            known_identifier: None,
        })
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = non_blank(company.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = non_blank(role.into());
        self
    }

    pub fn with_known_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.known_identifier = non_blank(identifier.into());
        self
    }

    /// Check the subject invariants. Deserialized subjects bypass [`Subject::new`].
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DossierError::validation("subject name must not be empty"));
        }
        Ok(())
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Phase / SearchQuery
// ---------------------------------------------------------------------------

/// One round of search execution within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initial,
    Refined1,
    Refined2,
}

impl Phase {
    /// Human-readable heading used in prompts and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initial => "Initial search",
            Self::Refined1 => "Refined search (round 1)",
            Self::Refined2 => "Refined search (round 2)",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Refined1 => write!(f, "refined_1"),
            Self::Refined2 => write!(f, "refined_2"),
        }
    }
}

/// A single search query. `text` is never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub phase: Phase,
    /// 1-based position within its phase. Traceability only.
    pub index: usize,
}

impl SearchQuery {
    /// Build a query, returning `None` when the text is blank.
    pub fn new(text: impl Into<String>, phase: Phase, index: usize) -> Option<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return None;
        }
        Some(Self { text, phase, index })
    }
}

// ---------------------------------------------------------------------------
// SearchResultItem / EvidenceSet
// ---------------------------------------------------------------------------

/// A search hit, denormalized with the query that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    pub snippet: String,
    /// Usually a URL, but not guaranteed to be well-formed.
    pub link: String,
    pub source_query: String,
    pub phase: Phase,
    pub query_index: usize,
}

impl SearchResultItem {
    /// Attach provider fields to the query they came from.
    pub fn from_query(
        query: &SearchQuery,
        title: impl Into<String>,
        snippet: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            link: link.into(),
            source_query: query.text.clone(),
            phase: query.phase,
            query_index: query.index,
        }
    }
}

/// Ordered, append-only evidence gathered across phases.
///
/// Order is phase-major, then query-major, then provider order, and decides
/// how evidence is presented to the language model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceSet {
    items: Vec<SearchResultItem>,
}

impl EvidenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<SearchResultItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResultItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[SearchResultItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<SearchResultItem> {
        self.items
    }

    /// Number of items that originated in `phase`.
    pub fn count_for_phase(&self, phase: Phase) -> usize {
        self.items.iter().filter(|item| item.phase == phase).count()
    }
}

impl<'a> IntoIterator for &'a EvidenceSet {
    type Item = &'a SearchResultItem;
    type IntoIter = std::slice::Iter<'a, SearchResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Resource/quality policy selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// One search phase, shorter synthesis.
    #[default]
    Basic,
    /// Three search phases with model-directed refinement between them.
    Deep,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Deep => write!(f, "deep"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = DossierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "deep" => Ok(Self::Deep),
            other => Err(DossierError::validation(format!(
                "unknown tier '{other}': expected 'basic' or 'deep'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// States walked by the research orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    Phase1Search,
    Phase1Refine,
    Phase2Search,
    Phase2Refine,
    Phase3Search,
    Synthesize,
    Done,
    Aborted,
}

impl PipelineState {
    /// Search state for a phase.
    pub fn search(phase: Phase) -> Self {
        match phase {
            Phase::Initial => Self::Phase1Search,
            Phase::Refined1 => Self::Phase2Search,
            Phase::Refined2 => Self::Phase3Search,
        }
    }

    /// Refinement state that plans the queries of `phase`.
    pub fn refine_for(phase: Phase) -> Option<Self> {
        match phase {
            Phase::Initial => None,
            Phase::Refined1 => Some(Self::Phase1Refine),
            Phase::Refined2 => Some(Self::Phase2Refine),
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Phase1Search => "phase1_search",
            Self::Phase1Refine => "phase1_refine",
            Self::Phase2Search => "phase2_search",
            Self::Phase2Refine => "phase2_refine",
            Self::Phase3Search => "phase3_search",
            Self::Synthesize => "synthesize",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// ResearchReport
// ---------------------------------------------------------------------------

/// Per-phase bookkeeping attached to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    /// Queries handed to the executor for this phase.
    pub queries_planned: usize,
    /// Queries that returned a response (possibly with zero items).
    pub queries_succeeded: usize,
    /// Queries whose provider call failed.
    pub queries_failed: usize,
    /// Evidence items appended by this phase.
    pub items_gathered: usize,
    /// Why the phase had nothing to run, if that happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Terminal artifact of a research run. Ownership passes to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub id: ReportId,
    pub subject: Subject,
    pub tier: Tier,
    /// Sectioned markdown produced by the synthesis call.
    pub narrative_markdown: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_identifier: Option<String>,
    pub evidence_count: usize,
    /// Search phases that ran before the deadline. Never above the tier's phase count.
    pub phases_completed: usize,
    pub phases: Vec<PhaseSummary>,
    /// States the orchestrator walked, in order.
    pub path: Vec<PipelineState>,
    pub evidence: EvidenceSet,
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}
