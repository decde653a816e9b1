//! Evidence aggregation across phases, and evidence rendering for prompts.

use std::collections::HashSet;
use std::fmt::Write;

use tracing::debug;

use dossier_shared::{EvidenceSet, Phase, SearchResultItem};

/// Merges phase batches into one ordered evidence set.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultAggregator {
    dedup_by_link: bool,
}

impl ResultAggregator {
    pub fn new(dedup_by_link: bool) -> Self {
        Self { dedup_by_link }
    }

    /// `old ++ new`, order-preserving. With link dedup on, items whose link is
    /// already present (in `old` or earlier in `new`) are dropped.
    pub fn aggregate(&self, old: EvidenceSet, new: Vec<SearchResultItem>) -> EvidenceSet {
        let mut items = old.into_items();
        let incoming = new.len();

        if self.dedup_by_link {
            let mut seen: HashSet<String> = items.iter().map(|item| item.link.clone()).collect();
            for item in new {
                if seen.insert(item.link.clone()) {
                    items.push(item);
                }
            }
        } else {
            items.extend(new);
        }

        let merged = EvidenceSet::from_items(items);
        debug!(incoming, total = merged.len(), dedup = self.dedup_by_link, "evidence aggregated");
        merged
    }
}

/// Render evidence as a numbered text block grouped under phase headings.
///
/// Phase-major order is kept so the model sees how the picture developed.
pub fn format_evidence(evidence: &EvidenceSet) -> String {
    let mut out = String::new();
    let mut current: Option<Phase> = None;

    for (i, item) in evidence.iter().enumerate() {
        if current != Some(item.phase) {
            if current.is_some() {
                out.push('\n');
            }
            let _ = writeln!(out, "### {}", item.phase.label());
            current = Some(item.phase);
        }

        let _ = writeln!(out, "[{}] {}", i + 1, item.title.trim());
        if !item.snippet.trim().is_empty() {
            let _ = writeln!(out, "    {}", item.snippet.trim());
        }
        let _ = writeln!(out, "    Link: {}", item.link.trim());
        let _ = writeln!(out, "    Found via: {}", item.source_query);
    }

    out
}
