//! Model-directed follow-up query planning.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, instrument, warn};

use dossier_llm::{CompletionRequest, LanguageModel};
use dossier_shared::{DossierError, EvidenceSet, Phase, Result, SearchQuery, Subject};

use crate::aggregate::format_evidence;

/// `1.`, `2)`, `-`, `*` or `•` at the start of a line, followed by whitespace
/// or the end of the line. `3.5 million` and `-site:` are not markers.
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])(?:\s+|$)").expect("valid regex"));

const SYSTEM_PROMPT: &str = "You are a research assistant planning web searches about a \
professional. You reply with search queries only, one per line, with no numbering, \
commentary or blank lines.";

/// Asks the language model for the next round of search queries.
pub struct FollowUpQueryPlanner {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
    temperature: f32,
}

impl FollowUpQueryPlanner {
    pub fn new(model: Arc<dyn LanguageModel>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model,
            max_tokens,
            temperature,
        }
    }

    /// Plan up to `count` queries for `phase`.
    ///
    /// Returns [`DossierError::RefinementSkipped`] when there is no evidence to
    /// refine from (no model call is made) or when the model call fails.
    #[instrument(skip_all, fields(phase = %phase, count = count, evidence = evidence.len()))]
    pub async fn plan(
        &self,
        subject: &Subject,
        evidence: &EvidenceSet,
        count: usize,
        phase: Phase,
        executed: &[SearchQuery],
    ) -> Result<Vec<SearchQuery>> {
        if evidence.is_empty() {
            return Err(DossierError::RefinementSkipped {
                phase,
                reason: "no evidence to refine from".into(),
            });
        }

        let prompt = build_prompt(subject, evidence, count, phase, executed);
        let request = CompletionRequest::new(SYSTEM_PROMPT, prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let text = self.model.complete(&request).await.map_err(|e| {
            DossierError::RefinementSkipped {
                phase,
                reason: format!("model call failed: {e}"),
            }
        })?;

        let mut queries = parse_queries(&text, phase);
        if queries.len() != count {
            warn!(
                requested = count,
                returned = queries.len(),
                "model returned a different number of queries than requested"
            );
        }
        queries.truncate(count);

        debug!(planned = queries.len(), "follow-up queries planned");
        Ok(queries)
    }
}

fn build_prompt(
    subject: &Subject,
    evidence: &EvidenceSet,
    count: usize,
    phase: Phase,
    executed: &[SearchQuery],
) -> String {
    let mut prompt = format!("Subject: {}\n", subject.name);
    if let Some(company) = &subject.company {
        prompt.push_str(&format!("Company: {company}\n"));
    }
    if let Some(role) = &subject.role {
        prompt.push_str(&format!("Role: {role}\n"));
    }

    prompt.push_str("\nSearch results gathered so far:\n\n");
    prompt.push_str(&format_evidence(evidence));

    match phase {
        Phase::Refined2 => {
            prompt.push_str("\nQueries already executed:\n");
            for q in executed {
                prompt.push_str(&format!("- {}\n", q.text));
            }
            prompt.push_str(&format!(
                "\nWrite exactly {count} new search queries that cover categories NOT already \
                 covered above. Look for gaps among achievements and awards, publications, \
                 speaking engagements, recent news and the subject's views on industry trends. \
                 Do not repeat or rephrase any executed query.\n"
            ));
        }
        _ => {
            prompt.push_str(&format!(
                "\nWrite exactly {count} new search queries that are more specific than the ones \
                 above. Focus on achievements, publications, speaking engagements, recent news \
                 and industry trends related to this person.\n"
            ));
        }
    }

    prompt.push_str(
        "Put the person's name in every query. Return one query per line and nothing else.",
    );
    prompt
}

/// Split model output into queries: one per non-blank line, list markers and
/// wrapping quotes removed.
pub fn parse_queries(text: &str, phase: Phase) -> Vec<SearchQuery> {
    text.lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .enumerate()
        .filter_map(|(i, line)| SearchQuery::new(line, phase, i + 1))
        .collect()
}

fn clean_line(line: &str) -> String {
    let stripped = LIST_MARKER.replace(line.trim(), "");
    let stripped = stripped.trim();

    for quote in ['"', '\'', '`'] {
        if let Some(inner) = stripped
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            if !inner.contains(quote) {
                return inner.trim().to_string();
            }
        }
    }
    stripped.to_string()
}
