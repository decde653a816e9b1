//! Final report synthesis.

use std::sync::Arc;

use tracing::{info, instrument};

use dossier_llm::{CompletionRequest, LanguageModel};
use dossier_shared::{DossierError, EvidenceSet, Result, Subject};

use crate::aggregate::format_evidence;
use crate::tier::TierPolicy;

const SYSTEM_PROMPT: &str = "You are a professional research analyst. You write factual, \
well-structured markdown dossiers about professionals using only the evidence provided. \
You never invent facts; when evidence is thin you say so.";

/// Turns gathered evidence into the sectioned markdown narrative.
pub struct ReportSynthesizer {
    model: Arc<dyn LanguageModel>,
}

impl ReportSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// One model call. Any failure, including a blank completion, is a
    /// [`DossierError::Synthesis`] carrying the evidence count.
    #[instrument(skip_all, fields(tier = %policy.tier, evidence = evidence.len()))]
    pub async fn synthesize(
        &self,
        subject: &Subject,
        evidence: &EvidenceSet,
        identifier: Option<&str>,
        policy: &TierPolicy,
    ) -> Result<String> {
        let request = CompletionRequest::new(
            SYSTEM_PROMPT,
            build_prompt(subject, evidence, identifier, policy.sections),
        )
        .with_max_tokens(policy.synthesis_max_tokens)
        .with_temperature(policy.synthesis_temperature);

        let text = self
            .model
            .complete(&request)
            .await
            .map_err(|e| DossierError::synthesis(evidence.len(), e.to_string()))?;

        let narrative = text.trim();
        if narrative.is_empty() {
            return Err(DossierError::synthesis(
                evidence.len(),
                "model returned an empty report",
            ));
        }

        info!(chars = narrative.len(), "report synthesized");
        Ok(narrative.to_string())
    }
}

fn build_prompt(
    subject: &Subject,
    evidence: &EvidenceSet,
    identifier: Option<&str>,
    sections: &[&str],
) -> String {
    let mut prompt = format!("Write a research dossier about {}", subject.name);
    match (&subject.role, &subject.company) {
        (Some(role), Some(company)) => prompt.push_str(&format!(", {role} at {company}")),
        (Some(role), None) => prompt.push_str(&format!(", {role}")),
        (None, Some(company)) => prompt.push_str(&format!(" of {company}")),
        (None, None) => {}
    }
    prompt.push_str(".\n\n");

    if let Some(identifier) = identifier {
        prompt.push_str(&format!("Profile URL: {identifier}\n\n"));
    }

    if evidence.is_empty() {
        prompt.push_str(
            "No search results were found. Under each section, state that little public \
             information was found. Do not speculate.\n\n",
        );
    } else {
        prompt.push_str(&format!("Evidence ({} search results):\n\n", evidence.len()));
        prompt.push_str(&format_evidence(evidence));
        prompt.push('\n');
    }

    prompt.push_str("Use exactly these markdown sections, in this order:\n");
    for section in sections {
        prompt.push_str(&format!("## {section}\n"));
    }
    prompt.push_str(
        "\nCite links inline where they support a statement. Skip nothing: if a section has no \
         supporting evidence, say so in one sentence.",
    );
    prompt
}
