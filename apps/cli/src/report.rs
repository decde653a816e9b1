//! Report rendering and persistence.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use dossier_shared::{DossierError, ResearchReport, Result};

/// JSON file layout: the report plus a hash of its narrative.
#[derive(Serialize)]
struct StoredReport<'a> {
    content_hash: String,
    #[serde(flatten)]
    report: &'a ResearchReport,
}

/// Paths written by [`write_report`].
#[derive(Debug)]
pub(crate) struct WrittenReport {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// Lowercase ASCII slug of a subject name (`"Jane Smith"` → `"jane-smith"`).
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "subject".to_string()
    } else {
        slug.to_string()
    }
}

/// SHA-256 of the narrative, hex encoded.
pub(crate) fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Markdown document: title, run metadata, narrative, then sources.
pub(crate) fn render_markdown(report: &ResearchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Dossier: {}", report.subject.name);
    let _ = writeln!(out);

    let mut meta = vec![
        format!("tier: {}", report.tier),
        format!("generated: {}", report.generated_at.format("%Y-%m-%d %H:%M UTC")),
        format!("sources: {}", report.evidence_count),
    ];
    if let Some(company) = &report.subject.company {
        meta.insert(0, format!("company: {company}"));
    }
    let _ = writeln!(out, "_{}_", meta.join(" · "));
    if let Some(identifier) = &report.resolved_identifier {
        let _ = writeln!(out);
        let _ = writeln!(out, "Profile: <{identifier}>");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", report.narrative_markdown.trim());

    if !report.evidence.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Sources");
        let _ = writeln!(out);
        for item in &report.evidence {
            let title = if item.title.trim().is_empty() {
                item.link.as_str()
            } else {
                item.title.trim()
            };
            let _ = writeln!(out, "- [{title}]({})", item.link.trim());
        }
    }

    out
}

/// Full report as pretty JSON, with the narrative hash.
pub(crate) fn render_json(report: &ResearchReport) -> Result<String> {
    let stored = StoredReport {
        content_hash: content_hash(&report.narrative_markdown),
        report,
    };
    serde_json::to_string_pretty(&stored)
        .map_err(|e| DossierError::InvalidResponse(format!("failed to encode report: {e}")))
}

/// Write `<slug>-<run-id>.md` and `<slug>-<run-id>.json` into `dir`.
pub(crate) fn write_report(dir: &Path, report: &ResearchReport) -> Result<WrittenReport> {
    std::fs::create_dir_all(dir).map_err(|e| DossierError::io(dir, e))?;

    let stem = format!("{}-{}", slugify(&report.subject.name), report.id);
    let markdown = dir.join(format!("{stem}.md"));
    let json = dir.join(format!("{stem}.json"));

    std::fs::write(&markdown, render_markdown(report))
        .map_err(|e| DossierError::io(&markdown, e))?;
    std::fs::write(&json, render_json(report)?).map_err(|e| DossierError::io(&json, e))?;

    Ok(WrittenReport { markdown, json })
}
