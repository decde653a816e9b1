//! Canonical profile identifier resolution.

use url::Url;

use dossier_shared::{EvidenceSet, Subject};

/// Picks the subject's canonical profile URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentifierExtractor;

impl IdentifierExtractor {
    pub fn new() -> Self {
        Self
    }

    /// A supplied identifier always wins. Otherwise the first evidence link
    /// that is a profile URL and whose title names the subject.
    pub fn resolve(&self, subject: &Subject, evidence: &EvidenceSet) -> Option<String> {
        if let Some(known) = &subject.known_identifier {
            return Some(known.clone());
        }

        let name = normalize(&subject.name);
        evidence
            .iter()
            .find(|item| is_profile_url(&item.link) && normalize(&item.title).contains(&name))
            .map(|item| item.link.clone())
    }
}

/// Lowercase with whitespace runs collapsed, so `"Jane  Smith"` matches `"JANE SMITH"`.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `http(s)://[*.]linkedin.com/in/<handle>[/...]`.
pub fn is_profile_url(link: &str) -> bool {
    let Ok(url) = Url::parse(link.trim()) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    let host_matches = url
        .host_str()
        .map(|host| host == "linkedin.com" || host.ends_with(".linkedin.com"))
        .unwrap_or(false);
    if !host_matches {
        return false;
    }

    let mut segments = match url.path_segments() {
        Some(segments) => segments,
        None => return false,
    };
    segments.next() == Some("in") && segments.next().is_some_and(|handle| !handle.is_empty())
}
