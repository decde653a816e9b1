//! First-round query templates.

use dossier_shared::{Phase, SearchQuery, Subject};

/// Builds the fixed, deterministic first-round queries from a subject.
///
/// Always emits the full canonical set in this order: profile, background,
/// education, career. Tier truncation happens in the pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryTemplateGenerator;

impl QueryTemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, subject: &Subject) -> Vec<SearchQuery> {
        let quoted = format!("\"{}\"", subject.name.trim());
        let name = Some(quoted.as_str());
        let company = subject.company.as_deref();
        let role = subject.role.as_deref();

        let templates: [Vec<Option<&str>>; 4] = [
            vec![Some("site:linkedin.com/in"), name, company, role],
            vec![name, company, role, Some("professional background")],
            vec![name, company, Some("education university degree")],
            vec![name, role, company, Some("career experience")],
        ];

        templates
            .iter()
            .enumerate()
            .filter_map(|(i, parts)| SearchQuery::new(join_parts(parts), Phase::Initial, i + 1))
            .collect()
    }
}

/// Join the present fragments with single spaces.
fn join_parts(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_only_subject_has_no_placeholders() {
        let subject = Subject::new("Jane Smith").unwrap();
        let queries = QueryTemplateGenerator::new().generate(&subject);

        assert_eq!(queries.len(), 4);
        for q in &queries {
            let lower = q.text.to_lowercase();
            assert!(!lower.contains("undefined"), "{}", q.text);
            assert!(!lower.contains("null"), "{}", q.text);
            assert!(!q.text.contains("  "), "double space in {}", q.text);
            assert_eq!(q.text, q.text.trim());
            assert_eq!(q.phase, Phase::Initial);
        }
        assert_eq!(queries[0].text, "site:linkedin.com/in \"Jane Smith\"");
    }

    #[test]
    fn company_and_role_are_included_when_present() {
        let subject = Subject::new("Jane Smith")
            .unwrap()
            .with_company("Acme   Corp")
            .with_role("CTO");
        let queries = QueryTemplateGenerator::new().generate(&subject);

        assert_eq!(
            queries.iter().map(|q| q.text.as_str()).collect::<Vec<_>>(),
            vec![
                "site:linkedin.com/in \"Jane Smith\" Acme Corp CTO",
                "\"Jane Smith\" Acme Corp CTO professional background",
                "\"Jane Smith\" Acme Corp education university degree",
                "\"Jane Smith\" CTO Acme Corp career experience",
            ]
        );
    }

    #[test]
    fn indices_are_one_based_and_ordered() {
        let subject = Subject::new("Jane Smith").unwrap().with_company("Acme Corp");
        let queries = QueryTemplateGenerator::new().generate(&subject);
        let indices: Vec<usize> = queries.iter().map(|q| q.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn generation_is_deterministic() {
        let subject = Subject::new("Jane Smith").unwrap().with_role("Engineer");
        let generator = QueryTemplateGenerator::new();
        assert_eq!(generator.generate(&subject), generator.generate(&subject));
    }
}
