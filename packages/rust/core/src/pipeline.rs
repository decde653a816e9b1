//! End-to-end research pipeline.
//!
//! Walks `Init → Phase1Search → [Phase1Refine → Phase2Search → Phase2Refine →
//! Phase3Search] → Synthesize → Done` as the tier policy dictates. Only a
//! missing credential, an invalid subject or a failed synthesis call end a
//! run early; every other fault is logged and absorbed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use dossier_llm::{ChatCompletionsClient, LanguageModel};
use dossier_search::{
    FixedInterval, GoogleSearchProvider, RateLimiter, SearchExecutor, SearchProvider,
};
use dossier_shared::{
    DossierError, EvidenceSet, LanguageModelConfig, PhaseSummary, PipelineSettings,
    PipelineState, ReportId, ResearchReport, Result, SearchProviderConfig, SearchQuery, Subject,
    Tier,
};

use crate::aggregate::ResultAggregator;
use crate::identifier::IdentifierExtractor;
use crate::planner::FollowUpQueryPlanner;
use crate::synthesis::ReportSynthesizer;
use crate::templates::QueryTemplateGenerator;
use crate::tier::{PhasePlan, TierPolicy};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for long-running research runs.
pub trait ProgressReporter: Send + Sync {
    /// Called when the pipeline enters a new state.
    fn phase(&self, name: &str);
    /// Called after each search phase.
    fn phase_finished(&self, summary: &PhaseSummary);
    /// Called once with the finished report.
    fn done(&self, report: &ResearchReport);
    /// Called once when the run ends with a fatal error.
    fn aborted(&self, error: &DossierError);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn phase_finished(&self, _summary: &PhaseSummary) {}
    fn done(&self, _report: &ResearchReport) {}
    fn aborted(&self, _error: &DossierError) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Orchestrates one research run per call. Holds no state between runs.
pub struct ResearchPipeline {
    search: Arc<dyn SearchProvider>,
    model: Arc<dyn LanguageModel>,
    executor: SearchExecutor,
    dedup_by_link: bool,
    deadline_override: Option<Duration>,
}

impl ResearchPipeline {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        limiter: Arc<dyn RateLimiter>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            executor: SearchExecutor::new(search.clone(), limiter),
            search,
            model,
            dedup_by_link: false,
            deadline_override: None,
        }
    }

    /// Build the shipped clients from resolved configs.
    pub fn from_config(
        search: SearchProviderConfig,
        model: LanguageModelConfig,
        settings: &PipelineSettings,
    ) -> Result<Self> {
        let concurrency = search.concurrency;
        let limiter = Arc::new(FixedInterval::from_millis(search.request_interval_ms));
        let provider = Arc::new(GoogleSearchProvider::new(search)?);
        let model = Arc::new(ChatCompletionsClient::new(model)?);

        Ok(Self::new(provider, limiter, model)
            .with_concurrency(concurrency)
            .with_dedup_by_link(settings.dedup_by_link))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.executor = self.executor.with_concurrency(concurrency);
        self
    }

    pub fn with_dedup_by_link(mut self, dedup_by_link: bool) -> Self {
        self.dedup_by_link = dedup_by_link;
        self
    }

    /// Replace the tier's gathering deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_override = Some(deadline);
        self
    }

    /// The policy a run at `tier` will use.
    pub fn policy(&self, tier: Tier) -> TierPolicy {
        let policy = TierPolicy::for_tier(tier).with_dedup_by_link(self.dedup_by_link);
        match self.deadline_override {
            Some(deadline) => policy.with_deadline(deadline),
            None => policy,
        }
    }

    pub async fn research(&self, subject: &Subject, tier: Tier) -> Result<ResearchReport> {
        self.research_with_progress(subject, tier, &SilentProgress)
            .await
    }

    /// Run the full pipeline, reporting progress along the way.
    #[instrument(skip_all, fields(subject = %subject.name, tier = %tier))]
    pub async fn research_with_progress(
        &self,
        subject: &Subject,
        tier: Tier,
        progress: &dyn ProgressReporter,
    ) -> Result<ResearchReport> {
        let result = self.run(subject, tier, progress).await;
        if let Err(e) = &result {
            error!(state = %PipelineState::Aborted, error = %e, "research run aborted");
            progress.aborted(e);
        }
        result
    }

    async fn run(
        &self,
        subject: &Subject,
        tier: Tier,
        progress: &dyn ProgressReporter,
    ) -> Result<ResearchReport> {
        let start = Instant::now();
        let policy = self.policy(tier);
        let deadline = start + policy.deadline;
        let mut path = vec![PipelineState::Init];

        // --- Init: preconditions, before any network call ---
        progress.phase("Checking configuration");
        subject.validate()?;
        self.search.ensure_configured()?;
        self.model.ensure_configured()?;

        let aggregator = ResultAggregator::new(policy.dedup_by_link);
        let planner = FollowUpQueryPlanner::new(
            self.model.clone(),
            policy.refinement_max_tokens,
            policy.refinement_temperature,
        );

        let mut evidence = EvidenceSet::new();
        let mut summaries: Vec<PhaseSummary> = Vec::with_capacity(policy.phase_count());
        let mut executed: Vec<SearchQuery> = Vec::new();

        // --- Search phases ---
        for plan in &policy.phases {
            if Instant::now() >= deadline {
                warn!(phase = %plan.phase, "deadline reached, moving to synthesis");
                break;
            }

            let (queries, skipped) = match PipelineState::refine_for(plan.phase) {
                None => (self.initial_queries(subject, plan), None),
                Some(refine_state) => {
                    path.push(refine_state);
                    progress.phase(&format!("Planning {}", plan.phase.label().to_lowercase()));
                    let previous_yield = summaries.last().map_or(0, |s| s.items_gathered);
                    self.refine(&planner, subject, &evidence, plan, previous_yield, &executed)
                        .await
                }
            };

            if Instant::now() >= deadline {
                warn!(phase = %plan.phase, "deadline reached after refinement, moving to synthesis");
                break;
            }

            path.push(PipelineState::search(plan.phase));
            progress.phase(plan.phase.label());

            let batch = self
                .executor
                .execute(&queries, policy.results_per_query)
                .await;
            let (succeeded, failed) = (batch.succeeded(), batch.failed());
            let before = evidence.len();
            evidence = aggregator.aggregate(evidence, batch.items);

            let summary = PhaseSummary {
                phase: plan.phase,
                queries_planned: queries.len(),
                queries_succeeded: succeeded,
                queries_failed: failed,
                items_gathered: evidence.len() - before,
                skipped,
            };
            info!(
                phase = %summary.phase,
                queries = summary.queries_planned,
                failed = summary.queries_failed,
                items = summary.items_gathered,
                total = evidence.len(),
                "search phase complete"
            );
            progress.phase_finished(&summary);
            summaries.push(summary);
            executed.extend(queries);
        }

        // --- Synthesis ---
        path.push(PipelineState::Synthesize);
        progress.phase("Synthesizing report");

        let resolved_identifier = IdentifierExtractor::new().resolve(subject, &evidence);
        debug!(identifier = ?resolved_identifier, "identifier resolved");

        let narrative = ReportSynthesizer::new(self.model.clone())
            .synthesize(subject, &evidence, resolved_identifier.as_deref(), &policy)
            .await?;

        path.push(PipelineState::Done);

        let report = ResearchReport {
            id: ReportId::new(),
            subject: subject.clone(),
            tier,
            narrative_markdown: narrative,
            resolved_identifier,
            evidence_count: evidence.len(),
            phases_completed: summaries.len(),
            phases: summaries,
            path,
            evidence,
            generated_at: Utc::now(),
            elapsed_ms: millis(start.elapsed()),
        };

        info!(
            id = %report.id,
            evidence = report.evidence_count,
            phases = report.phases_completed,
            elapsed_ms = report.elapsed_ms,
            "research complete"
        );
        progress.done(&report);

        Ok(report)
    }

    /// Template queries, truncated to the phase budget.
    fn initial_queries(&self, subject: &Subject, plan: &PhasePlan) -> Vec<SearchQuery> {
        let mut queries = QueryTemplateGenerator::new().generate(subject);
        queries.truncate(plan.query_budget);
        queries
    }

    /// Plan a refined phase. Never fails: a skip yields zero queries and a reason.
    async fn refine(
        &self,
        planner: &FollowUpQueryPlanner,
        subject: &Subject,
        evidence: &EvidenceSet,
        plan: &PhasePlan,
        previous_yield: usize,
        executed: &[SearchQuery],
    ) -> (Vec<SearchQuery>, Option<String>) {
        if previous_yield == 0 {
            let reason = "previous phase gathered no evidence".to_string();
            info!(phase = %plan.phase, %reason, "refinement skipped");
            return (Vec::new(), Some(reason));
        }

        match planner
            .plan(subject, evidence, plan.query_budget, plan.phase, executed)
            .await
        {
            Ok(queries) => (queries, None),
            Err(DossierError::RefinementSkipped { reason, .. }) => {
                warn!(phase = %plan.phase, %reason, "refinement skipped");
                (Vec::new(), Some(reason))
            }
            Err(e) => {
                warn!(phase = %plan.phase, error = %e, "refinement failed");
                (Vec::new(), Some(e.to_string()))
            }
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use dossier_search::{SearchHit, Unthrottled};
    use dossier_shared::Phase;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::testing::{FakeModel, FakeSearch};

    fn jane() -> Subject {
        Subject::new("Jane Smith").unwrap().with_company("Acme Corp")
    }

    /// Refinement calls run hotter than synthesis; answer by temperature.
    fn refine_then_report(refinement: &'static str, report: &'static str) -> FakeModel {
        FakeModel::new(move |req, _| {
            if req.temperature > 0.5 {
                Ok(refinement.to_string())
            } else {
                Ok(report.to_string())
            }
        })
    }

    fn pipeline(search: Arc<FakeSearch>, model: Arc<FakeModel>) -> ResearchPipeline {
        ResearchPipeline::new(search, Arc::new(Unthrottled), model)
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        summaries: Mutex<Vec<PhaseSummary>>,
        done: Mutex<bool>,
        aborted: Mutex<Option<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn phase_finished(&self, summary: &PhaseSummary) {
            self.summaries.lock().unwrap().push(summary.clone());
        }
        fn done(&self, _report: &ResearchReport) {
            *self.done.lock().unwrap() = true;
        }
        fn aborted(&self, error: &DossierError) {
            *self.aborted.lock().unwrap() = Some(error.to_string());
        }
    }

    #[test]
    fn elapsed_millis_saturate() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn deep_run_gathers_three_phases() {
        let search = Arc::new(FakeSearch::new(2));
        let model = Arc::new(refine_then_report(
            "Jane Smith keynote\nJane Smith award\nJane Smith patent\nJane Smith podcast",
            "## Professional Background\nJane Smith leads engineering at Acme Corp.",
        ));

        let report = pipeline(search.clone(), model.clone())
            .research(&jane(), Tier::Deep)
            .await
            .unwrap();

        assert_eq!(report.phases_completed, 3);
        assert_eq!(report.evidence_count, 24);
        assert_eq!(report.evidence.len(), 24);
        assert!(report.resolved_identifier.is_none());
        assert!(!report.narrative_markdown.is_empty());
        assert_eq!(
            report.path,
            vec![
                PipelineState::Init,
                PipelineState::Phase1Search,
                PipelineState::Phase1Refine,
                PipelineState::Phase2Search,
                PipelineState::Phase2Refine,
                PipelineState::Phase3Search,
                PipelineState::Synthesize,
                PipelineState::Done,
            ]
        );

        // Phase-major, then query-major ordering.
        let order: Vec<(Phase, usize)> = report
            .evidence
            .iter()
            .map(|i| (i.phase, i.query_index))
            .collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
        assert_eq!(report.evidence.count_for_phase(Phase::Refined2), 8);

        assert_eq!(search.call_count(), 12);
        // Two refinements plus one synthesis.
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn basic_run_uses_first_three_templates() {
        let search = Arc::new(FakeSearch::new(5));
        let model = Arc::new(FakeModel::fixed("## Professional Background\nShort report."));

        let report = pipeline(search.clone(), model.clone())
            .research(&jane(), Tier::Basic)
            .await
            .unwrap();

        assert_eq!(report.phases_completed, 1);
        // Three queries, capped at three results each.
        assert_eq!(report.evidence_count, 9);
        assert_eq!(
            report.path,
            vec![
                PipelineState::Init,
                PipelineState::Phase1Search,
                PipelineState::Synthesize,
                PipelineState::Done,
            ]
        );
        let calls = search.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].starts_with("site:linkedin.com/in"));
        assert!(!calls.iter().any(|q| q.contains("career experience")));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn basic_run_with_zero_results_still_reports() {
        let search = Arc::new(FakeSearch::new(0));
        let model = Arc::new(FakeModel::fixed("Little public information was found."));

        let report = pipeline(search, model)
            .research(&Subject::new("Jane Smith").unwrap(), Tier::Basic)
            .await
            .unwrap();

        assert_eq!(report.evidence_count, 0);
        assert!(!report.narrative_markdown.is_empty());
        assert_eq!(report.path.last(), Some(&PipelineState::Done));
    }

    #[tokio::test]
    async fn deep_run_with_empty_first_phase_skips_refinement() {
        let search = Arc::new(FakeSearch::new(0));
        let model = Arc::new(refine_then_report("should not be used", "Thin report."));

        let report = pipeline(search.clone(), model.clone())
            .research(&jane(), Tier::Deep)
            .await
            .unwrap();

        // Refined phases ran as no-ops.
        assert_eq!(report.phases_completed, 3);
        assert_eq!(report.evidence_count, 0);
        assert_eq!(search.call_count(), 4);
        assert_eq!(model.call_count(), 1);
        assert!(report.phases[1].skipped.is_some());
        assert_eq!(report.phases[1].queries_planned, 0);
        assert_eq!(report.path.last(), Some(&PipelineState::Done));
    }

    #[tokio::test]
    async fn failing_query_contributes_nothing() {
        let subject = Subject::new("Jane Smith").unwrap();
        let templates = QueryTemplateGenerator::new().generate(&subject);
        let search = Arc::new(FakeSearch::new(2).failing_on(&templates[1].text));
        let model = Arc::new(FakeModel::fixed("report"));

        let report = pipeline(search, model)
            .research(&subject, Tier::Basic)
            .await
            .unwrap();

        assert_eq!(report.evidence_count, 4);
        assert!(report.evidence.iter().all(|i| i.query_index != 2));
        assert_eq!(report.phases[0].queries_failed, 1);
        assert_eq!(report.phases[0].queries_succeeded, 2);
    }

    #[tokio::test]
    async fn refinement_failure_is_absorbed() {
        let search = Arc::new(FakeSearch::new(1));
        let model = Arc::new(FakeModel::new(|req, _| {
            if req.temperature > 0.5 {
                Err(DossierError::Network("connection reset".into()))
            } else {
                Ok("report".into())
            }
        }));

        let report = pipeline(search.clone(), model)
            .research(&jane(), Tier::Deep)
            .await
            .unwrap();

        assert_eq!(report.evidence_count, 4);
        assert_eq!(search.call_count(), 4);
        assert!(
            report.phases[1]
                .skipped
                .as_deref()
                .unwrap()
                .contains("connection reset")
        );
    }

    #[tokio::test]
    async fn discovered_identifier_is_resolved() {
        let search = Arc::new(FakeSearch::new(1).with_hits(|query, call| {
            if query.starts_with("site:linkedin.com/in") {
                vec![SearchHit {
                    title: "Jane Smith - CTO - Acme Corp | LinkedIn".into(),
                    snippet: "Experience: Acme Corp".into(),
                    link: "https://www.linkedin.com/in/janesmith".into(),
                }]
            } else {
                vec![SearchHit {
                    title: format!("Article {call}"),
                    snippet: String::new(),
                    link: format!("https://news.example.com/{call}"),
                }]
            }
        }));
        let model = Arc::new(FakeModel::fixed("report"));

        let report = pipeline(search, model)
            .research(&jane(), Tier::Basic)
            .await
            .unwrap();

        assert_eq!(
            report.resolved_identifier.as_deref(),
            Some("https://www.linkedin.com/in/janesmith")
        );
    }

    #[tokio::test]
    async fn synthesis_failure_reports_evidence_count() {
        let search = Arc::new(FakeSearch::new(2));
        let model = Arc::new(FakeModel::failing());
        let progress = RecordingProgress::default();

        let err = pipeline(search, model)
            .research_with_progress(&jane(), Tier::Basic, &progress)
            .await
            .unwrap_err();

        assert!(matches!(err, DossierError::Synthesis { .. }));
        assert_eq!(err.evidence_count(), Some(6));
        assert!(progress.aborted.lock().unwrap().is_some());
        assert!(!*progress.done.lock().unwrap());
    }

    #[tokio::test]
    async fn unconfigured_provider_fails_before_searching() {
        let search = Arc::new(FakeSearch::new(2).unconfigured());
        let model = Arc::new(FakeModel::fixed("report"));

        let err = pipeline(search.clone(), model.clone())
            .research(&jane(), Tier::Deep)
            .await
            .unwrap_err();

        assert!(matches!(err, DossierError::Config { .. }));
        assert_eq!(search.call_count(), 0);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn unconfigured_model_fails_before_searching() {
        let search = Arc::new(FakeSearch::new(2));
        let model = Arc::new(FakeModel::fixed("report").unconfigured());

        let err = pipeline(search.clone(), model)
            .research(&jane(), Tier::Basic)
            .await
            .unwrap_err();

        assert!(matches!(err, DossierError::Config { .. }));
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_credentials_make_no_network_calls() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let search = SearchProviderConfig {
            endpoint: format!("{}/customsearch/v1", server.uri()),
            api_key: String::new(),
            engine_id: "cx".into(),
            timeout_secs: 5,
            request_interval_ms: 0,
            concurrency: 1,
        };
        let model = LanguageModelConfig {
            api_base: server.uri(),
            api_key: "sk-test".into(),
            model: "test/model".into(),
            timeout_secs: 5,
            retry_attempts: 0,
            retry_delay_ms: 0,
        };

        let pipeline =
            ResearchPipeline::from_config(search, model, &PipelineSettings::default()).unwrap();
        let err = pipeline.research(&jane(), Tier::Basic).await.unwrap_err();

        assert!(matches!(err, DossierError::Config { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn blank_subject_is_rejected_at_init() {
        let search = Arc::new(FakeSearch::new(2));
        let model = Arc::new(FakeModel::fixed("report"));
        let subject = Subject {
            name: "   ".into(),
            company: None,
            role: None,
            known_identifier: None,
        };

        let err = pipeline(search.clone(), model)
            .research(&subject, Tier::Basic)
            .await
            .unwrap_err();

        assert!(matches!(err, DossierError::Validation { .. }));
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn expired_deadline_goes_straight_to_synthesis() {
        let search = Arc::new(FakeSearch::new(2));
        let model = Arc::new(FakeModel::fixed("report"));

        let report = pipeline(search.clone(), model.clone())
            .with_deadline(Duration::ZERO)
            .research(&jane(), Tier::Deep)
            .await
            .unwrap();

        assert_eq!(report.phases_completed, 0);
        assert_eq!(report.evidence_count, 0);
        assert_eq!(search.call_count(), 0);
        assert_eq!(
            report.path,
            vec![
                PipelineState::Init,
                PipelineState::Synthesize,
                PipelineState::Done
            ]
        );
    }

    #[tokio::test]
    async fn dedup_by_link_drops_repeated_links() {
        let search = Arc::new(FakeSearch::new(1).with_hits(|_, _| {
            vec![SearchHit {
                title: "Same page".into(),
                snippet: String::new(),
                link: "https://news.example.com/same".into(),
            }]
        }));
        let model = Arc::new(FakeModel::fixed("report"));

        let report = pipeline(search, model)
            .with_dedup_by_link(true)
            .research(&jane(), Tier::Basic)
            .await
            .unwrap();

        assert_eq!(report.evidence_count, 1);
    }

    #[tokio::test]
    async fn progress_sees_every_phase() {
        let search = Arc::new(FakeSearch::new(1));
        let model = Arc::new(refine_then_report("Jane Smith keynote", "report"));
        let progress = RecordingProgress::default();

        pipeline(search, model)
            .research_with_progress(&jane(), Tier::Deep, &progress)
            .await
            .unwrap();

        assert_eq!(progress.summaries.lock().unwrap().len(), 3);
        assert!(*progress.done.lock().unwrap());
        let phases = progress.phases.lock().unwrap();
        assert_eq!(phases.first().map(String::as_str), Some("Checking configuration"));
        assert_eq!(phases.last().map(String::as_str), Some("Synthesizing report"));
    }
}
