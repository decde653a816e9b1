//! In-process fakes for pipeline tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use dossier_llm::{CompletionRequest, LanguageModel};
use dossier_search::{SearchHit, SearchProvider};
use dossier_shared::{DossierError, Result};

/// Returns `per_query` hits for each query; listed queries fail with HTTP 500.
pub struct FakeSearch {
    pub per_query: usize,
    pub failing: HashSet<String>,
    pub configured: bool,
    pub calls: Mutex<Vec<String>>,
    counter: AtomicUsize,
    hits: Option<Box<dyn Fn(&str, usize) -> Vec<SearchHit> + Send + Sync>>,
}

impl FakeSearch {
    pub fn new(per_query: usize) -> Self {
        Self {
            per_query,
            failing: HashSet::new(),
            configured: true,
            calls: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
            hits: None,
        }
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    /// Replace generated hits with a custom function of (query, call number).
    pub fn with_hits(
        mut self,
        hits: impl Fn(&str, usize) -> Vec<SearchHit> + Send + Sync + 'static,
    ) -> Self {
        self.hits = Some(Box::new(hits));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    fn name(&self) -> &str {
        "fake"
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.configured {
            Ok(())
        } else {
            Err(DossierError::config("search API key is not set"))
        }
    }

    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>> {
        self.calls.lock().unwrap().push(query.to_string());
        let call = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        if self.failing.contains(query) {
            return Err(DossierError::Provider {
                status: 500,
                message: "internal error".into(),
            });
        }

        if let Some(hits) = &self.hits {
            return Ok(hits(query, call));
        }

        Ok((1..=self.per_query)
            .map(|n| SearchHit {
                title: format!("Result {n} for call {call}"),
                snippet: format!("Snippet {n} about {query}"),
                link: format!("https://news.example.com/{call}/{n}"),
            })
            .collect())
    }
}

type Responder = Box<dyn Fn(&CompletionRequest, usize) -> Result<String> + Send + Sync>;

/// Language model answering through a closure of (request, call number).
pub struct FakeModel {
    pub configured: bool,
    pub requests: Mutex<Vec<CompletionRequest>>,
    respond: Responder,
}

impl FakeModel {
    pub fn new(
        respond: impl Fn(&CompletionRequest, usize) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            configured: true,
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Always answers `text`.
    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    /// Always fails with HTTP 503.
    pub fn failing() -> Self {
        Self::new(|_, _| {
            Err(DossierError::Provider {
                status: 503,
                message: "model unavailable".into(),
            })
        })
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn name(&self) -> &str {
        "fake-model"
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.configured {
            Ok(())
        } else {
            Err(DossierError::config("language model API key is not set"))
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        (self.respond)(request, call)
    }
}
