//! Batch search execution with per-query failure isolation.
//!
//! A failing query (transport error, timeout, non-2xx, malformed payload) is
//! logged and contributes nothing; it never aborts the batch. Results always
//! come back in query order, whatever the concurrency.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use dossier_shared::{DossierError, SearchQuery, SearchResultItem};

use crate::provider::SearchProvider;
use crate::rate_limit::RateLimiter;

/// What happened to one query of a batch.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The provider answered; `hits` items were kept after capping.
    Succeeded { hits: usize },
    /// The provider call failed and the query was skipped. Always a
    /// [`DossierError::QueryExecution`].
    Failed { error: DossierError },
}

/// Result of running one batch of queries.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Items in query order, then provider order.
    pub items: Vec<SearchResultItem>,
    /// One entry per input query, in input order.
    pub outcomes: Vec<(SearchQuery, QueryOutcome)>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, QueryOutcome::Succeeded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Runs batches of queries against a [`SearchProvider`].
#[derive(Clone)]
pub struct SearchExecutor {
    provider: Arc<dyn SearchProvider>,
    limiter: Arc<dyn RateLimiter>,
    concurrency: usize,
}

impl SearchExecutor {
    /// Sequential executor (one request in flight).
    pub fn new(provider: Arc<dyn SearchProvider>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            provider,
            limiter,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` requests in flight. Values below 1 mean 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Execute `queries`, keeping at most `max_results` items per query.
    #[instrument(skip_all, fields(queries = queries.len(), max_results = max_results, concurrency = self.concurrency))]
    pub async fn execute(&self, queries: &[SearchQuery], max_results: usize) -> BatchOutcome {
        if queries.is_empty() {
            debug!("empty batch, nothing to search");
            return BatchOutcome::default();
        }

        let results = if self.concurrency <= 1 {
            let mut results = Vec::with_capacity(queries.len());
            for query in queries {
                let result = run_query(
                    self.provider.as_ref(),
                    self.limiter.as_ref(),
                    query,
                    max_results,
                )
                .await;
                results.push(result);
            }
            results
        } else {
            self.execute_pooled(queries, max_results).await
        };

        let mut batch = BatchOutcome::default();
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(items) => {
                    batch.outcomes.push((
                        query.clone(),
                        QueryOutcome::Succeeded { hits: items.len() },
                    ));
                    batch.items.extend(items);
                }
                Err(e) => {
                    let error = DossierError::QueryExecution {
                        query: query.text.clone(),
                        message: e.to_string(),
                    };
                    warn!(
                        phase = %query.phase,
                        index = query.index,
                        error = %error,
                        "search query failed, skipping"
                    );
                    batch
                        .outcomes
                        .push((query.clone(), QueryOutcome::Failed { error }));
                }
            }
        }

        info!(
            items = batch.items.len(),
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            "search batch complete"
        );

        batch
    }

    /// Spawn one task per query behind a semaphore, then put results back in
    /// input order. Dropping the returned future aborts every task in the set.
    async fn execute_pooled(
        &self,
        queries: &[SearchQuery],
        max_results: usize,
    ) -> Vec<Result<Vec<SearchResultItem>, DossierError>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (idx, query) in queries.iter().enumerate() {
            let provider = self.provider.clone();
            let limiter = self.limiter.clone();
            let sem = semaphore.clone();
            let query = query.clone();

            tasks.spawn(async move {
                let result = match sem.acquire_owned().await {
                    Ok(_permit) => {
                        run_query(provider.as_ref(), limiter.as_ref(), &query, max_results).await
                    }
                    Err(e) => Err(DossierError::Network(format!("worker pool closed: {e}"))),
                };
                (idx, result)
            });
        }

        let mut slots: Vec<Option<Result<Vec<SearchResultItem>, DossierError>>> =
            (0..queries.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => warn!(error = %e, "search task failed"),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(DossierError::Network("search task failed".into())))
            })
            .collect()
    }
}

/// Run one query through the limiter and provider.
async fn run_query(
    provider: &dyn SearchProvider,
    limiter: &dyn RateLimiter,
    query: &SearchQuery,
    max_results: usize,
) -> Result<Vec<SearchResultItem>, DossierError> {
    limiter.acquire().await;
    debug!(query = %query.text, provider = provider.name(), "executing search");

    let hits = provider.search(&query.text, max_results).await?;

    Ok(hits
        .into_iter()
        .take(max_results)
        .map(|hit| SearchResultItem::from_query(query, hit.title, hit.snippet, hit.link))
        .collect())
}
