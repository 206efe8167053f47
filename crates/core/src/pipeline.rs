use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::daterange::DateRangeValidator;
use crate::domain::{DateRange, OrderItem, RawMessage, ReportPayload};
use crate::errors::{FetchError, RequestError};
use crate::report::RenderReport;

/// Retrieves channel messages posted within the range, already filtered of
/// bot-authored and empty messages, in chronological order.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    async fn fetch(&self, range: &DateRange) -> Result<Vec<RawMessage>, FetchError>;
}

/// Turns one message into zero or more order items. Never fails for content
/// reasons; a message the extractor cannot handle contributes nothing.
#[async_trait]
pub trait OrderExtractor: Send + Sync {
    async fn extract(&self, message: RawMessage) -> Vec<OrderItem>;
}

#[derive(Clone, Debug)]
pub struct PipelineLimits {
    /// Maximum concurrent model calls during extraction.
    pub extract_concurrency: usize,
    /// Global deadline for the extraction stage. On expiry, outstanding
    /// calls are abandoned and the report is built from completed results.
    pub deadline: Duration,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self { extract_concurrency: 4, deadline: Duration::from_secs(120) }
    }
}

/// Single discriminated outcome of one report request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    Success(ReportPayload),
    Empty(DateRange),
    Failed(RequestError),
}

/// Drives one request end to end: validate date, fetch history, extract,
/// aggregate, render. Stage failures are not retried here; retries live
/// inside the fetcher and extractor.
pub struct ReportPipeline {
    validator: DateRangeValidator,
    fetcher: Arc<dyn HistoryFetcher>,
    extractor: Arc<dyn OrderExtractor>,
    renderer: Arc<dyn RenderReport>,
    limits: PipelineLimits,
}

impl ReportPipeline {
    pub fn new(
        validator: DateRangeValidator,
        fetcher: Arc<dyn HistoryFetcher>,
        extractor: Arc<dyn OrderExtractor>,
        renderer: Arc<dyn RenderReport>,
        limits: PipelineLimits,
    ) -> Self {
        Self { validator, fetcher, extractor, renderer, limits }
    }

    pub async fn run(&self, raw_date: &str) -> RequestOutcome {
        let range = match self.validator.validate(raw_date) {
            Ok(range) => range,
            Err(error) => return RequestOutcome::Failed(RequestError::Date(error)),
        };
        self.run_for_range(range).await
    }

    pub async fn run_for_range(&self, range: DateRange) -> RequestOutcome {
        let messages = match self.fetcher.fetch(&range).await {
            Ok(messages) => messages,
            Err(error) => return RequestOutcome::Failed(RequestError::Fetch(error)),
        };
        info!(message_count = messages.len(), start = %range.start, "channel history fetched");

        let items = self.extract_all(messages).await;
        let rows = aggregate(items);
        if rows.is_empty() {
            return RequestOutcome::Empty(range);
        }

        match self.renderer.render(&rows, &range) {
            Ok(payload) => {
                info!(row_count = payload.row_count, filename = %payload.filename, "report rendered");
                RequestOutcome::Success(payload)
            }
            Err(error) => RequestOutcome::Failed(RequestError::Render(error)),
        }
    }

    /// Dispatches per-message extraction with bounded concurrency and a
    /// global deadline. Messages are independent, so completion order does
    /// not matter; aggregation re-sorts deterministically afterwards.
    async fn extract_all(&self, messages: Vec<RawMessage>) -> Vec<OrderItem> {
        let deadline = Instant::now() + self.limits.deadline;
        let semaphore = Arc::new(Semaphore::new(self.limits.extract_concurrency.max(1)));
        let total = messages.len();
        let mut tasks = JoinSet::new();

        for message in messages {
            let extractor = Arc::clone(&self.extractor);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                extractor.extract(message).await
            });
        }

        let mut items = Vec::new();
        let mut completed = 0usize;
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(batch))) => {
                    completed += 1;
                    items.extend(batch);
                }
                Ok(Some(Err(join_error))) => {
                    completed += 1;
                    warn!(error = %join_error, "extraction task aborted");
                }
                Ok(None) => break,
                Err(_) => {
                    // Partial data beats no data: keep what already finished.
                    warn!(
                        completed,
                        total, "extraction deadline reached; abandoning outstanding calls"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }
        debug!(completed, total, item_count = items.len(), "extraction stage finished");
        items
    }
}
