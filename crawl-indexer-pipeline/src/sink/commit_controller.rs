//! Flush policy and commit protocol of the indexing sink.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::collector::AckToken;
use crate::errors::PipelineError;
use crate::sink::accumulator::BatchAccumulator;
use crawl_indexer_repository::IndexClient;

/// Result of a successful flush.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Documents submitted and committed.
    pub submitted: usize,
    /// Number of `add` requests the submission was split into.
    pub add_requests: usize,
    /// Ledger of the deliveries whose documents are now committed.
    pub committed: Vec<AckToken>,
}

/// Decides when to flush and runs the add-then-commit protocol.
///
/// A flush is one logical transaction: the snapshot is submitted in chunks,
/// then committed once. If any call fails, nothing is cleared and the full
/// batch is submitted again on the next flush.
///
/// A chunk holds at most `max(max_docs_per_batch, commit_size)` documents, so
/// a flush at the threshold is always a single `add`. Only batches that grew
/// past the commit size after failed flushes are split.
pub struct CommitController {
    client: Arc<dyn IndexClient>,
    commit_size: usize,
    chunk_size: usize,
    consecutive_failures: u32,
    total_committed: u64,
}

impl CommitController {
    /// Create a controller for `client`.
    ///
    /// Sizes of zero are raised to one.
    pub fn new(client: Arc<dyn IndexClient>, commit_size: usize, max_docs_per_batch: usize) -> Self {
        let commit_size = commit_size.max(1);
        Self {
            client,
            commit_size,
            chunk_size: max_docs_per_batch.max(commit_size),
            consecutive_failures: 0,
            total_committed: 0,
        }
    }

    /// Whether the pending count reached the commit size.
    pub fn should_flush(&self, accumulator: &BatchAccumulator) -> bool {
        accumulator.size() >= self.commit_size
    }

    /// Submit and commit every pending document.
    ///
    /// # Returns
    ///
    /// * `Ok(FlushReport)` - The batch was committed and cleared (empty report if nothing was pending)
    /// * `Err(PipelineError::IndexError)` - The flush failed; the batch is left untouched
    #[instrument(skip(self, accumulator), fields(pending = accumulator.size(), index = self.client.name()))]
    pub async fn flush(&mut self, accumulator: &mut BatchAccumulator) -> Result<FlushReport, PipelineError> {
        if accumulator.is_empty() {
            return Ok(FlushReport::default());
        }

        match self.submit_and_commit(accumulator).await {
            Ok((submitted, add_requests)) => {
                let committed = accumulator.clear();
                self.consecutive_failures = 0;
                self.total_committed += submitted as u64;

                info!(
                    count = submitted,
                    add_requests = add_requests,
                    "Committed batch to index"
                );

                Ok(FlushReport {
                    submitted,
                    add_requests,
                    committed,
                })
            }
            Err(e) => {
                self.consecutive_failures += 1;

                error!(
                    error = %e,
                    pending = accumulator.size(),
                    consecutive_failures = self.consecutive_failures,
                    retryable = e.is_retryable(),
                    "Failed to commit batch, keeping it for the next flush"
                );

                Err(PipelineError::from(e))
            }
        }
    }

    /// Final flush on shutdown, attempted once regardless of the commit size.
    ///
    /// Failures are logged and swallowed so shutdown can proceed.
    pub async fn terminal_flush(&mut self, accumulator: &mut BatchAccumulator) -> Option<FlushReport> {
        if accumulator.is_empty() {
            return None;
        }

        info!(pending = accumulator.size(), "Flushing remaining documents");

        match self.flush(accumulator).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(
                    error = %e,
                    lost = accumulator.size(),
                    "Terminal flush failed, pending documents were not committed"
                );
                None
            }
        }
    }

    async fn submit_and_commit(
        &self,
        accumulator: &mut BatchAccumulator,
    ) -> Result<(usize, usize), crawl_indexer_repository::IndexClientError> {
        let documents = accumulator.snapshot_for_commit();
        let mut add_requests = 0;

        for chunk in documents.chunks(self.chunk_size) {
            self.client.add(chunk).await?;
            add_requests += 1;
        }

        debug!(count = documents.len(), add_requests = add_requests, "Documents submitted, committing");
        self.client.commit().await?;

        Ok((documents.len(), add_requests))
    }

    pub fn commit_size(&self) -> usize {
        self.commit_size
    }

    /// Maximum number of documents in one `add` request.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Failed flushes since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Documents committed over the controller's lifetime.
    pub fn total_committed(&self) -> u64 {
        self.total_committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::config::OverflowPolicy;
    use crate::test_support::{document, token, MockIndexClient};

    fn filled(n: usize) -> BatchAccumulator {
        let mut acc = BatchAccumulator::new(1000, OverflowPolicy::RejectNew);
        for i in 0..n {
            let url = format!("u{}", i + 1);
            acc.enqueue(document(&url), token(i as u64, &url)).unwrap();
        }
        acc
    }

    #[tokio::test]
    async fn test_flush_empty_is_noop() {
        let client = Arc::new(MockIndexClient::new());
        let mut controller = CommitController::new(client.clone(), 2, 100);
        let mut acc = filled(0);

        let report = controller.flush(&mut acc).await.unwrap();

        assert_eq!(report.submitted, 0);
        assert!(client.add_calls().is_empty());
        assert_eq!(client.commits(), 0);
    }

    #[tokio::test]
    async fn test_should_flush_at_threshold() {
        let client = Arc::new(MockIndexClient::new());
        let controller = CommitController::new(client, 3, 100);

        assert!(!controller.should_flush(&filled(2)));
        assert!(controller.should_flush(&filled(3)));
        assert!(controller.should_flush(&filled(4)));
    }

    #[tokio::test]
    async fn test_successful_flush_clears_batch() {
        let client = Arc::new(MockIndexClient::new());
        let mut controller = CommitController::new(client.clone(), 2, 100);
        let mut acc = filled(2);

        let report = controller.flush(&mut acc).await.unwrap();

        assert_eq!(report.submitted, 2);
        assert_eq!(report.add_requests, 1);
        assert_eq!(report.committed.len(), 2);
        assert!(acc.is_empty());
        assert_eq!(client.add_calls(), vec![vec!["u1".to_string(), "u2".to_string()]]);
        assert_eq!(client.commits(), 1);
        assert_eq!(controller.total_committed(), 2);
    }

    #[tokio::test]
    async fn test_add_failure_skips_commit_and_keeps_batch() {
        let client = Arc::new(MockIndexClient::new());
        client.fail_next_adds(&[true]);
        let mut controller = CommitController::new(client.clone(), 2, 100);
        let mut acc = filled(2);

        let result = controller.flush(&mut acc).await;

        assert!(matches!(result, Err(PipelineError::IndexError(_))));
        assert_eq!(acc.size(), 2);
        assert_eq!(client.commits(), 0);
        assert_eq!(controller.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_repeated_commit_failures_never_lose_documents() {
        let client = Arc::new(MockIndexClient::new());
        client.fail_next_commits(&[true, true, true]);
        let mut controller = CommitController::new(client.clone(), 1, 100);
        let mut acc = BatchAccumulator::new(1000, OverflowPolicy::RejectNew);

        for i in 1..=3 {
            let url = format!("u{}", i);
            acc.enqueue(document(&url), token(i, &url)).unwrap();
            assert!(controller.flush(&mut acc).await.is_err());
            assert_eq!(acc.size(), i as usize);
        }
        assert_eq!(controller.consecutive_failures(), 3);

        let report = controller.flush(&mut acc).await.unwrap();
        assert_eq!(report.submitted, 3);
        assert_eq!(controller.consecutive_failures(), 0);
        assert_eq!(client.add_calls().last().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_threshold_flush_is_one_add_when_commit_size_exceeds_batch_limit() {
        let client = Arc::new(MockIndexClient::new());
        let mut controller = CommitController::new(client.clone(), 250, 100);
        let mut acc = filled(250);

        assert_eq!(controller.chunk_size(), 250);
        let report = controller.flush(&mut acc).await.unwrap();

        assert_eq!(report.add_requests, 1);
        let sizes: Vec<usize> = client.add_calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![250]);
        assert_eq!(client.commits(), 1);
    }

    #[tokio::test]
    async fn test_submission_is_chunked() {
        let client = Arc::new(MockIndexClient::new());
        let mut controller = CommitController::new(client.clone(), 2, 2);
        let mut acc = filled(5);

        let report = controller.flush(&mut acc).await.unwrap();

        assert_eq!(report.add_requests, 3);
        let sizes: Vec<usize> = client.add_calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(client.commits(), 1);
    }

    #[tokio::test]
    async fn test_failed_chunk_aborts_whole_flush() {
        let client = Arc::new(MockIndexClient::new());
        client.fail_next_adds(&[false, true]);
        let mut controller = CommitController::new(client.clone(), 2, 2);
        let mut acc = filled(4);

        assert!(controller.flush(&mut acc).await.is_err());

        assert_eq!(acc.size(), 4);
        assert_eq!(client.commits(), 0);
    }

    #[tokio::test]
    async fn test_terminal_flush_swallows_failure() {
        let client = Arc::new(MockIndexClient::new());
        client.fail_next_commits(&[true]);
        let mut controller = CommitController::new(client.clone(), 100, 100);
        let mut acc = filled(1);

        assert!(controller.terminal_flush(&mut acc).await.is_none());
        assert_eq!(client.commits(), 1);
        assert_eq!(acc.size(), 1);
    }

    #[tokio::test]
    async fn test_terminal_flush_ignores_threshold() {
        let client = Arc::new(MockIndexClient::new());
        let mut controller = CommitController::new(client.clone(), 100, 100);
        let mut acc = filled(1);

        let report = controller.terminal_flush(&mut acc).await.unwrap();

        assert_eq!(report.submitted, 1);
        assert!(acc.is_empty());
    }
}
