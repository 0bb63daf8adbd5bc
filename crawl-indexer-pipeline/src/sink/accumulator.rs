//! Pending-document buffer of the indexing sink.

use std::collections::VecDeque;

use tracing::warn;

use crate::collector::AckToken;
use crate::errors::PipelineError;
use crate::sink::config::OverflowPolicy;
use crawl_indexer_shared::IndexDocument;

/// Documents waiting to be committed, plus the ledger of the deliveries
/// they came from.
///
/// `documents[i]` was built from the delivery `ledger[i]`. Entries are only
/// removed by a successful commit (or by shedding, when configured), so a
/// failed commit leaves everything in place for the next attempt.
#[derive(Debug)]
pub struct BatchAccumulator {
    documents: VecDeque<IndexDocument>,
    ledger: VecDeque<AckToken>,
    max_pending: usize,
    overflow_policy: OverflowPolicy,
    shed_count: u64,
}

impl BatchAccumulator {
    /// Create an empty accumulator holding at most `max_pending` documents.
    pub fn new(max_pending: usize, overflow_policy: OverflowPolicy) -> Self {
        Self {
            documents: VecDeque::new(),
            ledger: VecDeque::new(),
            max_pending,
            overflow_policy,
            shed_count: 0,
        }
    }

    /// Append a document and the token of the record it was built from.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The document is pending
    /// * `Err(PipelineError::BatchFull)` - The cap is reached and the policy is `RejectNew`
    pub fn enqueue(&mut self, document: IndexDocument, token: AckToken) -> Result<(), PipelineError> {
        if self.documents.len() >= self.max_pending {
            match self.overflow_policy {
                OverflowPolicy::RejectNew => {
                    return Err(PipelineError::batch_full(self.documents.len(), self.max_pending));
                }
                OverflowPolicy::ShedOldest => {
                    self.documents.pop_front();
                    if let Some(shed) = self.ledger.pop_front() {
                        warn!(
                            url = %shed.url(),
                            max_pending = self.max_pending,
                            "Batch full, shedding oldest pending document"
                        );
                    }
                    self.shed_count += 1;
                }
            }
        }

        self.documents.push_back(document);
        self.ledger.push_back(token);
        Ok(())
    }

    /// Number of pending documents.
    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All pending documents in arrival order, for submission.
    ///
    /// Nothing is removed; the commit controller clears the accumulator only
    /// after the remote commit succeeded.
    pub fn snapshot_for_commit(&mut self) -> &[IndexDocument] {
        self.documents.make_contiguous()
    }

    /// Urls of the pending documents in arrival order.
    pub fn pending_urls(&self) -> impl Iterator<Item = &str> {
        self.ledger.iter().map(AckToken::url)
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    /// Whether the next `enqueue` would fail with `BatchFull`.
    pub fn rejects_next(&self) -> bool {
        self.overflow_policy == OverflowPolicy::RejectNew && self.documents.len() >= self.max_pending
    }

    /// Number of documents dropped by the `ShedOldest` policy so far.
    pub fn shed_count(&self) -> u64 {
        self.shed_count
    }

    /// Empty the batch, returning the ledger of the committed deliveries.
    pub(crate) fn clear(&mut self) -> Vec<AckToken> {
        self.documents.clear();
        self.ledger.drain(..).collect()
    }
}
