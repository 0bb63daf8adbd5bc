//! Test doubles for the sink scenario tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crawl_indexer_pipeline::{AckToken, DeliveryId, OutputCollector};
use crawl_indexer_repository::{IndexClient, IndexClientError};
use crawl_indexer_shared::{IndexDocument, Metadata, Record, StatusEvent};

/// Remote index double: stores committed documents, fails on a script.
#[derive(Default)]
pub struct FakeIndex {
    pub reachable_fails: bool,
    staged: Mutex<Vec<IndexDocument>>,
    committed: Mutex<Vec<IndexDocument>>,
    add_calls: Mutex<Vec<usize>>,
    commit_script: Mutex<VecDeque<bool>>,
    pub commit_attempts: AtomicUsize,
    pub close_calls: AtomicUsize,
}

impl FakeIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reachable_fails: true,
            ..Self::default()
        })
    }

    /// Queue outcomes for the next commits; `true` fails that commit.
    pub fn script_commits(&self, failures: &[bool]) {
        self.commit_script.lock().unwrap().extend(failures);
    }

    /// Ids visible in the index, in commit order.
    pub fn committed_ids(&self) -> Vec<String> {
        self.committed
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.id.clone())
            .collect()
    }

    /// Size of every `add` request so far.
    pub fn add_sizes(&self) -> Vec<usize> {
        self.add_calls.lock().unwrap().clone()
    }

    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexClient for FakeIndex {
    fn name(&self) -> &str {
        "fake"
    }

    async fn ping(&self) -> Result<(), IndexClientError> {
        if self.reachable_fails {
            return Err(IndexClientError::ping("index unreachable"));
        }
        Ok(())
    }

    async fn add(&self, documents: &[IndexDocument]) -> Result<(), IndexClientError> {
        self.add_calls.lock().unwrap().push(documents.len());
        self.staged.lock().unwrap().extend_from_slice(documents);
        Ok(())
    }

    async fn commit(&self) -> Result<(), IndexClientError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let staged: Vec<IndexDocument> = self.staged.lock().unwrap().drain(..).collect();
        if self.commit_script.lock().unwrap().pop_front().unwrap_or(false) {
            return Err(IndexClientError::commit("simulated commit failure"));
        }
        self.committed.lock().unwrap().extend(staged);
        Ok(())
    }

    async fn close(&self) -> Result<(), IndexClientError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One collector call, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Event(String, StatusEvent),
    Ack(DeliveryId),
    Fail(DeliveryId),
}

#[derive(Default)]
pub struct CapturingCollector {
    seen: Mutex<Vec<Seen>>,
}

impl CapturingCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.seen()
            .into_iter()
            .filter_map(|s| match s {
                Seen::Event(_, event) => Some(event),
                _ => None,
            })
            .collect()
    }
}

impl OutputCollector for CapturingCollector {
    fn emit(&self, stream: &str, _anchor: &AckToken, event: StatusEvent) {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Event(stream.to_string(), event));
    }

    fn ack(&self, token: &AckToken) {
        self.seen.lock().unwrap().push(Seen::Ack(token.id()));
    }

    fn fail(&self, token: &AckToken) {
        self.seen.lock().unwrap().push(Seen::Fail(token.id()));
    }
}

pub fn page(url: &str, content: &str) -> Record {
    Record::new(url, content, Metadata::new())
}

pub fn token(id: u64, record: &Record) -> AckToken {
    AckToken::for_record(DeliveryId::new(id), record)
}
