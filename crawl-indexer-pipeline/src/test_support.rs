//! Mocks shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::collector::{AckToken, DeliveryId, OutputCollector};
use crawl_indexer_repository::{IndexClient, IndexClientError};
use crawl_indexer_shared::{IndexDocument, Metadata, Record, StatusEvent};

pub fn document(url: &str) -> IndexDocument {
    IndexDocument::derive(url, "text", &Metadata::new(), Utc::now())
}

pub fn token(id: u64, url: &str) -> AckToken {
    AckToken::new(DeliveryId::new(id), url, Arc::new(Metadata::new()))
}

pub fn record(url: &str, content: &str) -> Record {
    Record::new(url, content, Metadata::new())
}

/// Index client that records calls and fails on demand.
#[derive(Default)]
pub struct MockIndexClient {
    pub ping_calls: AtomicUsize,
    pub commit_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub added: Mutex<Vec<Vec<String>>>,
    pub ping_fails: bool,
    /// Outcome of upcoming `add` calls; `true` means fail. Empty = succeed.
    pub add_failures: Mutex<VecDeque<bool>>,
    /// Outcome of upcoming `commit` calls; `true` means fail. Empty = succeed.
    pub commit_failures: Mutex<VecDeque<bool>>,
}

impl MockIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            ping_fails: true,
            ..Self::default()
        }
    }

    pub fn fail_next_adds(&self, outcomes: &[bool]) {
        self.add_failures.lock().unwrap().extend(outcomes);
    }

    pub fn fail_next_commits(&self, outcomes: &[bool]) {
        self.commit_failures.lock().unwrap().extend(outcomes);
    }

    pub fn add_calls(&self) -> Vec<Vec<String>> {
        self.added.lock().unwrap().clone()
    }

    pub fn commits(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexClient for MockIndexClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn ping(&self) -> Result<(), IndexClientError> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if self.ping_fails {
            return Err(IndexClientError::connection("connection refused"));
        }
        Ok(())
    }

    async fn add(&self, documents: &[IndexDocument]) -> Result<(), IndexClientError> {
        self.added
            .lock()
            .unwrap()
            .push(documents.iter().map(|d| d.id.clone()).collect());
        if self.add_failures.lock().unwrap().pop_front().unwrap_or(false) {
            return Err(IndexClientError::add("add rejected"));
        }
        Ok(())
    }

    async fn commit(&self) -> Result<(), IndexClientError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        if self.commit_failures.lock().unwrap().pop_front().unwrap_or(false) {
            return Err(IndexClientError::commit("commit failed"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), IndexClientError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What a [`RecordingCollector`] saw, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Emit(String, StatusEvent),
    Ack(String),
    Fail(String),
}

#[derive(Default)]
pub struct RecordingCollector {
    pub outputs: Mutex<Vec<Output>>,
}

impl RecordingCollector {
    pub fn outputs(&self) -> Vec<Output> {
        self.outputs.lock().unwrap().clone()
    }
}

impl OutputCollector for RecordingCollector {
    fn emit(&self, stream: &str, _anchor: &AckToken, event: StatusEvent) {
        self.outputs
            .lock()
            .unwrap()
            .push(Output::Emit(stream.to_string(), event));
    }

    fn ack(&self, token: &AckToken) {
        self.outputs.lock().unwrap().push(Output::Ack(token.url().to_string()));
    }

    fn fail(&self, token: &AckToken) {
        self.outputs.lock().unwrap().push(Output::Fail(token.url().to_string()));
    }
}
