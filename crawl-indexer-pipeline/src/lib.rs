//! # Crawl Indexer Pipeline
//!
//! This crate provides the pipeline components that take crawled records and
//! write them into a remote search index in committed batches.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Reads crawled records from an upstream source
//! 2. **Processor**: Builds index documents from records
//! 3. **Sink**: Batches documents, commits them to the index and reports a
//!    status event plus an acknowledgment for every record
//! 4. **Topology**: Declares the crawl stage graph and routes records to sink replicas
//! 5. **Orchestrator**: Runs the sink replicas and coordinates shutdown

pub mod collector;
pub mod consumer;
pub mod errors;
pub mod orchestrator;
pub mod processor;
pub mod sink;
pub mod topology;

#[cfg(test)]
pub(crate) mod test_support;

pub use collector::{AckToken, ChannelCollector, CollectorMessage, DeliveryId, OutputCollector, STATUS_STREAM};
pub use errors::PipelineError;
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunSummary};
pub use sink::{prepare_replicas, FlushAttempt, IndexingSink, OverflowPolicy, SinkConfig, SinkOutcome};
