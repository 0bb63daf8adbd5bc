//! Replica selection for a stage's inbound records.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::errors::PipelineError;
use crate::topology::Grouping;
use crawl_indexer_shared::Record;

/// Picks the replica that receives each record.
///
/// Shuffle groupings go round robin. Fields groupings hash the named fields:
/// `url` is the record url, any other name is looked up in the metadata
/// (first value, empty when absent).
#[derive(Debug, Clone)]
pub struct Router {
    grouping: Grouping,
    replicas: usize,
    next: usize,
}

impl Router {
    pub fn new(grouping: Grouping, replicas: usize) -> Result<Self, PipelineError> {
        if replicas == 0 {
            return Err(PipelineError::topology("router needs at least one replica"));
        }
        Ok(Self {
            grouping,
            replicas,
            next: 0,
        })
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    /// Replica index in `0..replicas` for `record`.
    pub fn route(&mut self, record: &Record) -> usize {
        match &self.grouping {
            Grouping::Shuffle | Grouping::LocalOrShuffle => {
                let replica = self.next;
                self.next = (self.next + 1) % self.replicas;
                replica
            }
            Grouping::Fields(fields) => {
                let mut hasher = DefaultHasher::new();
                for field in fields {
                    field_value(record, field).hash(&mut hasher);
                }
                (hasher.finish() % self.replicas as u64) as usize
            }
        }
    }
}

fn field_value<'a>(record: &'a Record, field: &str) -> &'a str {
    match field {
        "url" => record.url.as_str(),
        other => record.metadata.first(other).unwrap_or_default(),
    }
}
