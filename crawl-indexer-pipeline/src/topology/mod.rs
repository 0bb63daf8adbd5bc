//! Stage graph of the crawl pipeline.
//!
//! A topology is one source plus named stages. Every stage declares its
//! parallelism and the upstream streams it subscribes to, each with a
//! grouping that decides which replica of the stage receives a record.

mod router;

pub use router::Router;

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::collector::STATUS_STREAM;
use crate::errors::PipelineError;

/// Stream every stage emits on unless it names another one.
pub const DEFAULT_STREAM: &str = "default";

/// Name of the indexing stage in [`crawl_topology`].
pub const INDEX_STAGE: &str = "index";

/// How records of a subscribed stream are spread over a stage's replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    /// Round robin over all replicas.
    Shuffle,
    /// Prefer a replica in the same process, otherwise shuffle.
    LocalOrShuffle,
    /// Records with equal values for these fields go to the same replica.
    Fields(Vec<String>),
}

/// One inbound edge of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub upstream: String,
    pub stream: String,
    pub grouping: Grouping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub name: String,
    pub parallelism: usize,
    pub inputs: Vec<Subscription>,
}

impl StageSpec {
    /// The subscription to `upstream` on `stream`, if declared.
    pub fn input(&self, upstream: &str, stream: &str) -> Option<&Subscription> {
        self.inputs
            .iter()
            .find(|s| s.upstream == upstream && s.stream == stream)
    }
}

/// Declares a source and stages, then validates them into a [`Topology`].
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    source: Option<StageSpec>,
    stages: Vec<StageSpec>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the source that feeds the graph.
    pub fn set_source(&mut self, name: impl Into<String>, parallelism: usize) -> &mut Self {
        self.source = Some(StageSpec {
            name: name.into(),
            parallelism,
            inputs: Vec::new(),
        });
        self
    }

    /// Declare a stage; subscribe it to upstream streams through the returned declarer.
    pub fn set_stage(&mut self, name: impl Into<String>, parallelism: usize) -> StageDeclarer<'_> {
        self.stages.push(StageSpec {
            name: name.into(),
            parallelism,
            inputs: Vec::new(),
        });
        let last = self.stages.len() - 1;
        StageDeclarer {
            stage: &mut self.stages[last],
        }
    }

    /// Validate the declarations.
    ///
    /// # Returns
    ///
    /// * `Ok(Topology)` - Stage names are unique, every upstream exists and the graph is acyclic
    /// * `Err(PipelineError::TopologyError)` - Describes the first problem found
    pub fn build(self) -> Result<Topology, PipelineError> {
        let source = self
            .source
            .ok_or_else(|| PipelineError::topology("topology has no source"))?;

        let mut names = HashSet::new();
        for spec in std::iter::once(&source).chain(self.stages.iter()) {
            if spec.name.is_empty() {
                return Err(PipelineError::topology("stage names must not be empty"));
            }
            if spec.parallelism == 0 {
                return Err(PipelineError::topology(format!(
                    "stage '{}' has zero parallelism",
                    spec.name
                )));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(PipelineError::topology(format!(
                    "duplicate stage name '{}'",
                    spec.name
                )));
            }
        }

        for stage in &self.stages {
            if stage.inputs.is_empty() {
                return Err(PipelineError::topology(format!(
                    "stage '{}' has no inputs",
                    stage.name
                )));
            }
            for input in &stage.inputs {
                if !names.contains(input.upstream.as_str()) {
                    return Err(PipelineError::topology(format!(
                        "stage '{}' subscribes to unknown stage '{}'",
                        stage.name, input.upstream
                    )));
                }
                if matches!(&input.grouping, Grouping::Fields(fields) if fields.is_empty()) {
                    return Err(PipelineError::topology(format!(
                        "stage '{}' uses a fields grouping without fields",
                        stage.name
                    )));
                }
            }
        }

        let order = topological_order(&source, &self.stages)?;
        debug!(stages = ?order, "Topology validated");

        Ok(Topology {
            source,
            stages: self.stages,
            order,
        })
    }
}

/// Adds subscriptions to the stage just declared.
pub struct StageDeclarer<'a> {
    stage: &'a mut StageSpec,
}

impl<'a> StageDeclarer<'a> {
    pub fn shuffle_grouping(self, upstream: &str) -> Self {
        self.subscribe(upstream, DEFAULT_STREAM, Grouping::Shuffle)
    }

    pub fn local_or_shuffle_grouping(self, upstream: &str) -> Self {
        self.subscribe(upstream, DEFAULT_STREAM, Grouping::LocalOrShuffle)
    }

    pub fn local_or_shuffle_grouping_on(self, upstream: &str, stream: &str) -> Self {
        self.subscribe(upstream, stream, Grouping::LocalOrShuffle)
    }

    pub fn fields_grouping(self, upstream: &str, fields: &[&str]) -> Self {
        self.fields_grouping_on(upstream, DEFAULT_STREAM, fields)
    }

    pub fn fields_grouping_on(self, upstream: &str, stream: &str, fields: &[&str]) -> Self {
        let fields = fields.iter().map(|f| f.to_string()).collect();
        self.subscribe(upstream, stream, Grouping::Fields(fields))
    }

    fn subscribe(self, upstream: &str, stream: &str, grouping: Grouping) -> Self {
        self.stage.inputs.push(Subscription {
            upstream: upstream.to_string(),
            stream: stream.to_string(),
            grouping,
        });
        self
    }
}

/// A validated stage graph.
#[derive(Debug, Clone)]
pub struct Topology {
    source: StageSpec,
    stages: Vec<StageSpec>,
    order: Vec<String>,
}

impl Topology {
    pub fn source(&self) -> &StageSpec {
        &self.source
    }

    /// Declared stage by name. The source is not a stage.
    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Source and stage names, every name after all of its upstreams.
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }

    /// Stages subscribed to `stream` of `upstream`.
    pub fn subscribers(&self, upstream: &str, stream: &str) -> Vec<&StageSpec> {
        self.stages
            .iter()
            .filter(|s| s.input(upstream, stream).is_some())
            .collect()
    }
}

/// Kahn's algorithm over source and stages; fails on a cycle.
fn topological_order(source: &StageSpec, stages: &[StageSpec]) -> Result<Vec<String>, PipelineError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut downstream: HashMap<&str, Vec<&str>> = HashMap::new();

    in_degree.insert(source.name.as_str(), 0);
    for stage in stages {
        in_degree.entry(stage.name.as_str()).or_insert(0);
        let upstreams: HashSet<&str> = stage.inputs.iter().map(|i| i.upstream.as_str()).collect();
        for upstream in upstreams {
            *in_degree.entry(stage.name.as_str()).or_insert(0) += 1;
            downstream.entry(upstream).or_default().push(stage.name.as_str());
        }
    }

    let mut ready: VecDeque<&str> = std::iter::once(source.name.as_str())
        .chain(stages.iter().map(|s| s.name.as_str()))
        .filter(|name| in_degree.get(name).copied() == Some(0))
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(name) = ready.pop_front() {
        order.push(name.to_string());
        for next in downstream.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*next);
                }
            }
        }
    }

    if order.len() != in_degree.len() {
        let stuck: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(name, _)| *name)
            .collect();
        return Err(PipelineError::topology(format!(
            "topology contains a cycle through {:?}",
            stuck
        )));
    }

    Ok(order)
}

/// The crawl graph: frontier spout, fetch and parse stages, indexing, status tracking.
///
/// The index stage receives documents from the redirection shunt and from
/// the Tika parser; every stage that reports status is grouped by `url` into
/// the status updater.
pub fn crawl_topology(index_parallelism: usize) -> Result<Topology, PipelineError> {
    let mut builder = TopologyBuilder::new();

    builder.set_source("spout", 1);
    builder.set_stage("partitioner", 1).shuffle_grouping("spout");
    builder
        .set_stage("fetch", 1)
        .fields_grouping("partitioner", &["key"]);
    builder.set_stage("sitemap", 1).local_or_shuffle_grouping("fetch");
    builder.set_stage("feeds", 1).local_or_shuffle_grouping("sitemap");
    builder.set_stage("parse", 1).local_or_shuffle_grouping("feeds");
    builder.set_stage("shunt", 1).local_or_shuffle_grouping("parse");
    builder
        .set_stage("tika", 1)
        .local_or_shuffle_grouping_on("shunt", "tika");
    builder
        .set_stage(INDEX_STAGE, index_parallelism)
        .local_or_shuffle_grouping("shunt")
        .local_or_shuffle_grouping("tika");

    let mut status = builder.set_stage("status", 1);
    for upstream in ["fetch", "sitemap", "feeds", "parse", "tika", INDEX_STAGE] {
        status = status.fields_grouping_on(upstream, STATUS_STREAM, &["url"]);
    }

    builder.build()
}
