//! Configuration and dependency wiring for the crawl indexer binary.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{LogFormat, Settings};
