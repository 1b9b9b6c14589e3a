// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod crawler;
pub mod error;
pub mod exporter;
pub mod llm;
pub mod utils;

pub use config::{Config, CrawlerConfig, Credentials, LlmConfig};
pub use crawler::{
    CollectOptions, CollectionResult, CollectionSource, CollectionStats, FailedFile, FilterSpec,
    GitHubClient, RepositoryFileCollector, RepositoryLocator, SkippedFile, collect,
};
pub use error::{HarvestError, Result};
pub use exporter::json::{ExportManifest, JsonExporter};
pub use llm::{LlmClient, LlmProvider, ResponseCache};
