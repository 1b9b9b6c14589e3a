// file: src/crawler/mod.rs
// description: repository crawler module exports
// reference: internal module structure

pub mod api;
pub mod clone;
pub mod collector;
pub mod filter;
pub mod github;
pub mod locator;
pub mod progress;
pub mod result;

pub use collector::{CollectOptions, RepositoryFileCollector, collect};
pub use filter::FilterSpec;
pub use github::GitHubClient;
pub use locator::{GitHubLocation, RepositoryLocator};
pub use progress::CrawlProgress;
pub use result::{CollectionResult, CollectionSource, CollectionStats, FailedFile, SkippedFile};
