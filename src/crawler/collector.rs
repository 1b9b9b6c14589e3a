// file: src/crawler/collector.rs
// description: repository file collector selecting clone or api mode
// reference: coordinates locator parsing, filtering and the crawl backends

use crate::config::{CrawlerConfig, DEFAULT_GITHUB_API_URL, DEFAULT_MAX_FILE_SIZE};
use crate::crawler::filter::FilterSpec;
use crate::crawler::github::GitHubClient;
use crate::crawler::locator::RepositoryLocator;
use crate::crawler::progress::CrawlProgress;
use crate::crawler::result::CollectionResult;
use crate::crawler::{api, clone};
use crate::error::Result;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub token: Option<String>,
    pub max_file_size: u64,
    pub use_relative_paths: bool,
    pub filter: FilterSpec,
    pub api_base_url: String,
    pub max_rate_limit_retries: u32,
    pub rate_limit_margin: Duration,
    pub show_progress: bool,
    pub colored: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            token: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            use_relative_paths: false,
            filter: FilterSpec::allow_all(),
            api_base_url: DEFAULT_GITHUB_API_URL.to_string(),
            max_rate_limit_retries: 3,
            rate_limit_margin: Duration::from_secs(1),
            show_progress: false,
            colored: false,
        }
    }
}

impl CollectOptions {
    pub fn from_config(config: &CrawlerConfig, token: Option<String>) -> Result<Self> {
        Ok(Self {
            token,
            max_file_size: config.max_file_size,
            use_relative_paths: config.use_relative_paths,
            filter: FilterSpec::new(&config.include_patterns, &config.exclude_patterns)?,
            api_base_url: config.api_base_url.clone(),
            max_rate_limit_retries: config.max_rate_limit_retries,
            rate_limit_margin: Duration::from_secs(config.rate_limit_margin_secs),
            show_progress: false,
            colored: false,
        })
    }
}

pub struct RepositoryFileCollector {
    options: CollectOptions,
}

impl RepositoryFileCollector {
    pub fn new(options: CollectOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CollectOptions {
        &self.options
    }

    /// Collects the files selected by the filter.
    ///
    /// Returns `Ok(None)` when a `tree` URL names neither a branch nor a
    /// commit. Clone failures come back as an empty result carrying
    /// `stats.error`.
    pub async fn collect(&self, locator: &str) -> Result<Option<CollectionResult>> {
        let locator = RepositoryLocator::parse(locator)?;
        let progress = CrawlProgress::new(self.options.show_progress, self.options.colored);
        let started = Instant::now();

        let result = match &locator {
            RepositoryLocator::Clone { url } => Some(
                clone::crawl(
                    url,
                    &self.options.filter,
                    self.options.max_file_size,
                    &progress,
                )
                .await,
            ),
            RepositoryLocator::GitHub(location) => {
                let client =
                    GitHubClient::new(&self.options.api_base_url, self.options.token.clone())?
                        .with_rate_limit(
                            self.options.max_rate_limit_retries,
                            self.options.rate_limit_margin,
                        );
                api::crawl(&client, location, &self.options, &progress).await?
            }
        };

        progress.finish();

        if let Some(result) = &result {
            info!(
                "Collected {} files from {} in {:.2}s ({} skipped, {} failed)",
                result.stats.downloaded_count,
                locator,
                started.elapsed().as_secs_f64(),
                result.stats.skipped_count,
                result.stats.failed_files.len()
            );
        }

        Ok(result)
    }
}

/// One-shot collection with default API settings.
pub async fn collect(
    locator: &str,
    token: Option<String>,
    max_file_size: u64,
    use_relative_paths: bool,
    filter: FilterSpec,
) -> Result<Option<CollectionResult>> {
    RepositoryFileCollector::new(CollectOptions {
        token,
        max_file_size,
        use_relative_paths,
        filter,
        ..CollectOptions::default()
    })
    .collect(locator)
    .await
}
