// file: src/crawler/api.rs
// description: contents-API crawl with reference resolution and worklist traversal
// reference: https://docs.github.com/en/rest/repos/contents

use crate::crawler::collector::CollectOptions;
use crate::crawler::github::{ContentEntry, EntryKind, GitHubClient};
use crate::crawler::locator::GitHubLocation;
use crate::crawler::progress::CrawlProgress;
use crate::crawler::result::{Accumulator, CollectionResult, CollectionSource};
use crate::error::{HarvestError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    /// Branch or commit; `None` crawls the default branch.
    pub reference: Option<String>,
    pub subdirectory: String,
}

impl ResolvedReference {
    fn default_branch() -> Self {
        Self {
            reference: None,
            subdirectory: String::new(),
        }
    }
}

/// Longest branch name equal to a leading run of whole segments.
pub fn match_branch(segments: &[String], branches: &[String]) -> Option<ResolvedReference> {
    (1..=segments.len()).rev().find_map(|taken| {
        let candidate = segments[..taken].join("/");
        branches.contains(&candidate).then(|| ResolvedReference {
            reference: Some(candidate),
            subdirectory: segments[taken..].join("/"),
        })
    })
}

pub async fn resolve_reference(
    client: &GitHubClient,
    location: &GitHubLocation,
) -> Result<Option<ResolvedReference>> {
    let segments = match location.tree_segments.as_deref() {
        Some(segments) if !segments.is_empty() => segments,
        _ => return Ok(Some(ResolvedReference::default_branch())),
    };

    let branches = client.list_branches(&location.owner, &location.repo).await?;
    if let Some(resolved) = match_branch(segments, &branches) {
        debug!("Resolved branch reference {:?}", resolved.reference);
        return Ok(Some(resolved));
    }

    let commit = &segments[0];
    if client
        .tree_exists(&location.owner, &location.repo, commit)
        .await?
    {
        debug!("Resolved commit reference {}", commit);
        return Ok(Some(ResolvedReference {
            reference: Some(commit.clone()),
            subdirectory: segments[1..].join("/"),
        }));
    }

    Ok(None)
}

pub async fn crawl(
    client: &GitHubClient,
    location: &GitHubLocation,
    options: &CollectOptions,
    progress: &CrawlProgress,
) -> Result<Option<CollectionResult>> {
    let Some(resolved) = resolve_reference(client, location).await? else {
        warn!(
            "No branch or commit matches {:?} in {}/{}",
            location.tree_segments, location.owner, location.repo
        );
        return Ok(None);
    };

    info!(
        "Crawling {}/{} at {} from '{}'",
        location.owner,
        location.repo,
        resolved.reference.as_deref().unwrap_or("default branch"),
        resolved.subdirectory
    );

    let mut walk = ApiWalk {
        client,
        location,
        options,
        progress,
        resolved: &resolved,
        acc: Accumulator::new(),
    };
    walk.run().await?;

    let base_path = options
        .use_relative_paths
        .then(|| resolved.subdirectory.clone());

    Ok(Some(walk.acc.finish(
        &options.filter,
        CollectionSource::Api,
        base_path,
    )))
}

struct ApiWalk<'a> {
    client: &'a GitHubClient,
    location: &'a GitHubLocation,
    options: &'a CollectOptions,
    progress: &'a CrawlProgress,
    resolved: &'a ResolvedReference,
    acc: Accumulator,
}

impl ApiWalk<'_> {
    async fn run(&mut self) -> Result<()> {
        let root = self.resolved.subdirectory.clone();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            self.progress.enter_directory(&dir);

            let listing = self
                .client
                .list_contents(
                    &self.location.owner,
                    &self.location.repo,
                    &dir,
                    self.resolved.reference.as_deref(),
                )
                .await;

            let entries = match listing {
                Ok(entries) => entries,
                Err(err) if dir == root || matches!(err, HarvestError::RateLimit { .. }) => {
                    return Err(err);
                }
                Err(err) => {
                    warn!("Skipping directory {}: {}", dir, err);
                    self.acc.fail(dir, err.to_string());
                    continue;
                }
            };

            let mut subdirectories = Vec::new();
            for entry in entries {
                match entry.kind {
                    EntryKind::Dir => subdirectories.push(entry.path),
                    EntryKind::File => self.collect_file(entry).await?,
                    other => debug!("Ignoring {:?} entry {}", other, entry.path),
                }
            }

            // Reversed so the stack yields children in listing order.
            pending.extend(subdirectories.into_iter().rev());
        }

        Ok(())
    }

    async fn collect_file(&mut self, entry: ContentEntry) -> Result<()> {
        let key = relative_key(
            &entry,
            &self.resolved.subdirectory,
            self.options.use_relative_paths,
        );

        if !self.options.filter.should_include(&key, &entry.name) {
            return Ok(());
        }

        let max = self.options.max_file_size;
        if entry.size > max {
            debug!("Skipping {} ({} bytes)", entry.path, entry.size);
            self.acc.skip(entry.path, entry.size);
            self.progress.file_skipped();
            return Ok(());
        }

        let content = if let Some(url) = entry.download_url.as_deref() {
            self.download(&entry.path, url).await?
        } else if let Some(url) = entry.url.as_deref() {
            self.decode_metadata(&entry.path, url).await?
        } else {
            Fetched::Failed("no content url in listing".to_string())
        };

        match content {
            Fetched::Text(text) => {
                self.acc.insert(key, text);
                self.progress.file_downloaded();
            }
            Fetched::TooLarge(size) => {
                self.acc.skip(entry.path, size);
                self.progress.file_skipped();
            }
            Fetched::Failed(reason) => {
                debug!("Failed to fetch {}: {}", entry.path, reason);
                self.acc.fail(entry.path, reason);
            }
        }

        Ok(())
    }

    async fn download(&self, path: &str, url: &str) -> Result<Fetched> {
        let response = match recoverable(self.client.download(url).await)? {
            Ok(response) => response,
            Err(reason) => return Ok(Fetched::Failed(reason)),
        };

        if !response.is_success() {
            return Ok(Fetched::Failed(format!("download returned {}", response.status)));
        }

        // The listing size can lag behind the served file.
        let served = response.size();
        if served > self.options.max_file_size {
            debug!("Skipping {} after download ({} bytes)", path, served);
            return Ok(Fetched::TooLarge(served));
        }

        Ok(match response.into_text() {
            Ok(text) => Fetched::Text(text),
            Err(_) => Fetched::Failed("content is not valid UTF-8".to_string()),
        })
    }

    async fn decode_metadata(&self, path: &str, url: &str) -> Result<Fetched> {
        let content = match recoverable(self.client.file_content(url).await)? {
            Ok(content) => content,
            Err(reason) => return Ok(Fetched::Failed(reason)),
        };

        let (Some("base64"), Some(encoded)) = (content.encoding.as_deref(), content.content)
        else {
            return Ok(Fetched::Failed(format!(
                "unsupported content encoding {:?}",
                content.encoding
            )));
        };

        let estimated = encoded.len() as u64 * 3 / 4;
        if estimated > self.options.max_file_size {
            debug!("Skipping {} (estimated {} bytes)", path, estimated);
            return Ok(Fetched::TooLarge(estimated));
        }

        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(match STANDARD.decode(compact) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Fetched::Text(text),
                Err(_) => Fetched::Failed("content is not valid UTF-8".to_string()),
            },
            Err(e) => Fetched::Failed(format!("invalid base64 payload: {}", e)),
        })
    }
}

enum Fetched {
    Text(String),
    TooLarge(u64),
    Failed(String),
}

/// Rate-limit exhaustion aborts the crawl; other failures only lose the file.
fn recoverable<T>(result: Result<T>) -> Result<std::result::Result<T, String>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(err @ HarvestError::RateLimit { .. }) => Err(err),
        Err(err) => Ok(Err(err.to_string())),
    }
}

fn relative_key(entry: &ContentEntry, subdirectory: &str, use_relative_paths: bool) -> String {
    if !use_relative_paths || subdirectory.is_empty() {
        return entry.path.clone();
    }

    match entry.path.strip_prefix(subdirectory) {
        Some("") => entry.name.clone(),
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/').to_string(),
        _ => entry.path.clone(),
    }
}
