// file: src/crawler/clone.rs
// description: clone-mode crawl into an ephemeral checkout walked with walkdir
// reference: https://docs.rs/gix, https://docs.rs/walkdir

use crate::crawler::filter::FilterSpec;
use crate::crawler::progress::CrawlProgress;
use crate::crawler::result::{Accumulator, CollectionResult, CollectionSource};
use crate::error::{HarvestError, Result};
use gix::progress::Discard;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Clone failures are reported through `stats.error`, never returned.
pub async fn crawl(
    url: &str,
    filter: &FilterSpec,
    max_file_size: u64,
    progress: &CrawlProgress,
) -> CollectionResult {
    let task_url = url.to_string();
    let task_filter = filter.clone();
    let task_progress = progress.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        clone_and_collect(&task_url, &task_filter, max_file_size, &task_progress)
    })
    .await;

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            warn!("Clone of {} failed: {}", url, err);
            Accumulator::soft_failure(filter, CollectionSource::Clone, err.to_string())
        }
        Err(join_err) => {
            warn!("Clone task for {} did not complete: {}", url, join_err);
            Accumulator::soft_failure(filter, CollectionSource::Clone, join_err.to_string())
        }
    }
}

fn clone_and_collect(
    url: &str,
    filter: &FilterSpec,
    max_file_size: u64,
    progress: &CrawlProgress,
) -> Result<CollectionResult> {
    // Removed when dropped, on every return path.
    let workdir = TempDir::new()?;

    clone_into(url, workdir.path())?;
    Ok(collect_checkout(workdir.path(), filter, max_file_size, progress))
}

fn clone_into(url: &str, destination: &Path) -> Result<()> {
    info!("Cloning repository from {}", url);
    let interrupt = AtomicBool::new(false);

    let mut prepare = gix::prepare_clone(url, destination)
        .map_err(|e| HarvestError::Git(format!("Failed to prepare clone: {}", e)))?;

    let (mut checkout, _) = prepare
        .fetch_then_checkout(Discard, &interrupt)
        .map_err(|e| HarvestError::Git(format!("Fetch failed: {}", e)))?;

    checkout
        .main_worktree(Discard, &interrupt)
        .map_err(|e| HarvestError::Git(format!("Checkout failed: {}", e)))?;

    info!("Repository cloned successfully");
    Ok(())
}

/// Walks a checked-out tree, skipping `.git` and symlinks.
pub fn collect_checkout(
    root: &Path,
    filter: &FilterSpec,
    max_file_size: u64,
    progress: &CrawlProgress,
) -> CollectionResult {
    let mut acc = Accumulator::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git")
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let relative_path = relative_to(root, entry.path());

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                debug!("Cannot stat {}: {}", relative_path, e);
                continue;
            }
        };

        if size > max_file_size {
            acc.skip(relative_path, size);
            progress.file_skipped();
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !filter.should_include(&relative_path, &file_name) {
            continue;
        }

        match fs::read(entry.path()) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => {
                    acc.insert(relative_path, text);
                    progress.file_downloaded();
                }
                Err(_) => acc.fail(relative_path, "content is not valid UTF-8"),
            },
            Err(e) => acc.fail(relative_path, e.to_string()),
        }
    }

    debug!(
        "Collected {} files, skipped {}",
        acc.downloaded(),
        acc.skipped()
    );
    acc.finish(filter, CollectionSource::Clone, None)
}

fn relative_to(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_include_exclude_end_to_end() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.py", b"print('a')");
        write(temp.path(), "tests/b.py", b"print('b')");
        write(temp.path(), "c.txt", b"c");

        let filter = FilterSpec::new(["*.py"], ["tests/*"]).unwrap();
        let result = collect_checkout(temp.path(), &filter, 1024, &CrawlProgress::hidden());

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files["a.py"], "print('a')");
        assert_eq!(result.stats.source, CollectionSource::Clone);
    }

    #[test]
    fn test_oversized_files_are_skipped_before_filtering() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "small.md", b"ok");
        write(temp.path(), "docs/huge.bin", &vec![b'x'; 64]);

        let filter = FilterSpec::new(["*.md"], Vec::<String>::new()).unwrap();
        let result = collect_checkout(temp.path(), &filter, 32, &CrawlProgress::hidden());

        assert_eq!(result.files.keys().collect::<Vec<_>>(), vec!["small.md"]);
        assert_eq!(result.stats.skipped_count, 1);
        assert_eq!(result.stats.skipped_files[0].path, "docs/huge.bin");
        assert_eq!(result.stats.skipped_files[0].size, 64);
    }

    #[test]
    fn test_binary_files_are_failed_not_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "logo.png", &[0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe]);
        write(temp.path(), "nested/dir/notes.txt", b"notes");

        let result = collect_checkout(
            temp.path(),
            &FilterSpec::allow_all(),
            1024,
            &CrawlProgress::hidden(),
        );

        assert_eq!(result.files["nested/dir/notes.txt"], "notes");
        assert!(!result.files.contains_key("logo.png"));
        assert_eq!(result.stats.skipped_count, 0);
        assert_eq!(result.stats.failed_files[0].path, "logo.png");
    }

    #[test]
    fn test_git_metadata_is_not_collected() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), ".git/config", b"[core]");
        write(temp.path(), ".github/workflows/ci.yml", b"on: push");

        let result = collect_checkout(
            temp.path(),
            &FilterSpec::allow_all(),
            1024,
            &CrawlProgress::hidden(),
        );

        assert_eq!(
            result.files.keys().collect::<Vec<_>>(),
            vec![".github/workflows/ci.yml"]
        );
    }

    #[tokio::test]
    async fn test_unreachable_clone_url_is_soft_failure() {
        let missing = TempDir::new().unwrap().path().join("absent.git");
        let url = missing.to_string_lossy().to_string();

        let result = crawl(&url, &FilterSpec::allow_all(), 1024, &CrawlProgress::hidden()).await;

        assert!(result.files.is_empty());
        assert!(result.stats.error.is_some());
        assert_eq!(result.stats.downloaded_count, 0);
    }
}
