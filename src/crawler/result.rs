// file: src/crawler/result.rs
// description: collection output and statistics for a crawl run
// reference: internal data structures

use crate::crawler::filter::FilterSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionSource {
    Api,
    Clone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub size: u64,
}

/// A file that passed the filter but could not be fetched or decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub downloaded_count: usize,
    pub skipped_count: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub failed_files: Vec<FailedFile>,
    pub base_path: Option<String>,
    pub include_patterns: BTreeSet<String>,
    pub exclude_patterns: BTreeSet<String>,
    pub source: CollectionSource,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub files: BTreeMap<String, String>,
    pub stats: CollectionStats,
}

impl CollectionResult {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.files.values().map(String::len).sum()
    }
}

/// Accumulates one run's output; owned exclusively by that run.
#[derive(Debug)]
pub(crate) struct Accumulator {
    files: BTreeMap<String, String>,
    skipped: Vec<SkippedFile>,
    failed: Vec<FailedFile>,
}

impl Accumulator {
    pub(crate) fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, key: String, content: String) {
        self.files.insert(key, content);
    }

    pub(crate) fn skip(&mut self, path: impl Into<String>, size: u64) {
        self.skipped.push(SkippedFile {
            path: path.into(),
            size,
        });
    }

    pub(crate) fn fail(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(FailedFile {
            path: path.into(),
            reason: reason.into(),
        });
    }

    pub(crate) fn downloaded(&self) -> usize {
        self.files.len()
    }

    pub(crate) fn skipped(&self) -> usize {
        self.skipped.len()
    }

    pub(crate) fn finish(
        self,
        filter: &FilterSpec,
        source: CollectionSource,
        base_path: Option<String>,
    ) -> CollectionResult {
        CollectionResult {
            stats: CollectionStats {
                downloaded_count: self.files.len(),
                skipped_count: self.skipped.len(),
                skipped_files: self.skipped,
                failed_files: self.failed,
                base_path,
                include_patterns: filter.include_patterns().clone(),
                exclude_patterns: filter.exclude_patterns().clone(),
                source,
                error: None,
            },
            files: self.files,
        }
    }

    pub(crate) fn soft_failure(
        filter: &FilterSpec,
        source: CollectionSource,
        error: String,
    ) -> CollectionResult {
        let mut result = Self::new().finish(filter, source, None);
        result.stats.error = Some(error);
        result
    }
}
