// file: src/llm/cache.rs
// description: flat json prompt to response cache persisted on disk
// reference: rewritten in full on every update, reloaded before every read

use crate::error::{HarvestError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResponseCache {
    path: PathBuf,
}

impl ResponseCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unreadable cache is treated as empty.
    pub async fn load(&self) -> HashMap<String, String> {
        if !self.path.exists() {
            debug!("No cache file at {}", self.path.display());
            return HashMap::new();
        }

        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read cache {}: {}", self.path.display(), e);
                return HashMap::new();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!("Failed to parse cache {}: {}", self.path.display(), e);
            HashMap::new()
        })
    }

    pub async fn get(&self, prompt: &str) -> Option<String> {
        self.load().await.remove(prompt)
    }

    /// Reloads, inserts and rewrites the whole file. Write failures are logged only.
    pub async fn insert(&self, prompt: &str, response: &str) {
        let mut entries = self.load().await;
        entries.insert(prompt.to_string(), response.to_string());

        if let Err(e) = self.save(&entries).await {
            warn!("Failed to save cache {}: {}", self.path.display(), e);
        }
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| HarvestError::FileOperation {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let contents = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, contents)
            .await
            .map_err(|source| HarvestError::FileOperation {
                path: self.path.clone(),
                source,
            })?;

        debug!("Saved {} cache entries", entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_cache_round_trip_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("llm_cache.json");

        ResponseCache::new(&path).insert("hello", "world").await;
        ResponseCache::new(&path).insert("second", "entry").await;

        let cache = ResponseCache::new(&path);
        assert_eq!(cache.get("hello").await.as_deref(), Some("world"));
        assert_eq!(cache.load().await.len(), 2);
    }

    #[tokio::test]
    async fn test_prompt_keys_are_verbatim() {
        let dir = tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().join("cache.json"));

        cache.insert("Summarize:\n  x", "short").await;

        assert_eq!(cache.get("Summarize:\n  x").await.as_deref(), Some("short"));
        assert_eq!(cache.get("Summarize: x").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = ResponseCache::new(&path);
        assert!(cache.load().await.is_empty());

        cache.insert("p", "r").await;
        assert_eq!(cache.get("p").await.as_deref(), Some("r"));
    }
}
