// file: src/exporter/json.rs
// description: json export utilities for collected repository files

use crate::crawler::CollectionResult;
use crate::error::{HarvestError, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

const RESULT_FILE: &str = "collection.json";
const MANIFEST_FILE: &str = "manifest.json";
const MIRROR_DIR: &str = "files";

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub source: String,
    pub total_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
    pub files: Vec<String>,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export(
        &self,
        source: &str,
        result: &CollectionResult,
        pretty: bool,
    ) -> Result<ExportManifest> {
        info!("Starting JSON export to {:?}", self.output_dir);

        self.write_json(RESULT_FILE, result, pretty)?;

        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            source: source.to_string(),
            total_files: result.files.len(),
            skipped_files: result.stats.skipped_count,
            failed_files: result.stats.failed_files.len(),
            files: result.files.keys().cloned().collect(),
        };
        self.write_json(MANIFEST_FILE, &manifest, pretty)?;

        info!("Export complete: {} files exported", manifest.total_files);
        Ok(manifest)
    }

    /// Writes every collected file below `files/`, keeping its relative path.
    pub fn mirror(&self, result: &CollectionResult) -> Result<usize> {
        let root = self.output_dir.join(MIRROR_DIR);
        let mut written = 0;

        for (key, content) in &result.files {
            let Some(relative) = safe_relative(key) else {
                warn!("Refusing to mirror unsafe path {}", key);
                continue;
            };

            let target = root.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| HarvestError::FileOperation {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&target, content).map_err(|source| HarvestError::FileOperation {
                path: target.clone(),
                source,
            })?;
            written += 1;
        }

        Ok(written)
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T, pretty: bool) -> Result<()> {
        let body = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        let path = self.output_dir.join(name);
        fs::write(&path, body).map_err(|source| HarvestError::FileOperation { path, source })
    }
}

fn safe_relative(key: &str) -> Option<PathBuf> {
    let path = Path::new(key);
    let normal = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    (normal && !key.is_empty()).then(|| path.to_path_buf())
}
