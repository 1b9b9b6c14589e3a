// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{HarvestError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

const REPOSITORY_URL_VARS: [&str; 4] = ["GITHUB_URL", "REPO_URL", "REPOSITORY_URL", "GIT_REPO"];
const GITHUB_TOKEN_VARS: [&str; 1] = ["GITHUB_TOKEN"];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    pub api_base_url: String,
    pub max_file_size: u64,
    pub use_relative_paths: bool,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    pub max_rate_limit_retries: u32,
    pub rate_limit_margin_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub cache_path: PathBuf,
    pub use_cache: bool,
    pub log_dir: PathBuf,
    pub temperature: f32,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let defaults = config::Config::try_from(&Self::default_config())
            .map_err(|e| HarvestError::Configuration(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder
                .add_source(config::File::from(Path::new("config/default.toml")).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("REPO_HARVEST")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| HarvestError::Configuration(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| HarvestError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            crawler: CrawlerConfig {
                api_base_url: DEFAULT_GITHUB_API_URL.to_string(),
                max_file_size: DEFAULT_MAX_FILE_SIZE,
                use_relative_paths: false,
                include_patterns: vec![],
                exclude_patterns: vec![],
                max_rate_limit_retries: 3,
                rate_limit_margin_secs: 1,
            },
            llm: LlmConfig {
                cache_path: PathBuf::from("llm_cache.json"),
                use_cache: true,
                log_dir: PathBuf::from("logs"),
                temperature: 0.7,
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.crawler.max_file_size == 0 {
            return Err(HarvestError::Configuration(
                "max_file_size must be greater than 0".to_string(),
            ));
        }

        if self.crawler.api_base_url.trim().is_empty() {
            return Err(HarvestError::Configuration(
                "api_base_url must not be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(HarvestError::Configuration(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }

        Ok(())
    }
}

/// Credentials and locators come from the process environment only.
pub struct Credentials;

impl Credentials {
    pub fn github_token() -> Option<String> {
        first_present(&GITHUB_TOKEN_VARS, env_lookup)
    }

    /// `GITHUB_URL`, then `REPO_URL`, `REPOSITORY_URL` and `GIT_REPO`.
    pub fn repository_url() -> Option<String> {
        first_present(&REPOSITORY_URL_VARS, env_lookup)
    }
}

/// Reads an environment variable, treating blank values as unset.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub fn first_present<F>(names: &[&str], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| lookup(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.crawler.max_file_size, 1_048_576);
        assert_eq!(config.crawler.max_rate_limit_retries, 3);
    }

    #[test]
    fn test_validate_rejects_zero_file_size() {
        let mut config = Config::default_config();
        config.crawler.max_file_size = 0;
        assert!(matches!(
            config.validate(),
            Err(HarvestError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_temperature_out_of_range() {
        let mut config = Config::default_config();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_overrides_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("harvest.toml");
        std::fs::write(
            &path,
            r#"
[crawler]
max_file_size = 500000
include_patterns = ["*.py", "*.md"]

[llm]
use_cache = false
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.crawler.max_file_size, 500_000);
        assert_eq!(config.crawler.include_patterns, vec!["*.py", "*.md"]);
        assert!(!config.llm.use_cache);
        assert_eq!(config.crawler.api_base_url, DEFAULT_GITHUB_API_URL);
    }

    #[test]
    fn test_first_present_respects_order() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("REPO_URL", "https://github.com/a/b"), ("GIT_REPO", "git@x:y.git")]);
        let lookup = |name: &str| vars.get(name).map(|v| v.to_string());

        assert_eq!(
            first_present(&REPOSITORY_URL_VARS, lookup),
            Some("https://github.com/a/b".to_string())
        );
        assert_eq!(first_present(&["MISSING"], lookup), None);
    }
}
