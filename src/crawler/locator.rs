// file: src/crawler/locator.rs
// description: repository locator parsing for clone and api crawl modes
// reference: https://docs.rs/url

use crate::error::{HarvestError, Result};
use percent_encoding::percent_decode_str;
use std::fmt;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryLocator {
    /// SSH or `.git` suffixed URL, crawled from a full clone.
    Clone { url: String },
    /// HTTPS browse URL, crawled through the contents API.
    GitHub(GitHubLocation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubLocation {
    pub owner: String,
    pub repo: String,
    /// Segments following `tree`, still ambiguous between reference and path.
    pub tree_segments: Option<Vec<String>>,
}

impl RepositoryLocator {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        if raw.is_empty() {
            return Err(HarvestError::Configuration(
                "Repository URL is empty".to_string(),
            ));
        }

        if is_clone_url(raw) {
            return Ok(Self::Clone {
                url: raw.to_string(),
            });
        }

        let url = Url::parse(raw).map_err(|e| {
            HarvestError::Configuration(format!("Invalid GitHub URL {}: {}", raw, e))
        })?;

        let segments: Vec<String> = url
            .path_segments()
            .map(|parts| {
                parts
                    .filter(|s| !s.is_empty())
                    .map(|s| decode_segment(raw, s))
                    .collect::<Result<Vec<String>>>()
            })
            .transpose()?
            .unwrap_or_default();

        if segments.len() < 2 {
            return Err(HarvestError::Configuration(format!(
                "Invalid GitHub URL {}: expected /owner/repo",
                raw
            )));
        }

        let tree_segments = match segments.get(2).map(String::as_str) {
            Some("tree") => Some(segments[3..].to_vec()),
            _ => None,
        };

        Ok(Self::GitHub(GitHubLocation {
            owner: segments[0].clone(),
            repo: segments[1].clone(),
            tree_segments,
        }))
    }

    pub fn is_clone(&self) -> bool {
        matches!(self, Self::Clone { .. })
    }
}

impl fmt::Display for RepositoryLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clone { url } => write!(f, "{}", url),
            Self::GitHub(location) => write!(f, "{}/{}", location.owner, location.repo),
        }
    }
}

// Listing paths and branch names come back unescaped.
fn decode_segment(raw: &str, segment: &str) -> Result<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| {
            HarvestError::Configuration(format!("Invalid path segment in {}: {}", raw, e))
        })
}

fn is_clone_url(raw: &str) -> bool {
    raw.starts_with("git@") || raw.ends_with(".git")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ssh_and_git_suffix_select_clone_mode() {
        assert!(RepositoryLocator::parse("git@github.com:owner/repo.git").unwrap().is_clone());
        assert!(RepositoryLocator::parse("git@github.com:owner/repo").unwrap().is_clone());
        assert!(
            RepositoryLocator::parse("https://github.com/owner/repo.git")
                .unwrap()
                .is_clone()
        );
    }

    #[test]
    fn test_repository_root() {
        let locator = RepositoryLocator::parse("https://github.com/owner/repo/").unwrap();
        assert_eq!(
            locator,
            RepositoryLocator::GitHub(GitHubLocation {
                owner: "owner".to_string(),
                repo: "repo".to_string(),
                tree_segments: None,
            })
        );
    }

    #[test]
    fn test_tree_segments_are_kept_unresolved() {
        let locator =
            RepositoryLocator::parse("https://github.com/owner/repo/tree/feature/x/src").unwrap();
        let RepositoryLocator::GitHub(location) = locator else {
            panic!("expected api locator");
        };
        assert_eq!(
            location.tree_segments,
            Some(vec!["feature".to_string(), "x".to_string(), "src".to_string()])
        );
    }

    #[test]
    fn test_tree_segments_are_percent_decoded() {
        let locator =
            RepositoryLocator::parse("https://github.com/owner/repo/tree/main/my%20dir/caf%C3%A9")
                .unwrap();
        let RepositoryLocator::GitHub(location) = locator else {
            panic!("expected api locator");
        };
        assert_eq!(
            location.tree_segments,
            Some(vec![
                "main".to_string(),
                "my dir".to_string(),
                "café".to_string()
            ])
        );
    }

    #[test]
    fn test_invalid_utf8_segment_is_configuration_error() {
        assert!(matches!(
            RepositoryLocator::parse("https://github.com/owner/repo/tree/main/%FF"),
            Err(HarvestError::Configuration(_))
        ));
    }

    #[test]
    fn test_non_tree_third_segment_is_ignored() {
        let locator = RepositoryLocator::parse("https://github.com/owner/repo/issues").unwrap();
        let RepositoryLocator::GitHub(location) = locator else {
            panic!("expected api locator");
        };
        assert_eq!(location.tree_segments, None);
    }

    #[test]
    fn test_missing_repo_segment_is_configuration_error() {
        assert!(matches!(
            RepositoryLocator::parse("https://github.com/owner"),
            Err(HarvestError::Configuration(_))
        ));
        assert!(matches!(
            RepositoryLocator::parse("not a url"),
            Err(HarvestError::Configuration(_))
        ));
        assert!(RepositoryLocator::parse("   ").is_err());
    }
}
