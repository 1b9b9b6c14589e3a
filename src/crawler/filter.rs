// file: src/crawler/filter.rs
// description: glob based file selection for crawled repositories
// reference: https://docs.rs/glob

use crate::error::{HarvestError, Result};
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;

// fnmatch semantics: `*` crosses `/` and leading dots are not special.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Inclusion patterns are matched against the file name, exclusion patterns
/// against the path relative to the crawl root.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    include_raw: BTreeSet<String>,
    exclude_raw: BTreeSet<String>,
}

impl FilterSpec {
    pub fn new<I, E>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let include_raw = collect_patterns(include);
        let exclude_raw = collect_patterns(exclude);

        Ok(Self {
            include: compile(&include_raw)?,
            exclude: compile(&exclude_raw)?,
            include_raw,
            exclude_raw,
        })
    }

    /// Accepts every file.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn include_patterns(&self) -> &BTreeSet<String> {
        &self.include_raw
    }

    pub fn exclude_patterns(&self) -> &BTreeSet<String> {
        &self.exclude_raw
    }

    pub fn should_include(&self, relative_path: &str, file_name: &str) -> bool {
        let included = self.include.is_empty()
            || self
                .include
                .iter()
                .any(|p| p.matches_with(file_name, MATCH_OPTIONS));

        if !included {
            return false;
        }

        !self
            .exclude
            .iter()
            .any(|p| p.matches_with(relative_path, MATCH_OPTIONS))
    }
}

fn collect_patterns<T>(patterns: T) -> BTreeSet<String>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn compile(patterns: &BTreeSet<String>) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|raw| {
            Pattern::new(&collapse_stars(raw)).map_err(|e| {
                HarvestError::Configuration(format!("Invalid glob pattern '{}': {}", raw, e))
            })
        })
        .collect()
}

// With `*` already crossing `/`, a run of stars means the same as one. glob
// only accepts `**` as a whole path component, so runs are collapsed.
fn collapse_stars(raw: &str) -> String {
    let mut collapsed = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_include_accepts_everything() {
        let filter = FilterSpec::allow_all();
        assert!(filter.should_include("src/main.rs", "main.rs"));
        assert!(filter.should_include("README", "README"));
    }

    #[test]
    fn test_include_matches_basename_only() {
        let filter = FilterSpec::new(["*.py"], Vec::<String>::new()).unwrap();
        assert!(filter.should_include("deep/nested/a.py", "a.py"));
        assert!(!filter.should_include("deep/nested/c.txt", "c.txt"));
    }

    #[test]
    fn test_exclude_matches_relative_path() {
        let filter = FilterSpec::new(["*.py"], ["tests/*"]).unwrap();
        assert!(filter.should_include("a.py", "a.py"));
        assert!(!filter.should_include("tests/b.py", "b.py"));
        assert!(!filter.should_include("tests/unit/b.py", "b.py"));
    }

    #[test]
    fn test_exclude_applies_without_include_patterns() {
        let filter = FilterSpec::new(Vec::<String>::new(), ["**/node_modules/**"]).unwrap();
        assert!(!filter.should_include("web/node_modules/x/index.js", "index.js"));
        assert!(filter.should_include("web/src/index.js", "index.js"));
    }

    #[test]
    fn test_hidden_files_match_wildcards() {
        let filter = FilterSpec::new(["*.yml"], Vec::<String>::new()).unwrap();
        assert!(filter.should_include(".github/ci.yml", "ci.yml"));
        assert!(filter.should_include(".travis.yml", ".travis.yml"));
    }

    #[test]
    fn test_duplicate_patterns_collapse() {
        let filter = FilterSpec::new(["*.rs", "*.rs", " *.md "], Vec::<String>::new()).unwrap();
        assert_eq!(filter.include_patterns().len(), 2);
        assert!(filter.include_patterns().contains("*.md"));
    }

    #[test]
    fn test_star_runs_inside_components_are_accepted() {
        let filter = FilterSpec::new(["**.py"], ["src**"]).unwrap();
        assert!(filter.should_include("lib/a.py", "a.py"));
        assert!(!filter.should_include("src/deep/a.py", "a.py"));
        assert!(!filter.should_include("a.rs", "a.rs"));
        assert!(filter.include_patterns().contains("**.py"));
    }

    #[test]
    fn test_collapse_stars() {
        assert_eq!(collapse_stars("src**"), "src*");
        assert_eq!(collapse_stars("**/node_modules/***"), "*/node_modules/*");
        assert_eq!(collapse_stars("a*b*c"), "a*b*c");
    }

    #[test]
    fn test_invalid_pattern_is_configuration_error() {
        let result = FilterSpec::new(["[unclosed"], Vec::<String>::new());
        assert!(matches!(result, Err(HarvestError::Configuration(_))));
    }
}
