// file: src/crawler/github.rs
// description: GitHub REST client with bounded rate-limit backoff
// reference: https://docs.github.com/en/rest/repos/contents

use crate::error::{HarvestError, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, HeaderMap};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("repo-harvest/", env!("CARGO_PKG_VERSION"));
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const BRANCH_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: u64,
    pub download_url: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileContent {
    pub encoding: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
}

// A contents request for a file path answers with a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Many(Vec<ContentEntry>),
    One(ContentEntry),
}

/// A fully buffered response.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_length: Option<u64>,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Advertised `Content-Length`, or the buffered length for chunked bodies.
    pub fn size(&self) -> u64 {
        self.content_length.unwrap_or(self.body.len() as u64)
    }

    pub fn into_text(self) -> std::result::Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body)
    }
}

pub struct GitHubClient {
    client: Client,
    api_base: String,
    token: Option<String>,
    max_retries: u32,
    margin: Duration,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            max_retries: 3,
            margin: Duration::from_secs(1),
        })
    }

    pub fn with_rate_limit(mut self, max_retries: u32, margin: Duration) -> Self {
        self.max_retries = max_retries;
        self.margin = margin;
        self
    }

    /// Branch names of the repository; an unsuccessful listing yields none.
    pub async fn list_branches(&self, owner: &str, repo: &str) -> Result<Vec<String>> {
        let url = self.endpoint(["repos", owner, repo, "branches"])?;
        let mut names = Vec::new();
        let mut page = 1usize;

        loop {
            let page_param = page.to_string();
            let per_page = BRANCH_PAGE_SIZE.to_string();
            let response = self
                .get(&url, &[("per_page", &per_page), ("page", &page_param)])
                .await?;

            if !response.is_success() {
                warn!("Branch listing for {}/{} returned {}", owner, repo, response.status);
                break;
            }

            let branches: Vec<Branch> = response.json()?;
            let count = branches.len();
            names.extend(branches.into_iter().map(|b| b.name));

            if count < BRANCH_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!("Found {} branches for {}/{}", names.len(), owner, repo);
        Ok(names)
    }

    pub async fn tree_exists(&self, owner: &str, repo: &str, tree: &str) -> Result<bool> {
        let url = self.endpoint(["repos", owner, repo, "git", "trees", tree])?;
        let response = self.get(&url, &[]).await?;
        Ok(response.status == StatusCode::OK)
    }

    pub async fn list_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Vec<ContentEntry>> {
        // An empty path keeps the trailing slash of the root listing.
        let segments = ["repos", owner, repo, "contents"]
            .into_iter()
            .chain(path.split('/'));
        let url = self.endpoint(segments)?;
        let query: Vec<(&str, &str)> = reference.map(|r| ("ref", r)).into_iter().collect();

        let response = self.get(&url, &query).await?;
        if response.status != StatusCode::OK {
            return Err(HarvestError::Transport(format!(
                "Listing {} returned {}",
                url, response.status
            )));
        }

        Ok(match response.json::<Listing>()? {
            Listing::Many(entries) => entries,
            Listing::One(entry) => vec![entry],
        })
    }

    /// Appends each segment to the API base, escaping `#`, `?`, `%` and spaces.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<String> {
        let mut url = Url::parse(&self.api_base).map_err(|e| {
            HarvestError::Configuration(format!("Invalid API base URL {}: {}", self.api_base, e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                HarvestError::Configuration(format!(
                    "API base URL {} cannot carry a path",
                    self.api_base
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url.to_string())
    }

    pub async fn download(&self, url: &str) -> Result<ApiResponse> {
        self.get(url, &[]).await
    }

    pub async fn file_content(&self, url: &str) -> Result<FileContent> {
        let response = self.get(url, &[]).await?;
        if !response.is_success() {
            return Err(HarvestError::Transport(format!(
                "Content request {} returned {}",
                url, response.status
            )));
        }
        response.json()
    }

    /// GET with rate-limit handling: wait until the advertised reset and retry,
    /// at most `max_retries` times.
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<ApiResponse> {
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let mut request = self
                .client
                .get(url)
                .header(ACCEPT, GITHUB_ACCEPT)
                .query(query);
            if let Some(token) = &self.token {
                request = request.header(AUTHORIZATION, format!("token {}", token));
            }

            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();

            if !is_rate_limited(status, &headers, &body) {
                return Ok(ApiResponse {
                    status,
                    content_length: header_number(&headers, CONTENT_LENGTH.as_str()),
                    body,
                });
            }

            if attempts > self.max_retries {
                return Err(HarvestError::RateLimit {
                    url: url.to_string(),
                    attempts,
                });
            }

            let wait = rate_limit_wait(&headers, chrono::Utc::now().timestamp(), self.margin);
            warn!(
                "Rate limited on {} (attempt {}), waiting {}s",
                url,
                attempts,
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;
        }
    }
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }

    status == StatusCode::FORBIDDEN
        && (header_number(headers, "x-ratelimit-remaining") == Some(0)
            || String::from_utf8_lossy(body)
                .to_lowercase()
                .contains("rate limit exceeded"))
}

fn rate_limit_wait(headers: &HeaderMap, now: i64, margin: Duration) -> Duration {
    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0);

    Duration::from_secs((reset - now).max(0) as u64) + margin
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn client_for(server: &mockito::ServerGuard) -> GitHubClient {
        GitHubClient::new(server.url(), Some("secret".to_string()))
            .unwrap()
            .with_rate_limit(2, Duration::ZERO)
    }

    #[test]
    fn test_rate_limit_wait_uses_reset_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1100"));

        let wait = rate_limit_wait(&headers, 1000, Duration::from_secs(1));
        assert_eq!(wait, Duration::from_secs(101));

        let past = rate_limit_wait(&headers, 5000, Duration::from_secs(1));
        assert_eq!(past, Duration::from_secs(1));

        let missing = rate_limit_wait(&HeaderMap::new(), 5000, Duration::from_secs(2));
        assert_eq!(missing, Duration::from_secs(2));
    }

    #[test]
    fn test_rate_limit_detection() {
        let empty = HeaderMap::new();
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, &empty, b""));
        assert!(is_rate_limited(
            StatusCode::FORBIDDEN,
            &empty,
            b"{\"message\":\"API Rate Limit Exceeded for 10.0.0.1\"}"
        ));
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &empty, b"{\"message\":\"Forbidden\"}"));
        assert!(!is_rate_limited(StatusCode::OK, &empty, b"rate limit exceeded"));

        let mut exhausted = HeaderMap::new();
        exhausted.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert!(is_rate_limited(StatusCode::FORBIDDEN, &exhausted, b""));
    }

    #[tokio::test]
    async fn test_retries_once_after_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("GET", "/repos/o/r/git/trees/abc123")
            .with_status(403)
            .with_header("x-ratelimit-reset", "0")
            .with_body(r#"{"message":"API rate limit exceeded"}"#)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/repos/o/r/git/trees/abc123")
            .match_header("authorization", "token secret")
            .with_status(200)
            .with_body(r#"{"sha":"abc123","tree":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.tree_exists("o", "r", "abc123").await.unwrap());

        limited.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("GET", "/repos/o/r/git/trees/abc123")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.tree_exists("o", "r", "abc123").await.unwrap_err();

        assert!(matches!(err, HarvestError::RateLimit { attempts: 3, .. }));
        limited.assert_async().await;
    }

    #[tokio::test]
    async fn test_single_object_listing_is_wrapped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/o/r/contents/README.md")
            .match_query(mockito::Matcher::UrlEncoded("ref".into(), "main".into()))
            .with_status(200)
            .with_body(
                r#"{"name":"README.md","path":"README.md","type":"file","size":5,
                    "download_url":null,"url":"http://x/README.md"}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let entries = client
            .list_contents("o", "r", "README.md", Some("main"))
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::File);
        assert!(entries[0].download_url.is_none());
    }

    #[test]
    fn test_size_falls_back_to_body_length() {
        let chunked = ApiResponse {
            status: StatusCode::OK,
            content_length: None,
            body: vec![b'x'; 42],
        };
        assert_eq!(chunked.size(), 42);

        let advertised = ApiResponse {
            content_length: Some(7),
            ..chunked
        };
        assert_eq!(advertised.size(), 7);
    }

    #[tokio::test]
    async fn test_listing_path_segments_are_escaped() {
        let mut server = mockito::Server::new_async().await;
        let listing = server
            .mock("GET", "/repos/o/r/contents/docs/v1%23draft%3F/my%20dir")
            .with_body("[]")
            .create_async()
            .await;

        let entries = client_for(&server)
            .list_contents("o", "r", "docs/v1#draft?/my dir", None)
            .await
            .unwrap();

        assert!(entries.is_empty());
        listing.assert_async().await;
    }

    #[tokio::test]
    async fn test_branches_are_paginated() {
        let mut server = mockito::Server::new_async().await;
        let first_page: Vec<String> = (0..100)
            .map(|i| format!(r#"{{"name":"b{}"}}"#, i))
            .collect();
        server
            .mock("GET", "/repos/o/r/branches")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "1".into()))
            .with_body(format!("[{}]", first_page.join(",")))
            .create_async()
            .await;
        server
            .mock("GET", "/repos/o/r/branches")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "2".into()))
            .with_body(r#"[{"name":"feature/x"}]"#)
            .create_async()
            .await;

        let branches = client_for(&server).list_branches("o", "r").await.unwrap();
        assert_eq!(branches.len(), 101);
        assert_eq!(branches.last().map(String::as_str), Some("feature/x"));
    }
}
