//! GitHub REST v3 implementation of [`HostingApi`].
//!
//! https://docs.github.com/en/rest/commits/commits

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GithubConfig;
use crate::hosting::{BranchRef, HostingApi};
use crate::reqwest_simd_json::ResponseSimdJsonExt;
use crate::types::{AuthorIdentity, Branch, CommitRecord, FileStat};

const PER_PAGE: u32 = 100;

pub struct GithubClient {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Deserialize)]
struct ApiBranch {
    name: String,
    commit: ApiCommitPointer,
}

#[derive(Deserialize)]
struct ApiCommitPointer {
    sha: String,
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
    /// The linked GitHub account; null when the author email matches no user.
    author: Option<ApiUser>,
    #[serde(default)]
    files: Option<Vec<FileStat>>,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    author: Option<ApiSignature>,
}

#[derive(Deserialize)]
struct ApiSignature {
    date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ApiUser {
    login: Option<String>,
}

impl ApiCommit {
    fn authored_at(&self) -> Result<DateTime<Utc>> {
        self.commit
            .author
            .as_ref()
            .map(|a| a.date)
            .with_context(|| format!("commit {} has no author date", self.sha))
    }

    fn into_record(self) -> Result<CommitRecord> {
        let authored_at = self.authored_at()?;
        Ok(CommitRecord {
            author: AuthorIdentity::from_login(self.author.and_then(|u| u.login)),
            sha: self.sha,
            authored_at,
        })
    }
}

/// Pull the `rel="next"` target out of a `Link` header.
fn next_page_url(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().trim_start_matches("rel=").trim_matches('"') == "next");
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

fn iso8601(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        if !config.token.is_empty() {
            let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
                .context("GitHub token contains invalid characters")?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("repopulse/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T>(&self, url: &str, what: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("{what}: request failed"))?;
        response.checked_simd_json(what).await
    }

    /// Follow `Link: rel="next"` until the listing is exhausted.
    async fn get_all_pages<T>(&self, first_url: String, what: &str) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next.take() {
            debug!(%url, "GET");
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("{what}: request failed"))?;
            next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_page_url);
            let page: Vec<T> = response.checked_simd_json(what).await?;
            items.extend(page);
        }

        Ok(items)
    }

    async fn get_commit(&self, repo: &str, sha: &str) -> Result<ApiCommit> {
        let url = format!("{}/repos/{}/commits/{}", self.api_url, repo, sha);
        self.get_json(&url, &format!("commit {sha}")).await
    }
}

#[async_trait]
impl HostingApi for GithubClient {
    fn display_name(&self) -> &'static str {
        "GitHub"
    }

    async fn resolve_repository(&self, repo: &str) -> Result<()> {
        let url = format!("{}/repos/{}", self.api_url, repo);
        let _: serde::de::IgnoredAny = self.get_json(&url, &format!("repository {repo}")).await?;
        Ok(())
    }

    async fn list_branches(&self, repo: &str) -> Result<Vec<BranchRef>> {
        let url = format!(
            "{}/repos/{}/branches?per_page={}",
            self.api_url, repo, PER_PAGE
        );
        let branches: Vec<ApiBranch> = self.get_all_pages(url, "branch listing").await?;
        Ok(branches
            .into_iter()
            .map(|b| BranchRef {
                name: b.name,
                tip_sha: b.commit.sha,
            })
            .collect())
    }

    async fn branch_tip(&self, repo: &str, branch: &BranchRef) -> Result<Branch> {
        let commit = self.get_commit(repo, &branch.tip_sha).await?;
        Ok(Branch {
            name: branch.name.clone(),
            tip_date: commit.authored_at()?,
            tip_sha: commit.sha,
        })
    }

    async fn list_commits(
        &self,
        repo: &str,
        starting_at: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CommitRecord>> {
        let url = format!(
            "{}/repos/{}/commits?sha={}&since={}&until={}&per_page={}",
            self.api_url,
            repo,
            starting_at,
            iso8601(since),
            iso8601(until),
            PER_PAGE
        );
        let commits: Vec<ApiCommit> = self
            .get_all_pages(url, &format!("commits from {starting_at}"))
            .await?;
        Ok(commits
            .into_iter()
            .filter_map(|commit| match commit.into_record() {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping commit: {e:#}");
                    None
                }
            })
            .collect())
    }

    async fn list_changed_files(&self, repo: &str, sha: &str) -> Result<Vec<FileStat>> {
        let commit = self.get_commit(repo, sha).await?;
        Ok(commit.files.unwrap_or_default())
    }
}
