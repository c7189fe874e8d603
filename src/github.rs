// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! GitHub REST implementation of [`SourceHost`].
//!
//! Requests go through octocrab's raw `_get` so that the rate-limit headers of
//! every call, successful or not, can be turned into a [`QuotaStatus`].
//! Successful bodies are decoded with octocrab's own response models
//! ([`Page`], [`Repository`], [`Content`]) through [`FromResponse`].

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use masterror::AppError;
use octocrab::{
    FromResponse, Octocrab, Page,
    models::{Repository, repos::Content},
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    discover::SEARCH_PAGE_LIMIT,
    remote::{QuotaStatus, Remote, RemoteError, RepositorySummary, SearchPage, SourceHost, TreeEntry},
};

/// Wait applied to a `429` response that carries no reset information.
const DEFAULT_SECONDARY_WAIT_SECS: i64 = 60;

/// Rate-limit headers of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct ResponseHeaders
{
    pub remaining:   Option<String,>,
    pub reset:       Option<String,>,
    pub retry_after: Option<String,>,
}

impl ResponseHeaders
{
    /// Quota described by the `x-ratelimit-*` headers.
    ///
    /// Responses without the headers are treated as unlimited.
    pub fn quota(&self, now: DateTime<Utc,>,) -> QuotaStatus
    {
        self.reported_quota(now,).unwrap_or_else(|| QuotaStatus::new(u32::MAX, self.reset_at(now,),),)
    }

    /// Quota described by the headers, `None` when no remaining count was sent.
    pub fn reported_quota(&self, now: DateTime<Utc,>,) -> Option<QuotaStatus,>
    {
        self.remaining
            .as_deref()
            .and_then(|value| value.trim().parse::<u32>().ok(),)
            .map(|remaining| QuotaStatus::new(remaining, self.reset_at(now,),),)
    }

    /// Seconds requested by a `retry-after` header.
    pub fn retry_after(&self,) -> Option<i64,>
    {
        self.retry_after.as_deref().and_then(|value| value.trim().parse::<i64>().ok(),)
    }

    fn reset_at(&self, now: DateTime<Utc,>,) -> DateTime<Utc,>
    {
        self.reset
            .as_deref()
            .and_then(|value| value.trim().parse::<i64>().ok(),)
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0,),)
            .unwrap_or(now,)
    }
}

/// Reads the `page` parameter of a pagination link query.
///
/// # Examples
///
/// ```
/// assert_eq!(qoda::page_param("q=stars%3A%3E%3D150&per_page=50&page=3"), Some(3));
/// assert_eq!(qoda::page_param("q=stars&per_page=50"), None);
/// ```
pub fn page_param(query: &str,) -> Option<u32,>
{
    query
        .split('&',)
        .filter_map(|pair| pair.split_once('=',),)
        .find(|(key, _,)| *key == "page",)
        .and_then(|(_, value,)| value.parse().ok(),)
}

/// Percent-encodes a path or query value, keeping `/` separators.
pub fn encode_path(raw: &str,) -> String
{
    let mut encoded = String::with_capacity(raw.len(),);
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                encoded.push(byte as char,)
            }
            other => encoded.push_str(&format!("%{other:02X}"),),
        }
    }
    encoded
}

/// Maps a non-success response to a [`RemoteError`].
///
/// The quota reported by the headers travels with the error so that the
/// caller can pause even when the call itself is not retried.
pub fn classify_failure(
    status: u16,
    headers: &ResponseHeaders,
    now: DateTime<Utc,>,
    resource: &str,
    body: &str,
) -> RemoteError
{
    let error = match status {
        404 => RemoteError::not_found(resource,),
        403 | 429 => {
            let quota = headers.quota(now,);
            if quota.is_exhausted() {
                return RemoteError::QuotaExhausted {
                    quota,
                };
            }

            let secondary_wait = match (headers.retry_after(), status,) {
                (Some(seconds,), _,) => Some(seconds,),
                (None, 429,) => Some(DEFAULT_SECONDARY_WAIT_SECS,),
                (None, _,) => None,
            };

            match secondary_wait {
                Some(seconds,) => {
                    return RemoteError::QuotaExhausted {
                        quota: QuotaStatus::new(0, now + TimeDelta::seconds(seconds,),),
                    };
                }
                None => RemoteError::rejected(status, error_message(body,),),
            }
        }
        500..=599 => RemoteError::server(status, error_message(body,),),
        _ => RemoteError::rejected(status, error_message(body,),),
    };

    match headers.reported_quota(now,) {
        Some(quota,) => error.with_quota(quota,),
        None => error,
    }
}

/// Message of a GitHub error body, or the start of the raw body.
fn error_message(body: &str,) -> String
{
    #[derive(Deserialize,)]
    struct ErrorBody
    {
        message: String,
    }

    match serde_json::from_str::<ErrorBody,>(body,) {
        Ok(parsed,) => parsed.message,
        Err(_,) => body.chars().take(200,).collect(),
    }
}

/// Commit reference; octocrab's `RepoCommit` requires the full commit payload.
#[derive(Debug, Deserialize,)]
struct CommitRef
{
    sha: String,
}

/// Recursive git tree, which octocrab does not model.
#[derive(Debug, Deserialize,)]
struct GitTree
{
    tree:      Vec<GitTreeItem,>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize,)]
struct GitTreeItem
{
    path: String,
    #[serde(rename = "type")]
    kind: String,
    size: Option<u64,>,
}

fn summarize(repository: Repository,) -> RepositorySummary
{
    let login = repository.owner.map(|owner| owner.login,);
    let full_name = repository.full_name.unwrap_or_else(|| match &login {
        Some(login,) => format!("{login}/{}", repository.name),
        None => repository.name.clone(),
    },);
    let owner = login
        .or_else(|| full_name.split_once('/',).map(|(owner, _,)| owner.to_owned(),),)
        .unwrap_or_default();

    RepositorySummary {
        owner,
        name: repository.name,
        full_name,
        default_branch: repository.default_branch.unwrap_or_else(|| "HEAD".to_owned(),),
        stars: repository.stargazers_count.map_or(0, u64::from,),
        forks: repository.forks_count.map_or(0, u64::from,),
    }
}

/// Builds a search page from decoded repositories and the query of the
/// `next` pagination link.
fn search_page(items: Vec<Repository,>, next_query: Option<&str,>,) -> SearchPage
{
    SearchPage {
        items:     items.into_iter().map(summarize,).collect(),
        next_page: next_query.and_then(page_param,),
    }
}

/// Tree entries in listing order; only blobs keep their declared size.
fn tree_entries(tree: GitTree, resource: &str,) -> Vec<TreeEntry,>
{
    if tree.truncated {
        warn!("Tree of {} was truncated by the service; using the partial listing", resource);
    }

    tree.tree
        .into_iter()
        .map(|item| TreeEntry {
            size:    if item.kind == "blob" { item.size } else { None },
            path:    item.path,
            content: None,
        },)
        .collect()
}

/// Base64 payload of a contents response.
fn base64_payload(content: Content, resource: &str,) -> Result<String, RemoteError,>
{
    match content.encoding.as_deref() {
        Some("base64",) => Ok(content.content.unwrap_or_default(),),
        other => Err(RemoteError::payload(format!(
            "{resource} is served with encoding '{}' instead of base64",
            other.unwrap_or("none")
        ),),),
    }
}

/// [`SourceHost`] backed by the GitHub REST API.
#[derive(Clone,)]
pub struct GitHubHost
{
    client: Octocrab,
}

impl GitHubHost
{
    /// Creates a host authenticated with a personal access token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] when the client cannot be initialized.
    pub fn new(token: &str,) -> Result<Self, AppError,>
    {
        let client = Octocrab::builder().personal_token(token,).build().map_err(|e| {
            AppError::unauthorized(format!("failed to initialize GitHub client: {e}"),)
        },)?;

        Ok(Self {
            client,
        },)
    }

    /// Wraps an already configured client.
    pub fn from_client(client: Octocrab,) -> Self
    {
        Self {
            client,
        }
    }

    /// Issues a GET request and decodes a successful body as `T`.
    ///
    /// Failed responses are classified with their rate-limit headers.
    async fn get<T,>(&self, route: &str, resource: &str,) -> Result<Remote<T,>, RemoteError,>
    where
        T: FromResponse + Send,
    {
        debug!("GET {}", route);
        let response = self
            .client
            ._get(route,)
            .await
            .map_err(|e| RemoteError::transport(format!("GET {route} failed: {e}"),),)?;

        let status = response.status();
        let header = |name: &str| {
            response.headers().get(name,).and_then(|value| value.to_str().ok(),).map(str::to_owned,)
        };
        let headers = ResponseHeaders {
            remaining:   header("x-ratelimit-remaining",),
            reset:       header("x-ratelimit-reset",),
            retry_after: header("retry-after",),
        };
        let now = Utc::now();

        if !status.is_success() {
            let body = match self.client.body_to_string(response,).await {
                Ok(body,) => body,
                Err(error,) => {
                    debug!("Failed to read error body of GET {}: {}", route, error);
                    String::new()
                }
            };
            return Err(classify_failure(status.as_u16(), &headers, now, resource, &body,),);
        }

        let value = T::from_response(response,)
            .await
            .map_err(|e| RemoteError::payload(format!("invalid response for {resource}: {e}"),),)?;
        Ok(Remote::new(value, headers.quota(now,),),)
    }
}

#[async_trait]
impl SourceHost for GitHubHost
{
    async fn search_repositories(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Remote<SearchPage,>, RemoteError,>
    {
        let per_page = per_page.clamp(1, SEARCH_PAGE_LIMIT,);
        let route = format!(
            "/search/repositories?q={}&sort=updated&order=desc&per_page={per_page}&page={page}",
            encode_path(query)
        );

        let Remote {
            value: results,
            quota,
        } = self.get::<Page<Repository,>,>(&route, "repository search",).await?;
        let next_query = results.next.as_ref().and_then(|uri| uri.query(),);
        let page = search_page(results.items, next_query,);
        Ok(Remote::new(page, quota,),)
    }

    async fn latest_commit(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Remote<String,>, RemoteError,>
    {
        let route = format!("/repos/{owner}/{repo}/commits/{}", encode_path(branch));
        let resource = format!("{owner}/{repo}@{branch}");

        let commit = self.get::<CommitRef,>(&route, &resource,).await?;
        Ok(Remote::new(commit.value.sha, commit.quota,),)
    }

    async fn tree(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Remote<Vec<TreeEntry,>,>, RemoteError,>
    {
        let route = format!("/repos/{owner}/{repo}/git/trees/{sha}?recursive=1");
        let resource = format!("{owner}/{repo} tree {sha}");

        let tree = self.get::<GitTree,>(&route, &resource,).await?;
        Ok(Remote::new(tree_entries(tree.value, &resource,), tree.quota,),)
    }

    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Remote<String,>, RemoteError,>
    {
        let route = format!("/repos/{owner}/{repo}/contents/{}", encode_path(path));
        let resource = format!("{owner}/{repo}:{path}");

        let content = self.get::<Content,>(&route, &resource,).await?;
        Ok(Remote::new(base64_payload(content.value, &resource,)?, content.quota,),)
    }

    async fn readme(&self, owner: &str, repo: &str,)
    -> Result<Remote<Option<String,>,>, RemoteError,>
    {
        let route = format!("/repos/{owner}/{repo}/readme");
        let resource = format!("{owner}/{repo} README");

        match self.get::<Content,>(&route, &resource,).await {
            Ok(content,) => {
                Ok(Remote::new(Some(base64_payload(content.value, &resource,)?,), content.quota,),)
            }
            Err(RemoteError::NotFound {
                quota, ..
            },) => Ok(Remote::new(None, quota.unwrap_or_else(QuotaStatus::unlimited,),),),
            Err(error,) => Err(error,),
        }
    }
}
