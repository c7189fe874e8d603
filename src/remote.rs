#![allow(non_shorthand_field_patterns)]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Data model exchanged with the source-hosting service and the trait that
//! abstracts it.
//!
//! Every successful remote call yields a [`Remote`] value carrying the quota
//! reported alongside the payload. Failures are classified into
//! [`RemoteError`] so callers can decide between waiting, retrying, skipping,
//! or aborting without inspecting transport details.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remaining call budget reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct QuotaStatus
{
    /// Calls left in the current window.
    pub remaining: u32,
    /// Absolute instant at which the window resets.
    pub reset:     DateTime<Utc,>,
}

impl QuotaStatus
{
    /// Creates a quota descriptor.
    pub fn new(remaining: u32, reset: DateTime<Utc,>,) -> Self
    {
        Self {
            remaining,
            reset,
        }
    }

    /// Descriptor used when the service did not report any quota headers.
    pub fn unlimited() -> Self
    {
        Self {
            remaining: u32::MAX, reset: Utc::now(),
        }
    }

    /// Returns `true` when no calls are left before [`QuotaStatus::reset`].
    pub fn is_exhausted(&self,) -> bool
    {
        self.remaining == 0
    }
}

impl fmt::Display for QuotaStatus
{
    fn fmt(&self, f: &mut fmt::Formatter<'_,>,) -> fmt::Result
    {
        write!(f, "{} remaining, resets at {}", self.remaining, self.reset.to_rfc3339())
    }
}

/// Payload of a successful remote call plus the quota reported with it.
#[derive(Debug, Clone, PartialEq,)]
pub struct Remote<T,>
{
    pub value: T,
    pub quota: QuotaStatus,
}

impl<T,> Remote<T,>
{
    pub fn new(value: T, quota: QuotaStatus,) -> Self
    {
        Self {
            value,
            quota,
        }
    }

}

/// Classified failure of a single remote call.
#[derive(Debug, Clone, masterror::Error)]
pub enum RemoteError
{
    /// The quota for the current window is used up.
    #[error("rate limit exhausted ({quota})")]
    QuotaExhausted
    {
        /// Quota reported with the failing response.
        quota: QuotaStatus,
    },
    /// The requested resource does not exist (or is not visible).
    #[error("not found: {resource}")]
    NotFound
    {
        /// Description of the missing resource.
        resource: String,
        /// Quota reported with the response, if any.
        quota:    Option<QuotaStatus,>,
    },
    /// The service refused the request; retrying will not help.
    #[error("request rejected with status {status}: {message}")]
    Rejected
    {
        /// HTTP status code.
        status:  u16,
        /// Message returned by the service.
        message: String,
        /// Quota reported with the response, if any.
        quota:   Option<QuotaStatus,>,
    },
    /// The service failed internally.
    #[error("server error {status}: {message}")]
    Server
    {
        /// HTTP status code.
        status:  u16,
        /// Message returned by the service.
        message: String,
        /// Quota reported with the response, if any.
        quota:   Option<QuotaStatus,>,
    },
    /// The request never produced a response.
    #[error("transport error: {message}")]
    Transport
    {
        /// Description of the transport failure.
        message: String,
    },
    /// The response body could not be interpreted.
    #[error("unexpected payload: {message}")]
    Payload
    {
        /// Description of the decoding failure.
        message: String,
    },
}

impl RemoteError
{
    pub fn not_found<M: Into<String,>,>(resource: M,) -> Self
    {
        Self::NotFound {
            resource: resource.into(), quota: None,
        }
    }

    pub fn rejected<M: Into<String,>,>(status: u16, message: M,) -> Self
    {
        Self::Rejected {
            status, message: message.into(), quota: None,
        }
    }

    pub fn server<M: Into<String,>,>(status: u16, message: M,) -> Self
    {
        Self::Server {
            status, message: message.into(), quota: None,
        }
    }

    pub fn transport<M: Into<String,>,>(message: M,) -> Self
    {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn payload<M: Into<String,>,>(message: M,) -> Self
    {
        Self::Payload {
            message: message.into(),
        }
    }

    /// Attaches the quota reported with a failed response.
    ///
    /// Transport and payload errors never carry a quota and are returned
    /// unchanged.
    pub fn with_quota(mut self, reported: QuotaStatus,) -> Self
    {
        match &mut self {
            Self::QuotaExhausted {
                quota,
            } => *quota = reported,
            Self::NotFound {
                quota, ..
            }
            | Self::Rejected {
                quota, ..
            }
            | Self::Server {
                quota, ..
            } => *quota = Some(reported,),
            Self::Transport { .. } | Self::Payload { .. } => {}
        }
        self
    }

    /// Returns `true` for [`RemoteError::QuotaExhausted`].
    pub fn is_quota_exhausted(&self,) -> bool
    {
        matches!(self, Self::QuotaExhausted { .. })
    }

    /// Returns `true` for [`RemoteError::NotFound`].
    pub fn is_not_found(&self,) -> bool
    {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` when repeating the call may succeed.
    ///
    /// Not-found, rejected, and payload errors reproduce deterministically
    /// and are never transient.
    pub fn is_transient(&self,) -> bool
    {
        matches!(self, Self::QuotaExhausted { .. } | Self::Server { .. } | Self::Transport { .. })
    }

    /// Quota reported with the failing response, if the service sent one.
    pub fn quota(&self,) -> Option<&QuotaStatus,>
    {
        match self {
            Self::QuotaExhausted {
                quota,
            } => Some(quota,),
            Self::NotFound {
                quota, ..
            }
            | Self::Rejected {
                quota, ..
            }
            | Self::Server {
                quota, ..
            } => quota.as_ref(),
            Self::Transport { .. } | Self::Payload { .. } => None,
        }
    }
}

/// Immutable snapshot of a repository returned by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct RepositorySummary
{
    pub owner:          String,
    pub name:           String,
    /// `owner/name` as reported by the service.
    pub full_name:      String,
    pub default_branch: String,
    pub stars:          u64,
    pub forks:          u64,
}

/// Single entry of a recursive repository tree.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct TreeEntry
{
    /// Path relative to the repository root.
    pub path:    String,
    /// Declared byte size; absent for directories and submodules.
    pub size:    Option<u64,>,
    /// Base64 transport content once fetched or when embedded by the service.
    pub content: Option<String,>,
}

impl TreeEntry
{
    /// Creates a blob entry without embedded content.
    pub fn blob<P: Into<String,>,>(path: P, size: u64,) -> Self
    {
        Self {
            path: path.into(), size: Some(size,), content: None,
        }
    }

    /// Creates an entry without a declared size (directory or submodule).
    pub fn unsized_entry<P: Into<String,>,>(path: P,) -> Self
    {
        Self {
            path: path.into(), size: None, content: None,
        }
    }
}

/// One page of repository search results.
#[derive(Debug, Clone, PartialEq, Eq, Default,)]
pub struct SearchPage
{
    pub items:     Vec<RepositorySummary,>,
    /// Page number to request next, `None` when the result set is exhausted.
    pub next_page: Option<u32,>,
}

/// Operations consumed from the source-hosting service.
///
/// Implementations report the quota with every response, including failed
/// ones through [`RemoteError::quota`]. A missing resource must be
/// reported as [`RemoteError::NotFound`], never as a transient failure.
#[async_trait]
pub trait SourceHost: Send + Sync
{
    /// Searches repositories matching `query`, ordered by most recent update.
    async fn search_repositories(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Remote<SearchPage,>, RemoteError,>;

    /// Resolves the SHA of the latest commit on `branch`.
    async fn latest_commit(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Remote<String,>, RemoteError,>;

    /// Fetches the full recursive tree at `sha`.
    async fn tree(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Remote<Vec<TreeEntry,>,>, RemoteError,>;

    /// Fetches the base64 transport content of a single file.
    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Remote<String,>, RemoteError,>;

    /// Fetches the base64 content of the repository README, `None` when the
    /// repository has none.
    async fn readme(&self, owner: &str, repo: &str,)
    -> Result<Remote<Option<String,>,>, RemoteError,>;
}
