// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Documentation quality harvesting for popular open-source repositories.
//!
//! The library discovers repositories above a popularity threshold, selects
//! their documentation files by extension, scores those files for
//! readability, and collects one [`ProjectRecord`] per repository. All remote
//! access goes through the [`SourceHost`] trait; [`GitHubHost`] implements it
//! for the GitHub REST API. Calls are retried under a [`RetryPolicy`] and
//! paused by a shared [`RateLimitGovernor`] whenever the quota runs out.

mod aggregate;
mod config;
mod discover;
mod error;
mod filter;
mod github;
mod governor;
mod harvest;
mod output;
mod readability;
mod remote;
mod retry;
#[cfg(test)]
mod testing;

pub use aggregate::{READABILITY_SENTINEL, Readability, ReadabilityAggregator, decode_content, fold_scores};
pub use config::{HarvestConfig, RetrySettings, load_config, parse_config};
pub use discover::{RepositoryDiscoverer, SEARCH_PAGE_LIMIT, search_query};
pub use error::{Error, io_error, output_error};
pub use filter::{DocumentationSelection, normalize_extension, select_documentation};
pub use github::{GitHubHost, ResponseHeaders, classify_failure, page_param};
pub use governor::RateLimitGovernor;
pub use harvest::Harvester;
pub use output::{ProjectRecord, write_records};
pub use readability::{GunningFog, ReadabilityScorer, TextStats, count_syllables};
pub use remote::{
    QuotaStatus, Remote, RemoteError, RepositorySummary, SearchPage, SourceHost, TreeEntry,
};
pub use retry::{RetryExecutor, RetryOn, RetryPolicy};
