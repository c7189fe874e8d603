// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Discovers popular repositories through the repository search endpoint.
///
/// Pages through results ordered by most recent update until the requested
/// sample size is collected or the result set is exhausted.
use std::{collections::HashSet, sync::Arc};

use tracing::{debug, info};

use crate::{
    error::Error,
    remote::{RepositorySummary, SourceHost},
    retry::{RetryExecutor, RetryPolicy},
};

/// Largest page size accepted by the search endpoint.
pub const SEARCH_PAGE_LIMIT: u32 = 100;

/// Builds the popularity query for repositories with at least `min_stars`.
pub fn search_query(min_stars: u64,) -> String
{
    format!("stars:>={min_stars}")
}

/// Collects a sample of repositories meeting a popularity threshold.
pub struct RepositoryDiscoverer<H: ?Sized,>
{
    host:     Arc<H,>,
    executor: RetryExecutor,
    policy:   RetryPolicy,
}

impl<H,> RepositoryDiscoverer<H,>
where
    H: SourceHost + ?Sized,
{
    pub fn new(host: Arc<H,>, executor: RetryExecutor, policy: RetryPolicy,) -> Self
    {
        Self {
            host,
            executor,
            policy,
        }
    }

    /// Returns up to `target` distinct repositories with at least `min_stars`
    /// stars, in the order reported by the search endpoint.
    ///
    /// The page size is fixed for the whole run so that page offsets stay
    /// consistent; the final page is truncated to the remaining count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] when a search call fails for any reason
    /// other than a quota exhaustion that the retry policy can wait out, and
    /// [`Error::NoRepositories`] when nothing matched.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use qoda::{GitHubHost, RateLimitGovernor, RepositoryDiscoverer, RetryExecutor, RetryPolicy};
    ///
    /// # async fn example() -> Result<(), qoda::Error> {
    /// let host = Arc::new(GitHubHost::new("ghp_token")?);
    /// let executor = RetryExecutor::new(Arc::new(RateLimitGovernor::new()));
    /// let discoverer = RepositoryDiscoverer::new(host, executor, RetryPolicy::discovery());
    /// let repositories = discoverer.discover(150, 10).await?;
    /// for repository in repositories {
    ///     println!("{}", repository.full_name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn discover(
        &self,
        min_stars: u64,
        target: usize,
    ) -> Result<Vec<RepositorySummary,>, Error,>
    {
        let query = search_query(min_stars,);
        let per_page = target.clamp(1, SEARCH_PAGE_LIMIT as usize,) as u32;

        let mut discovered = Vec::with_capacity(target,);
        let mut seen = HashSet::with_capacity(target,);
        let mut page = 1u32;

        while discovered.len() < target {
            let current = page;
            let result = self
                .executor
                .execute_remote(&self.policy, &format!("repository search page {current}"), || {
                    self.host.search_repositories(&query, current, per_page,)
                },)
                .await
                .map_err(|source| Error::Discovery {
                    source,
                },)?;

            let quota = result.quota;
            let page_result = result.value;
            let received = page_result.items.len();

            for summary in page_result.items {
                if discovered.len() >= target {
                    break;
                }
                if seen.insert(summary.full_name.clone(),) {
                    discovered.push(summary,);
                } else {
                    debug!("Skipping duplicate search result {}", summary.full_name);
                }
            }

            info!(
                "Retrieved {} repositories, {} requests left, {} repositories left",
                received,
                quota.remaining,
                target - discovered.len()
            );

            match page_result.next_page {
                Some(next,) if next > current && received > 0 => page = next,
                _ => break,
            }
        }

        if discovered.is_empty() {
            return Err(Error::NoRepositories,);
        }

        info!("Discovered {} repositories with at least {} stars", discovered.len(), min_stars);
        Ok(discovered,)
    }
}
