// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Retry utilities for remote calls.
///
/// Retries are bounded by an attempt count and a wall-clock budget. Waits for
/// an exhausted quota are delegated to the shared [`RateLimitGovernor`];
/// every other retryable failure waits a constant delay.
use std::{future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::{
    governor::RateLimitGovernor,
    remote::{Remote, RemoteError},
};

/// Failures a policy is allowed to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn
{
    /// Only retry when the quota is exhausted.
    QuotaExhausted,
    /// Retry quota exhaustion, server errors, and transport failures.
    Transient,
}

impl RetryOn
{
    /// Returns `true` when `error` should be retried under this predicate.
    pub fn matches(self, error: &RemoteError,) -> bool
    {
        match self {
            Self::QuotaExhausted => error.is_quota_exhausted(),
            Self::Transient => error.is_transient(),
        }
    }
}

/// Bounds and predicate applied to one kind of remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy
{
    /// Maximum number of attempts, including the first (default: 3).
    pub max_attempts:       u32,
    /// Wall-clock budget across all attempts in seconds (default: 5400).
    pub max_elapsed_secs:   u64,
    /// Delay before retrying a non-quota failure in milliseconds
    /// (default: 5000).
    pub transient_delay_ms: u64,
    /// Failures that may be retried (default: transient).
    pub retry_on:           RetryOn,
}

impl Default for RetryPolicy
{
    fn default() -> Self
    {
        Self {
            max_attempts:       3,
            max_elapsed_secs:   90 * 60,
            transient_delay_ms: 5000,
            retry_on:           RetryOn::Transient,
        }
    }
}

impl RetryPolicy
{
    /// Policy used for repository search: quota exhaustion only.
    pub fn discovery() -> Self
    {
        Self {
            max_attempts: 10, retry_on: RetryOn::QuotaExhausted, ..Self::default()
        }
    }

    /// Policy used to resolve the latest commit.
    pub fn commit() -> Self
    {
        Self {
            max_attempts: 2, max_elapsed_secs: 60 * 60, ..Self::default()
        }
    }

    /// Policy used to resolve the recursive tree.
    pub fn tree() -> Self
    {
        Self::default()
    }

    /// Policy used to fetch documentation content.
    pub fn content() -> Self
    {
        Self::default()
    }

    pub fn max_elapsed(&self,) -> Duration
    {
        Duration::from_secs(self.max_elapsed_secs,)
    }

    pub fn transient_delay(&self,) -> Duration
    {
        Duration::from_millis(self.transient_delay_ms,)
    }
}

/// Runs remote operations under a [`RetryPolicy`], cooperating with the
/// shared [`RateLimitGovernor`].
#[derive(Debug, Clone,)]
pub struct RetryExecutor
{
    governor: Arc<RateLimitGovernor,>,
}

impl RetryExecutor
{
    pub fn new(governor: Arc<RateLimitGovernor,>,) -> Self
    {
        Self {
            governor,
        }
    }

    /// Executes `operation` until it succeeds, fails permanently, or the
    /// policy bounds are exceeded.
    ///
    /// Before each attempt the executor waits for any pause recorded by the
    /// governor. The quota reported by every attempt, failed or not, is
    /// recorded with the governor before the error is returned, so an
    /// exhausted quota on the last attempt still pauses the next caller.
    ///
    /// # Arguments
    ///
    /// * `policy` - Attempt and time bounds plus the retry predicate
    /// * `operation_name` - Name of the operation for logging
    /// * `operation` - Async function performing one remote call
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last retryable error
    /// once the attempt or time budget is exhausted.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use qoda::{QuotaStatus, RateLimitGovernor, Remote, RemoteError, RetryExecutor, RetryPolicy};
    ///
    /// # async fn example() -> Result<(), RemoteError> {
    /// let executor = RetryExecutor::new(Arc::new(RateLimitGovernor::new(),),);
    /// let value = executor
    ///     .execute(&RetryPolicy::default(), "fetch data", || async {
    ///         Ok::<_, RemoteError,>(Remote::new(42, QuotaStatus::unlimited(),),)
    ///     },)
    ///     .await?;
    /// assert_eq!(value, 42);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute<F, Fut, T,>(
        &self,
        policy: &RetryPolicy,
        operation_name: &str,
        operation: F,
    ) -> Result<T, RemoteError,>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Remote<T,>, RemoteError,>,>,
    {
        self.execute_remote(policy, operation_name, operation,).await.map(|remote| remote.value,)
    }

    /// Same as [`RetryExecutor::execute`] but keeps the quota reported by the
    /// successful call.
    ///
    /// # Errors
    ///
    /// See [`RetryExecutor::execute`].
    pub async fn execute_remote<F, Fut, T,>(
        &self,
        policy: &RetryPolicy,
        operation_name: &str,
        mut operation: F,
    ) -> Result<Remote<T,>, RemoteError,>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Remote<T,>, RemoteError,>,>,
    {
        let max_attempts = policy.max_attempts.max(1,);
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            self.governor.wait_until_ready().await;

            match operation().await {
                Ok(remote,) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation_name, attempt);
                    }
                    self.governor.observe(&remote.quota,).await;
                    return Ok(remote,);
                }
                Err(error,) => {
                    if let Some(quota,) = error.quota() {
                        self.governor.record(quota,).await;
                    }

                    if !policy.retry_on.matches(&error,) {
                        return Err(error,);
                    }

                    if attempt >= max_attempts {
                        warn!("{} failed after {} attempts: {}", operation_name, attempt, error);
                        return Err(error,);
                    }

                    if started.elapsed() >= policy.max_elapsed() {
                        warn!(
                            "{} gave up after {:?} ({} attempts): {}",
                            operation_name,
                            started.elapsed(),
                            attempt,
                            error
                        );
                        return Err(error,);
                    }

                    if error.is_quota_exhausted() {
                        warn!(
                            "{} hit the rate limit on attempt {}/{}",
                            operation_name, attempt, max_attempts
                        );
                    } else {
                        let delay = policy.transient_delay();
                        warn!(
                            "{} failed on attempt {}/{}: {}. Retrying in {:?}...",
                            operation_name, attempt, max_attempts, error, delay
                        );
                        sleep(delay,).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::remote::QuotaStatus;

    fn executor() -> RetryExecutor
    {
        RetryExecutor::new(Arc::new(RateLimitGovernor::new(),),)
    }

    fn exhausted(seconds: i64,) -> RemoteError
    {
        RemoteError::QuotaExhausted {
            quota: QuotaStatus::new(0, Utc::now() + TimeDelta::seconds(seconds,),),
        }
    }

    #[test]
    fn retry_policy_default_values()
    {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.max_elapsed(), Duration::from_secs(5400,));
        assert_eq!(policy.transient_delay(), Duration::from_secs(5,));
        assert_eq!(policy.retry_on, RetryOn::Transient);
    }

    #[test]
    fn per_call_policies_match_reference_budgets()
    {
        assert_eq!(RetryPolicy::commit().max_attempts, 2);
        assert_eq!(RetryPolicy::commit().max_elapsed_secs, 3600);
        assert_eq!(RetryPolicy::tree().max_attempts, 3);
        assert_eq!(RetryPolicy::discovery().retry_on, RetryOn::QuotaExhausted);
    }

    #[test]
    fn retry_on_quota_ignores_transport_errors()
    {
        let transport = RemoteError::transport("reset",);

        assert!(!RetryOn::QuotaExhausted.matches(&transport));
        assert!(RetryOn::Transient.matches(&transport));
        assert!(RetryOn::QuotaExhausted.matches(&exhausted(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_on_first_attempt()
    {
        let result = executor()
            .execute(&RetryPolicy::default(), "test", || async {
                Ok::<_, RemoteError,>(Remote::new(42, QuotaStatus::unlimited(),),)
            },)
            .await
            .expect("should succeed",);
        assert_eq!(result, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_is_a_bare_call()
    {
        let counter = Arc::new(AtomicU32::new(0,),);
        let calls = counter.clone();
        let policy = RetryPolicy {
            max_attempts: 1, ..RetryPolicy::default()
        };

        let result = executor()
            .execute(&policy, "test", move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst,);
                    Err::<Remote<i32,>, _,>(RemoteError::transport("down",),)
                }
            },)
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_transient_failures()
    {
        let counter = Arc::new(AtomicU32::new(0,),);
        let calls = counter.clone();

        let result = executor()
            .execute(&RetryPolicy::default(), "test", move || {
                let calls = calls.clone();
                async move {
                    let count = calls.fetch_add(1, Ordering::SeqCst,) + 1;
                    if count < 3 {
                        Err(RemoteError::server(502, "bad gateway",),)
                    } else {
                        Ok(Remote::new(42, QuotaStatus::unlimited(),),)
                    }
                }
            },)
            .await
            .expect("should succeed after retries",);

        assert_eq!(result, 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_returns_immediately()
    {
        let counter = Arc::new(AtomicU32::new(0,),);
        let calls = counter.clone();

        let result = executor()
            .execute(&RetryPolicy::default(), "test", move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst,);
                    Err::<Remote<i32,>, _,>(RemoteError::not_found("acme/widgets",),)
                }
            },)
            .await;

        assert!(result.expect_err("expected not found",).is_not_found());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_fails_after_max_attempts()
    {
        let counter = Arc::new(AtomicU32::new(0,),);
        let calls = counter.clone();
        let policy = RetryPolicy {
            max_attempts: 2, transient_delay_ms: 10, ..RetryPolicy::default()
        };

        let result = executor()
            .execute(&policy, "test", move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst,);
                    Err::<Remote<i32,>, _,>(RemoteError::transport("persistent failure",),)
                }
            },)
            .await;

        assert!(result.is_err(), "should fail after max attempts");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_when_time_budget_is_spent()
    {
        let counter = Arc::new(AtomicU32::new(0,),);
        let calls = counter.clone();
        let policy = RetryPolicy {
            max_attempts:       100,
            max_elapsed_secs:   10,
            transient_delay_ms: 4000,
            retry_on:           RetryOn::Transient,
        };

        let result = executor()
            .execute(&policy, "test", move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst,);
                    Err::<Remote<i32,>, _,>(RemoteError::transport("slow",),)
                }
            },)
            .await;

        assert!(result.is_err());
        // attempts at t=0s, 4s, 8s, 12s; the fourth failure is past the budget
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_exhaustion_waits_for_reset_before_next_call()
    {
        let counter = Arc::new(AtomicU32::new(0,),);
        let calls = counter.clone();
        let started = Instant::now();

        let result = executor()
            .execute(&RetryPolicy::discovery(), "search", move || {
                let calls = calls.clone();
                async move {
                    let count = calls.fetch_add(1, Ordering::SeqCst,) + 1;
                    if count <= 2 {
                        Err(exhausted(30,),)
                    } else {
                        Ok(Remote::new("page", QuotaStatus::unlimited(),),)
                    }
                }
            },)
            .await
            .expect("should succeed after the reset",);

        assert_eq!(result, "page");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(29,));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_on_success_pauses_the_caller()
    {
        let started = Instant::now();
        let reset = Utc::now() + TimeDelta::seconds(45,);

        let result = executor()
            .execute(&RetryPolicy::default(), "test", move || async move {
                Ok::<_, RemoteError,>(Remote::new(7, QuotaStatus::new(0, reset,),),)
            },)
            .await
            .expect("should succeed",);

        assert_eq!(result, 7);
        assert!(started.elapsed() >= Duration::from_secs(44,));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_on_last_attempt_pauses_the_next_call()
    {
        let governor = Arc::new(RateLimitGovernor::new(),);
        let executor = RetryExecutor::new(governor.clone(),);
        let policy = RetryPolicy {
            max_attempts: 1, ..RetryPolicy::discovery()
        };
        let started = Instant::now();

        let first = executor
            .execute(&policy, "search", || async { Err::<Remote<i32,>, _,>(exhausted(600,),) },)
            .await;

        assert!(first.expect_err("single attempt",).is_quota_exhausted());
        assert!(started.elapsed() < Duration::from_secs(1,));
        assert!(governor.paused_until().await.is_some());

        let called_at = executor
            .execute(&policy, "search", move || async move {
                Ok::<_, RemoteError,>(Remote::new(started.elapsed(), QuotaStatus::unlimited(),),)
            },)
            .await
            .expect("should succeed after the reset",);

        assert!(called_at >= Duration::from_secs(599,));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_on_time_budget_exit_pauses_the_next_call()
    {
        let governor = Arc::new(RateLimitGovernor::new(),);
        let executor = RetryExecutor::new(governor.clone(),);
        let policy = RetryPolicy {
            max_attempts: 5, max_elapsed_secs: 0, ..RetryPolicy::discovery()
        };

        let result = executor
            .execute(&policy, "search", || async { Err::<Remote<i32,>, _,>(exhausted(120,),) },)
            .await;

        assert!(result.is_err());
        assert!(governor.paused_until().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn quota_reported_with_non_retryable_error_is_recorded()
    {
        let governor = Arc::new(RateLimitGovernor::new(),);
        let executor = RetryExecutor::new(governor.clone(),);
        let reset = Utc::now() + TimeDelta::seconds(300,);
        let started = Instant::now();

        let missing = executor
            .execute(&RetryPolicy::content(), "content", move || async move {
                Err::<Remote<i32,>, _,>(
                    RemoteError::not_found("docs/guide.md",).with_quota(QuotaStatus::new(0, reset,),),
                )
            },)
            .await;

        assert!(missing.expect_err("missing file",).is_not_found());
        assert_eq!(governor.paused_until().await, Some(reset));

        executor
            .execute(&RetryPolicy::content(), "content", || async {
                Ok::<_, RemoteError,>(Remote::new((), QuotaStatus::unlimited(),),)
            },)
            .await
            .expect("should succeed after the reset",);

        assert!(started.elapsed() >= Duration::from_secs(299,));
    }

    #[tokio::test(start_paused = true)]
    async fn available_quota_on_error_does_not_pause()
    {
        let governor = Arc::new(RateLimitGovernor::new(),);
        let executor = RetryExecutor::new(governor.clone(),);

        let result = executor
            .execute(&RetryPolicy::content(), "content", || async {
                Err::<Remote<i32,>, _,>(
                    RemoteError::not_found("docs/guide.md",)
                        .with_quota(QuotaStatus::new(17, Utc::now() + TimeDelta::hours(1,),),),
                )
            },)
            .await;

        assert!(result.is_err());
        assert!(governor.paused_until().await.is_none());
    }
}
