// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Suspends remote calls while the service quota is exhausted.
//!
//! A single governor is shared by every worker so that one observation of an
//! exhausted quota pauses all of them until the service-reported reset
//! instant. The reset clock of the service is authoritative: there is no
//! backoff schedule here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, info};

use crate::remote::QuotaStatus;

/// Shared view of the remote quota.
#[derive(Debug, Default,)]
pub struct RateLimitGovernor
{
    resume_at: Mutex<Option<DateTime<Utc,>,>,>,
}

impl RateLimitGovernor
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Inspects the quota returned by a remote call.
    ///
    /// When the quota is exhausted the pause is recorded for every worker and
    /// the caller is suspended until the reset instant.
    pub async fn observe(&self, quota: &QuotaStatus,)
    {
        if self.record(quota,).await {
            self.wait_until_ready().await;
        }
    }

    /// Records the pause of an exhausted quota without waiting for it.
    ///
    /// The next [`wait_until_ready`](Self::wait_until_ready) of any caller
    /// sleeps until the reset. Returns whether a pause was recorded.
    pub async fn record(&self, quota: &QuotaStatus,) -> bool
    {
        if !quota.is_exhausted() {
            return false;
        }

        {
            let mut resume_at = self.resume_at.lock().await;
            let next = match *resume_at {
                Some(current,) if current > quota.reset => current,
                _ => quota.reset,
            };
            *resume_at = Some(next,);
        }

        info!(
            "Rate limit reached ({} remaining), pausing until {} ({:?})",
            quota.remaining,
            quota.reset.to_rfc3339(),
            wait_duration(quota.reset, Utc::now(),)
        );
        true
    }

    /// Waits until any recorded pause has elapsed.
    pub async fn wait_until_ready(&self,)
    {
        let target = match *self.resume_at.lock().await {
            Some(target,) => target,
            None => return,
        };

        let wait = wait_duration(target, Utc::now(),);
        if !wait.is_zero() {
            debug!("Waiting {:?} for rate limit reset", wait);
            sleep(wait,).await;
        }

        let mut resume_at = self.resume_at.lock().await;
        if *resume_at == Some(target,) {
            *resume_at = None;
        }
    }

    /// Instant until which calls are currently paused.
    pub async fn paused_until(&self,) -> Option<DateTime<Utc,>,>
    {
        *self.resume_at.lock().await
    }
}

/// Time left until `reset`, clamped at zero for instants in the past.
pub fn wait_duration(reset: DateTime<Utc,>, now: DateTime<Utc,>,) -> Duration
{
    (reset - now).to_std().unwrap_or(Duration::ZERO,)
}
