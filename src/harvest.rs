// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// End-to-end harvest of discovered repositories.
///
/// Each repository goes through commit resolution, tree resolution,
/// documentation filtering and readability aggregation. Repositories whose
/// commit or tree cannot be resolved are dropped; everything else yields one
/// [`ProjectRecord`]. Records are returned in discovery order regardless of
/// the configured concurrency.
use std::{future::Future, sync::Arc};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, info, warn};

use crate::{
    aggregate::ReadabilityAggregator,
    config::HarvestConfig,
    discover::RepositoryDiscoverer,
    error::Error,
    filter::select_documentation,
    governor::RateLimitGovernor,
    output::ProjectRecord,
    readability::ReadabilityScorer,
    remote::{RepositorySummary, SourceHost},
    retry::RetryExecutor,
};

type Outcome = (usize, Result<Option<ProjectRecord,>, Error,>,);

/// Per-repository pipeline shared by all workers.
struct Pipeline<H: ?Sized,>
{
    config:     Arc<HarvestConfig,>,
    host:       Arc<H,>,
    executor:   RetryExecutor,
    aggregator: ReadabilityAggregator<H,>,
}

impl<H,> Pipeline<H,>
where
    H: SourceHost + ?Sized,
{
    /// Harvests one repository; `Ok(None)` when it was skipped.
    async fn process(&self, summary: &RepositorySummary,) -> Result<Option<ProjectRecord,>, Error,>
    {
        let owner = summary.owner.as_str();
        let repo = summary.name.as_str();
        let retry = &self.config.retry;

        let sha = match self
            .executor
            .execute(&retry.commit, &format!("latest commit of {}", summary.full_name), || {
                self.host.latest_commit(owner, repo, &summary.default_branch,)
            },)
            .await
        {
            Ok(sha,) => sha,
            Err(error,) => {
                warn!(
                    "Skipping {}: failed to resolve latest commit on {}: {}",
                    summary.full_name, summary.default_branch, error
                );
                return Ok(None,);
            }
        };

        let tree = match self
            .executor
            .execute(&retry.tree, &format!("tree of {}", summary.full_name), || {
                self.host.tree(owner, repo, &sha,)
            },)
            .await
        {
            Ok(tree,) => tree,
            Err(error,) => {
                warn!("Skipping {}: failed to get tree at {}: {}", summary.full_name, sha, error);
                return Ok(None,);
            }
        };

        let mut selection = select_documentation(&tree, &self.config.doc_extensions,);
        debug!(
            "{} has {} documentation files out of {} tree entries",
            summary.full_name,
            selection.entries.len(),
            tree.len()
        );

        let readability = if selection.is_empty() && self.config.readme_fallback {
            self.aggregator.aggregate_readme(owner, repo,).await?
        } else {
            self.aggregator.aggregate(owner, repo, &mut selection.entries,).await?
        };

        let record = ProjectRecord {
            name:        summary.full_name.clone(),
            forks:       summary.forks,
            total_bytes: selection.total_bytes,
            readability: readability.value(),
        };
        info!(
            "Processed {}: {} bytes of documentation, readability {:.2}",
            record.name, record.total_bytes, record.readability
        );

        Ok(Some(record,),)
    }
}

/// Drives discovery and the per-repository pipeline.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use qoda::{GitHubHost, GunningFog, HarvestConfig, Harvester, write_records};
///
/// # async fn example() -> Result<(), qoda::Error> {
/// let config = HarvestConfig::default().validate()?;
/// let host = Arc::new(GitHubHost::new("ghp_token")?);
/// let harvester = Harvester::new(config, host, Arc::new(GunningFog));
///
/// let records = harvester.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
/// write_records(&harvester.config().output, &records, false)?;
/// # Ok(())
/// # }
/// ```
pub struct Harvester<H: ?Sized,>
{
    pipeline: Arc<Pipeline<H,>,>,
    progress: ProgressBar,
}

impl<H,> Harvester<H,>
where
    H: SourceHost + ?Sized + 'static,
{
    /// Creates a harvester with its own rate-limit governor and a hidden
    /// progress bar.
    pub fn new(config: HarvestConfig, host: Arc<H,>, scorer: Arc<dyn ReadabilityScorer,>,) -> Self
    {
        let config = Arc::new(config,);
        let executor = RetryExecutor::new(Arc::new(RateLimitGovernor::new(),),);
        let aggregator = ReadabilityAggregator::new(
            Arc::clone(&host,),
            executor.clone(),
            scorer,
            config.retry.content.clone(),
            config.max_files_per_repo,
        );

        Self {
            pipeline: Arc::new(Pipeline {
                config,
                host,
                executor,
                aggregator,
            },),
            progress: ProgressBar::hidden(),
        }
    }

    /// Reports per-repository progress on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar,) -> Self
    {
        self.progress = progress;
        self
    }

    pub fn config(&self,) -> &HarvestConfig
    {
        &self.pipeline.config
    }

    /// Discovers repositories and harvests all of them.
    ///
    /// # Errors
    ///
    /// Returns the discovery errors of [`RepositoryDiscoverer::discover`] and
    /// [`Error::Decode`] when any repository serves undecodable content.
    pub async fn run(&self,) -> Result<Vec<ProjectRecord,>, Error,>
    {
        let pipeline = &self.pipeline;
        let discoverer = RepositoryDiscoverer::new(
            Arc::clone(&pipeline.host,),
            pipeline.executor.clone(),
            pipeline.config.retry.discovery.clone(),
        );

        let repositories =
            discoverer.discover(pipeline.config.min_stars, pipeline.config.sample_size,).await?;
        self.harvest(repositories,).await
    }

    /// Runs [`Harvester::run`] until it completes or `cancel` resolves.
    ///
    /// Cancellation drops every in-flight call and worker and discards the
    /// records collected so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on cancellation, otherwise the errors of
    /// [`Harvester::run`].
    pub async fn run_until<C,>(&self, cancel: C,) -> Result<Vec<ProjectRecord,>, Error,>
    where
        C: Future<Output = (),>,
    {
        tokio::select! {
            biased;

            () = cancel => {
                self.progress.abandon_with_message("cancelled",);
                warn!("Harvest cancelled; discarding collected records");
                Err(Error::Cancelled,)
            }
            result = self.run() => result,
        }
    }

    /// Harvests `repositories` on at most `concurrency` workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] from the first repository that serves
    /// undecodable content, and [`Error::Service`] when a worker panics.
    pub async fn harvest(
        &self,
        repositories: Vec<RepositorySummary,>,
    ) -> Result<Vec<ProjectRecord,>, Error,>
    {
        let total = repositories.len();
        self.progress.set_length(total as u64,);
        self.progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.yellow} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}",)
                .expect("valid template",),
        );

        let semaphore = Arc::new(Semaphore::new(self.pipeline.config.concurrency.max(1,),),);
        let mut tasks: JoinSet<Outcome,> = JoinSet::new();
        let mut finished: Vec<(usize, ProjectRecord,),> = Vec::with_capacity(total,);

        for (index, summary,) in repositories.into_iter().enumerate() {
            let permit = loop {
                tokio::select! {
                    biased;

                    Some(joined) = tasks.join_next() => self.collect(joined, &mut finished,)?,
                    permit = Arc::clone(&semaphore,).acquire_owned() => {
                        break permit.map_err(|e| Error::service(format!("worker pool closed: {e}"),),)?;
                    }
                }
            };

            let pipeline = Arc::clone(&self.pipeline,);
            self.progress.set_message(summary.full_name.clone(),);
            tasks.spawn(async move {
                let _permit = permit;
                (index, pipeline.process(&summary,).await,)
            },);
        }

        while let Some(joined,) = tasks.join_next().await {
            self.collect(joined, &mut finished,)?;
        }

        finished.sort_by_key(|(index, _,)| *index,);
        let records: Vec<ProjectRecord,> = finished.into_iter().map(|(_, record,)| record,).collect();

        self.progress.finish_and_clear();
        info!("Harvested {} of {} repositories", records.len(), total);
        Ok(records,)
    }

    fn collect(
        &self,
        joined: Result<Outcome, tokio::task::JoinError,>,
        finished: &mut Vec<(usize, ProjectRecord,),>,
    ) -> Result<(), Error,>
    {
        let (index, outcome,) =
            joined.map_err(|e| Error::service(format!("repository worker failed: {e}"),),)?;
        self.progress.inc(1,);

        if let Some(record,) = outcome? {
            finished.push((index, record,),);
        }
        Ok((),)
    }
}
