// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Readability aggregation over the documentation files of one repository.
///
/// Content is fetched lazily (at most once per entry), decoded from its
/// base64 transport encoding, scored, and folded into a mean. Files that
/// cannot be fetched are skipped; content that cannot be decoded aborts the
/// run because retrying would reproduce the same bytes.
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::{
    error::Error,
    readability::ReadabilityScorer,
    remote::{SourceHost, TreeEntry},
    retry::{RetryExecutor, RetryPolicy},
};

/// Value written in place of a readability score when no file produced one.
pub const READABILITY_SENTINEL: f64 = -1.0;

/// Aggregated readability of one repository.
#[derive(Debug, Clone, Copy, PartialEq,)]
pub enum Readability
{
    /// Mean of all finite per-file scores.
    Score(f64,),
    /// No file produced a finite score.
    Undefined,
}

impl Readability
{
    /// Builds the result from a running sum and count.
    pub fn from_sum(sum: f64, count: usize,) -> Self
    {
        let mean = sum / count as f64;
        if mean.is_finite() { Self::Score(mean,) } else { Self::Undefined }
    }

    /// Numeric value for output, [`READABILITY_SENTINEL`] when undefined.
    pub fn value(self,) -> f64
    {
        match self {
            Self::Score(score,) => score,
            Self::Undefined => READABILITY_SENTINEL,
        }
    }
}

impl Serialize for Readability
{
    fn serialize<S,>(&self, serializer: S,) -> Result<S::Ok, S::Error,>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.value(),)
    }
}

/// Decodes base64 transport content, ignoring embedded line breaks.
///
/// # Errors
///
/// Returns [`base64::DecodeError`] when the content is not valid base64.
pub fn decode_content(encoded: &str,) -> Result<String, base64::DecodeError,>
{
    let compact: String = encoded.chars().filter(|ch| !ch.is_ascii_whitespace(),).collect();
    let bytes = STANDARD.decode(compact,)?;
    Ok(String::from_utf8_lossy(&bytes,).into_owned(),)
}

/// Folds per-file scores into a [`Readability`].
///
/// Every non-finite score is discarded: `+inf` (degenerate text), `-inf`
/// and `NaN` alike. When nothing finite remains the result is
/// [`Readability::Undefined`].
pub fn fold_scores<I,>(scores: I,) -> Readability
where
    I: IntoIterator<Item = f64,>,
{
    let (sum, count,) = scores
        .into_iter()
        .filter(|score| score.is_finite(),)
        .fold((0.0, 0usize,), |(sum, count,), score| (sum + score, count + 1,),);

    Readability::from_sum(sum, count,)
}

/// Computes the readability of a repository's documentation files.
pub struct ReadabilityAggregator<H: ?Sized,>
{
    host:      Arc<H,>,
    executor:  RetryExecutor,
    scorer:    Arc<dyn ReadabilityScorer,>,
    policy:    RetryPolicy,
    max_files: usize,
}

impl<H,> ReadabilityAggregator<H,>
where
    H: SourceHost + ?Sized,
{
    pub fn new(
        host: Arc<H,>,
        executor: RetryExecutor,
        scorer: Arc<dyn ReadabilityScorer,>,
        policy: RetryPolicy,
        max_files: usize,
    ) -> Self
    {
        Self {
            host,
            executor,
            scorer,
            policy,
            max_files,
        }
    }

    /// Scores the first `max_files` entries of `entries`.
    ///
    /// Entries without content are fetched and the fetched content is cached
    /// in place, so a second pass over the same entries performs no remote
    /// calls. Entries whose fetch fails are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when fetched or embedded content is not valid
    /// base64.
    pub async fn aggregate(
        &self,
        owner: &str,
        repo: &str,
        entries: &mut [TreeEntry],
    ) -> Result<Readability, Error,>
    {
        let limit = entries.len().min(self.max_files,);
        let selected = &mut entries[..limit];

        for entry in selected.iter_mut() {
            if entry.content.is_some() {
                continue;
            }

            let path = entry.path.clone();
            let fetched = self
                .executor
                .execute(&self.policy, &format!("content of {owner}/{repo}:{path}"), || {
                    self.host.file_content(owner, repo, &path,)
                },)
                .await;

            match fetched {
                Ok(content,) => entry.content = Some(content,),
                Err(error,) => warn!("Failed to get file {}/{}:{}: {}", owner, repo, path, error),
            }
        }

        let mut texts = Vec::with_capacity(limit,);
        for entry in selected.iter() {
            let Some(content,) = entry.content.as_deref() else {
                continue;
            };
            let text = decode_content(content,).map_err(|source| Error::Decode {
                repository: format!("{owner}/{repo}"),
                path: entry.path.clone(),
                source,
            },)?;
            texts.push(text,);
        }

        let scorer = self.scorer.as_ref();
        let scores: Vec<f64,> = texts.par_iter().map(|text| scorer.score(text,),).collect();
        let readability = fold_scores(scores,);

        debug!(
            "Scored {} of {} documentation files for {}/{}: {:?}",
            texts.len(),
            limit,
            owner,
            repo,
            readability
        );

        Ok(readability,)
    }

    /// Scores the repository README alone.
    ///
    /// A missing README or a failed fetch degrades to
    /// [`Readability::Undefined`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the README content is not valid base64.
    pub async fn aggregate_readme(&self, owner: &str, repo: &str,) -> Result<Readability, Error,>
    {
        let fetched = self
            .executor
            .execute(&self.policy, &format!("readme of {owner}/{repo}"), || {
                self.host.readme(owner, repo,)
            },)
            .await;

        let content = match fetched {
            Ok(Some(content,),) => content,
            Ok(None,) => {
                debug!("{}/{} has no README", owner, repo);
                return Ok(Readability::Undefined,);
            }
            Err(error,) => {
                warn!("Failed to get README of {}/{}: {}", owner, repo, error);
                return Ok(Readability::Undefined,);
            }
        };

        let text = decode_content(&content,).map_err(|source| Error::Decode {
            repository: format!("{owner}/{repo}"),
            path: "README".to_owned(),
            source,
        },)?;

        Ok(fold_scores([self.scorer.score(&text,)],),)
    }
}
