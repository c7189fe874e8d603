// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! In-memory [`SourceHost`] and scorer used by unit tests.
//!
//! Every call is recorded under a key (`search:<page>`, `commit:<repo>`,
//! `tree:<repo>`, `content:<repo>:<path>`, `readme:<repo>`) that tests use to
//! count calls and to script failures.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::{
    readability::ReadabilityScorer,
    remote::{QuotaStatus, Remote, RemoteError, RepositorySummary, SearchPage, SourceHost, TreeEntry},
};

/// Encodes text the way the remote service transports file content.
pub fn encode(text: &str,) -> String
{
    STANDARD.encode(text,)
}

/// Builds a repository summary for `full_name` (`owner/name`).
pub fn repository(full_name: &str, forks: u64,) -> RepositorySummary
{
    let (owner, name,) = full_name.split_once('/',).unwrap_or((full_name, full_name,),);
    RepositorySummary {
        owner:          owner.to_owned(),
        name:           name.to_owned(),
        full_name:      full_name.to_owned(),
        default_branch: "main".to_owned(),
        stars:          500,
        forks,
    }
}

#[derive(Default,)]
pub struct ScriptedHost
{
    repositories: Vec<RepositorySummary,>,
    trees:        HashMap<String, Vec<TreeEntry,>,>,
    files:        HashMap<(String, String,), String,>,
    readmes:      HashMap<String, String,>,
    next_pages:   HashMap<u32, Option<u32,>,>,
    empty_pages:  HashSet<u32,>,
    permanent:    HashMap<String, RemoteError,>,
    queued:       Mutex<HashMap<String, VecDeque<RemoteError,>,>,>,
    calls:        Mutex<Vec<String,>,>,
}

impl ScriptedHost
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Adds a repository to the search results, with an empty tree.
    pub fn with_repository(mut self, summary: RepositorySummary,) -> Self
    {
        self.trees.entry(summary.full_name.clone(),).or_default();
        self.repositories.push(summary,);
        self
    }

    pub fn with_tree(mut self, full_name: &str, tree: Vec<TreeEntry,>,) -> Self
    {
        self.trees.insert(full_name.to_owned(), tree,);
        self
    }

    /// Serves `text` (base64 encoded) as the content of `path`.
    pub fn with_file(mut self, full_name: &str, path: &str, text: &str,) -> Self
    {
        self.files.insert((full_name.to_owned(), path.to_owned(),), encode(text,),);
        self
    }

    pub fn with_readme(mut self, full_name: &str, text: &str,) -> Self
    {
        self.readmes.insert(full_name.to_owned(), encode(text,),);
        self
    }

    /// Reports `next` as the follow-up of search page `page` instead of the
    /// following page.
    pub fn with_next_page(mut self, page: u32, next: Option<u32,>,) -> Self
    {
        self.next_pages.insert(page, next,);
        self
    }

    /// Serves search page `page` without items, keeping its follow-up link.
    pub fn with_empty_page(mut self, page: u32,) -> Self
    {
        self.empty_pages.insert(page,);
        self
    }

    /// Fails every call recorded under `key` with `error`.
    pub fn fail_always(mut self, key: &str, error: RemoteError,) -> Self
    {
        self.permanent.insert(key.to_owned(), error,);
        self
    }

    /// Fails the next calls recorded under `key`, one error per call.
    pub fn fail_next(self, key: &str, errors: Vec<RemoteError,>,) -> Self
    {
        self.queued
            .lock()
            .expect("queue lock",)
            .entry(key.to_owned(),)
            .or_default()
            .extend(errors,);
        self
    }

    /// Number of recorded calls whose key starts with `prefix`.
    pub fn calls_with_prefix(&self, prefix: &str,) -> usize
    {
        self.calls.lock().expect("calls lock",).iter().filter(|key| key.starts_with(prefix,),).count()
    }

    fn record(&self, key: String,) -> Result<(), RemoteError,>
    {
        self.calls.lock().expect("calls lock",).push(key.clone(),);

        if let Some(error,) =
            self.queued.lock().expect("queue lock",).get_mut(&key,).and_then(VecDeque::pop_front,)
        {
            return Err(error,);
        }

        match self.permanent.get(&key,) {
            Some(error,) => Err(error.clone(),),
            None => Ok((),),
        }
    }

    fn answer<T,>(value: T,) -> Result<Remote<T,>, RemoteError,>
    {
        Ok(Remote::new(value, QuotaStatus::unlimited(),),)
    }
}

#[async_trait]
impl SourceHost for ScriptedHost
{
    async fn search_repositories(
        &self,
        _query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Remote<SearchPage,>, RemoteError,>
    {
        self.record(format!("search:{page}"),)?;

        let per_page = per_page.max(1,) as usize;
        let start = (page.max(1,) as usize - 1) * per_page;
        let end = (start + per_page).min(self.repositories.len(),);
        let items = if self.empty_pages.contains(&page,) {
            Vec::new()
        } else {
            self.repositories.get(start..end,).map(<[_]>::to_vec,).unwrap_or_default()
        };
        let next_page = match self.next_pages.get(&page,) {
            Some(next,) => *next,
            None => (end < self.repositories.len()).then_some(page + 1,),
        };

        Self::answer(SearchPage {
            items,
            next_page,
        },)
    }

    async fn latest_commit(
        &self,
        owner: &str,
        repo: &str,
        _branch: &str,
    ) -> Result<Remote<String,>, RemoteError,>
    {
        let full_name = format!("{owner}/{repo}");
        self.record(format!("commit:{full_name}"),)?;

        if !self.trees.contains_key(&full_name,) {
            return Err(RemoteError::not_found(full_name,),);
        }
        Self::answer(format!("sha-{full_name}"),)
    }

    async fn tree(
        &self,
        owner: &str,
        repo: &str,
        _sha: &str,
    ) -> Result<Remote<Vec<TreeEntry,>,>, RemoteError,>
    {
        let full_name = format!("{owner}/{repo}");
        self.record(format!("tree:{full_name}"),)?;

        match self.trees.get(&full_name,) {
            Some(tree,) => Self::answer(tree.clone(),),
            None => Err(RemoteError::not_found(full_name,),),
        }
    }

    async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Remote<String,>, RemoteError,>
    {
        let full_name = format!("{owner}/{repo}");
        self.record(format!("content:{full_name}:{path}"),)?;

        match self.files.get(&(full_name, path.to_owned(),),) {
            Some(content,) => Self::answer(content.clone(),),
            None => Err(RemoteError::not_found(path,),),
        }
    }

    async fn readme(&self, owner: &str, repo: &str,)
    -> Result<Remote<Option<String,>,>, RemoteError,>
    {
        let full_name = format!("{owner}/{repo}");
        self.record(format!("readme:{full_name}"),)?;

        Self::answer(self.readmes.get(&full_name,).cloned(),)
    }
}

/// Scorer returning preset scores per exact text, `+inf` otherwise.
pub struct FixedScores
{
    scores: HashMap<String, f64,>,
}

impl FixedScores
{
    pub fn new<'a, I,>(entries: I,) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64,),>,
    {
        Self {
            scores: entries.into_iter().map(|(text, score,)| (text.to_owned(), score,),).collect(),
        }
    }
}

impl ReadabilityScorer for FixedScores
{
    fn score(&self, text: &str,) -> f64
    {
        self.scores.get(text,).copied().unwrap_or(f64::INFINITY,)
    }
}
