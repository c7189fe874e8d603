// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Harvest configuration.
//!
//! A [`HarvestConfig`] is built once from defaults, an optional YAML document
//! and command line overrides, validated, and then handed to the harvester as
//! an immutable value.

use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, io_error},
    filter::normalize_extension,
    retry::RetryPolicy,
};

/// Settings of one harvest run.
///
/// # Examples
///
/// ```
/// use qoda::parse_config;
///
/// let yaml = r#"
/// min_stars: 500
/// doc_extensions: [MD, ".txt"]
/// retry:
///   content:
///     max_attempts: 5
/// "#;
/// let config = parse_config(yaml).expect("valid configuration");
/// assert_eq!(config.min_stars, 500);
/// assert_eq!(config.doc_extensions, vec![".md", ".txt"]);
/// assert_eq!(config.retry.content.max_attempts, 5);
/// assert_eq!(config.sample_size, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig
{
    /// Minimum stargazer count of discovered repositories.
    pub min_stars:          u64,
    /// Number of repositories to discover.
    pub sample_size:        usize,
    /// Documentation extensions, normalized to `.ext` lower case.
    #[serde(alias = "extensions")]
    pub doc_extensions:     Vec<String,>,
    /// Maximum number of documentation files scored per repository.
    #[serde(alias = "max_files")]
    pub max_files_per_repo: usize,
    /// Destination of the JSON artifact.
    pub output:             PathBuf,
    /// Number of repositories processed at the same time.
    pub concurrency:        usize,
    /// Score the README when a tree has no documentation files.
    pub readme_fallback:    bool,
    /// Write indented JSON.
    pub pretty:             bool,
    /// Retry budgets per remote operation.
    pub retry:              RetrySettings,
}

impl Default for HarvestConfig
{
    fn default() -> Self
    {
        Self {
            min_stars:          150,
            sample_size:        1000,
            doc_extensions:     vec![".md".to_owned(), ".rst".to_owned(), ".adoc".to_owned()],
            max_files_per_repo: 100,
            output:             PathBuf::from("output.json",),
            concurrency:        1,
            readme_fallback:    false,
            pretty:             false,
            retry:              RetrySettings::default(),
        }
    }
}

/// Retry policies of the four remote operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings
{
    pub discovery: RetryPolicy,
    pub commit:    RetryPolicy,
    pub tree:      RetryPolicy,
    pub content:   RetryPolicy,
}

impl Default for RetrySettings
{
    fn default() -> Self
    {
        Self {
            discovery: RetryPolicy::discovery(),
            commit:    RetryPolicy::commit(),
            tree:      RetryPolicy::tree(),
            content:   RetryPolicy::content(),
        }
    }
}

impl HarvestConfig
{
    /// Checks the invariants of the configuration and normalizes extensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when a count is zero or no usable
    /// extension is configured.
    pub fn validate(mut self,) -> Result<Self, Error,>
    {
        if self.sample_size == 0 {
            return Err(Error::validation("sample_size must be at least 1",),);
        }
        if self.concurrency == 0 {
            return Err(Error::validation("concurrency must be at least 1",),);
        }

        for (name, policy,) in [
            ("discovery", &self.retry.discovery,),
            ("commit", &self.retry.commit,),
            ("tree", &self.retry.tree,),
            ("content", &self.retry.content,),
        ] {
            if policy.max_attempts == 0 {
                return Err(Error::validation(format!(
                    "retry.{name}.max_attempts must be at least 1"
                ),),);
            }
        }

        let mut extensions: Vec<String,> = Vec::with_capacity(self.doc_extensions.len(),);
        for extension in self.doc_extensions.iter().filter_map(|raw| normalize_extension(raw,),) {
            if !extensions.contains(&extension,) {
                extensions.push(extension,);
            }
        }
        if extensions.is_empty() {
            return Err(Error::validation("at least one documentation extension is required",),);
        }
        self.doc_extensions = extensions;

        Ok(self,)
    }
}

/// Parses and validates a YAML configuration document.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed YAML or unknown fields and
/// [`Error::Validation`] when the values violate an invariant.
pub fn parse_config(source: &str,) -> Result<HarvestConfig, Error,>
{
    if source.trim().is_empty() {
        return HarvestConfig::default().validate();
    }

    let config: HarvestConfig = serde_yaml::from_str(source,)?;
    config.validate()
}

/// Reads and validates a YAML configuration file.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read, otherwise the errors of
/// [`parse_config`].
pub fn load_config(path: &Path,) -> Result<HarvestConfig, Error,>
{
    let contents = fs::read_to_string(path,).map_err(|source| io_error(path, source,),)?;
    parse_config(&contents,)
}
