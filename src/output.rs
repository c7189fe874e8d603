// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Output artifact of a harvest run.
///
/// Records are written once, at the end of a successful run, as a single JSON
/// array. The document is staged in a sibling temporary file and renamed over
/// the destination.
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf}
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, output_error};

/// Result of harvesting one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    /// Full name of the repository (`owner/name`).
    pub name:        String,
    /// Fork count reported by discovery.
    pub forks:       u64,
    /// Summed size of the selected documentation files.
    pub total_bytes: u64,
    /// Mean readability, `-1.0` when no file produced a finite score.
    pub readability: f64
}

/// Serializes `records` to JSON and stores them at `path`.
///
/// Missing parent directories are created. The previous artifact, if any, is
/// replaced only once the new document is fully written.
///
/// # Errors
///
/// Returns [`Error::Serialize`] when encoding fails and [`Error::Output`]
/// when the artifact cannot be written.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use qoda::{ProjectRecord, write_records};
///
/// # fn example() -> Result<(), qoda::Error> {
/// let records = vec![ProjectRecord {
///     name:        "acme/widgets".to_owned(),
///     forks:       12,
///     total_bytes: 4200,
///     readability: 10.3
/// }];
/// write_records(Path::new("output.json"), &records, true)?;
/// # Ok(())
/// # }
/// ```
pub fn write_records(path: &Path, records: &[ProjectRecord], pretty: bool) -> Result<(), Error> {
    let document = if pretty {
        serde_json::to_vec_pretty(records)?
    } else {
        serde_json::to_vec(records)?
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        debug!("Creating output directory {}", parent.display());
        fs::create_dir_all(parent).map_err(|source| output_error(path, source))?;
    }

    let staging = staging_path(path);
    let written = fs::File::create(&staging).and_then(|mut file| {
        file.write_all(&document)?;
        file.write_all(b"\n")?;
        file.sync_all()
    });

    if let Err(source) = written.and_then(|()| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(output_error(path, source));
    }

    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "output.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
