// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Selection of documentation files from a repository tree.

use crate::remote::TreeEntry;

/// Documentation entries selected from a tree plus their summed size.
#[derive(Debug, Clone, PartialEq, Eq, Default,)]
pub struct DocumentationSelection
{
    /// Selected entries in tree order.
    pub entries:     Vec<TreeEntry,>,
    /// Sum of the declared sizes of all selected entries.
    pub total_bytes: u64,
}

impl DocumentationSelection
{
    pub fn is_empty(&self,) -> bool
    {
        self.entries.is_empty()
    }
}

/// Normalizes a configured extension to lower case with a leading dot.
///
/// Returns `None` for blank input.
///
/// # Examples
///
/// ```
/// assert_eq!(qoda::normalize_extension(" MD ").as_deref(), Some(".md"));
/// assert_eq!(qoda::normalize_extension(".Rst").as_deref(), Some(".rst"));
/// assert!(qoda::normalize_extension("  ").is_none());
/// ```
pub fn normalize_extension(raw: &str,) -> Option<String,>
{
    let trimmed = raw.trim().trim_start_matches('.',);
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()),)
}

/// Selects the entries whose path ends with one of `extensions`.
///
/// Matching is a case-insensitive suffix comparison; `extensions` are
/// expected in the form produced by [`normalize_extension`]. Entries without
/// a declared size are skipped even when the path matches. The input tree is
/// left untouched and the output preserves its order.
///
/// # Examples
///
/// ```
/// use qoda::{TreeEntry, select_documentation};
///
/// let tree = vec![
///     TreeEntry::blob("README.MD", 10),
///     TreeEntry::blob("main.go", 99),
///     TreeEntry::unsized_entry("docs.md"),
/// ];
/// let selection = select_documentation(&tree, &[".md".to_owned()]);
/// assert_eq!(selection.entries.len(), 1);
/// assert_eq!(selection.total_bytes, 10);
/// ```
pub fn select_documentation(tree: &[TreeEntry], extensions: &[String],) -> DocumentationSelection
{
    let mut selection = DocumentationSelection::default();

    for entry in tree {
        let Some(size,) = entry.size else {
            continue;
        };

        let path = entry.path.to_lowercase();
        if extensions.iter().any(|extension| path.ends_with(extension.as_str(),),) {
            selection.total_bytes += size;
            selection.entries.push(entry.clone(),);
        }
    }

    selection
}
