//! Changelog entries and diff generation.
//!
//! Every content-changing mutation of a definition appends exactly one
//! `ChangelogEntry` carrying a unified diff of the change. Entries are
//! append-only: they are never mutated or removed, even after the owning
//! definition is soft-deleted. The diff text exists for audit and history
//! display only; nothing ever parses it back.

use serde::{Deserialize, Serialize};
use similar::TextDiff;

/// One immutable history record for a definition mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    /// The owning definition.
    pub definition_id: u64,
    /// Who performed the mutation.
    pub author: String,
    /// Unified diff of the name and body changes. May be empty when the
    /// submitted content was identical to the prior state.
    pub diff: String,
    /// Free-text comment recorded with the mutation.
    pub comment: String,
}

impl ChangelogEntry {
    /// Creates a new changelog entry.
    pub fn new(
        definition_id: u64,
        author: impl Into<String>,
        diff: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            definition_id,
            author: author.into(),
            diff: diff.into(),
            comment: comment.into(),
        }
    }
}

/// Generates a unified diff covering the name and body of a definition.
///
/// The old and new states are diffed as one document (name, blank line,
/// body) so that renames and body edits both show up as hunks. Pure and
/// deterministic: identical inputs always produce identical output, and
/// an unchanged (name, body) pair produces an empty string.
pub fn generate_diff(
    id: u64,
    old_name: &str,
    new_name: &str,
    old_body: &str,
    new_body: &str,
) -> String {
    let old_doc = format!("{}\n\n{}", old_name, old_body);
    let new_doc = format!("{}\n\n{}", new_name, new_body);

    TextDiff::from_lines(old_doc.as_str(), new_doc.as_str())
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/script/{}", id), &format!("b/script/{}", id))
        .to_string()
}
