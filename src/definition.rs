//! Definition records and the shapes they cross the registry boundary in.
//!
//! `ScriptDefinition` is the canonical persisted record, owned exclusively
//! by the registry. `ScriptForm` is the inbound create/update shape and
//! `ScriptDto` the outbound read shape; both serialize with camelCase
//! field names for the operator UI.

use crate::changelog::ChangelogEntry;
use serde::{Deserialize, Serialize};

/// The canonical record of one scripted function definition.
///
/// The `id` is assigned once and never changes. The `uuid` is regenerated
/// on every successful update and acts as a cache-invalidation token:
/// anything cached under a previous uuid of this definition is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDefinition {
    /// Registry-assigned identifier, immutable for the definition lifetime.
    pub id: u64,
    /// Content-version token, rotated on every update.
    pub uuid: String,
    /// Unique display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Lua source text. Never empty.
    pub body: String,
    /// Soft-delete flag. Deleted definitions keep their history.
    pub deleted: bool,
}

/// The create/update form submitted by an operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptForm {
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Lua source text.
    pub script_body: String,
    /// Optional changelog comment for this mutation.
    #[serde(default)]
    pub comment: Option<String>,
}

impl ScriptForm {
    /// Creates a form with a name and body, no description or comment.
    pub fn new(name: impl Into<String>, script_body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            script_body: script_body.into(),
            comment: None,
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the changelog comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// One changelog entry as exposed on read paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogDto {
    /// Author of the mutation.
    pub author: String,
    /// Unified diff of the name and body changes.
    pub diff: String,
    /// Free-text comment recorded with the mutation.
    pub comment: String,
}

impl From<&ChangelogEntry> for ChangelogDto {
    fn from(entry: &ChangelogEntry) -> Self {
        Self {
            author: entry.author.clone(),
            diff: entry.diff.clone(),
            comment: entry.comment.clone(),
        }
    }
}

/// A definition as returned from registry read paths.
///
/// `changelogs` and `error_count` are hydration extras: present only when
/// the read path asked for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDto {
    /// Registry-assigned identifier.
    pub id: u64,
    /// Current content-version token.
    pub uuid: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Lua source text.
    pub script_body: String,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Edit history, oldest first. Present only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelogs: Option<Vec<ChangelogDto>>,
    /// Execution error count for the current uuid. Present only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_builder() {
        let form = ScriptForm::new("High Priority", "return {}")
            .description("counts high priority items")
            .comment("initial version");

        assert_eq!(form.name, "High Priority");
        assert_eq!(form.description.as_deref(), Some("counts high priority items"));
        assert_eq!(form.comment.as_deref(), Some("initial version"));
    }

    #[test]
    fn test_form_wire_names() {
        let json = r#"{"name":"f","scriptBody":"return {}","comment":"c"}"#;
        let form: ScriptForm = serde_json::from_str(json).unwrap();
        assert_eq!(form.name, "f");
        assert_eq!(form.script_body, "return {}");
        assert_eq!(form.comment.as_deref(), Some("c"));
        assert_eq!(form.description, None);
    }

    #[test]
    fn test_dto_skips_absent_hydration() {
        let dto = ScriptDto {
            id: 1,
            uuid: "u".to_string(),
            name: "f".to_string(),
            description: None,
            script_body: "return {}".to_string(),
            deleted: false,
            changelogs: None,
            error_count: None,
        };

        let json = serde_json::to_string(&dto).unwrap();
        assert!(!json.contains("changelogs"));
        assert!(!json.contains("errorCount"));
        assert!(json.contains("scriptBody"));
    }
}
