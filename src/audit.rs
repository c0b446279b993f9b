//! Audit notification boundary.
//!
//! The registry reports every completed state transition to an
//! `AuditNotifier`. The notifier observes; it never owns or mutates
//! definition state. The default implementation writes structured log
//! lines; `RecordingAuditNotifier` buffers events so tests and embedders
//! can inspect or forward them.

use parking_lot::Mutex;
use std::fmt;

/// The action a completed transition performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityAction {
    /// A definition was created.
    Created,
    /// A definition's content was updated.
    Updated,
    /// A definition was soft-deleted.
    Deleted,
    /// A soft-deleted definition was restored.
    Restored,
}

impl fmt::Display for EntityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityAction::Created => "CREATED",
            EntityAction::Updated => "UPDATED",
            EntityAction::Deleted => "DELETED",
            EntityAction::Restored => "RESTORED",
        };
        f.write_str(s)
    }
}

/// The kind of entity an audit event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    /// A scripted query function definition.
    ScriptedFunction,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::ScriptedFunction => f.write_str("SCRIPTED_FUNCTION"),
        }
    }
}

/// Identity of the entity an audit event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditEntity<'a> {
    /// The entity's registry id.
    pub id: u64,
    /// The entity's display name at the time of the event.
    pub name: &'a str,
}

/// Observer of completed registry transitions.
pub trait AuditNotifier: Send + Sync {
    /// Records one completed transition.
    ///
    /// `diff` is present for content-changing actions and absent for
    /// delete/restore.
    fn record(
        &self,
        actor: &str,
        action: EntityAction,
        entity_type: EntityType,
        entity: AuditEntity<'_>,
        diff: Option<&str>,
        description: &str,
    );
}

/// Default notifier: one structured log line per event.
#[derive(Debug, Default)]
pub struct LogAuditNotifier;

impl AuditNotifier for LogAuditNotifier {
    fn record(
        &self,
        actor: &str,
        action: EntityAction,
        entity_type: EntityType,
        entity: AuditEntity<'_>,
        diff: Option<&str>,
        description: &str,
    ) {
        log::info!(
            "audit: actor={} action={} entity_type={} entity_id={} entity_name={:?} diff_bytes={} description={:?}",
            actor,
            action,
            entity_type,
            entity.id,
            entity.name,
            diff.map(str::len).unwrap_or(0),
            description,
        );
    }
}

/// One buffered audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Who performed the action.
    pub actor: String,
    /// The action performed.
    pub action: EntityAction,
    /// The entity kind.
    pub entity_type: EntityType,
    /// The entity's registry id.
    pub entity_id: u64,
    /// The entity's display name at the time of the event.
    pub entity_name: String,
    /// Diff text for content-changing actions.
    pub diff: Option<String>,
    /// Human-readable description of the event.
    pub description: String,
}

/// Notifier that buffers events in memory for later inspection.
#[derive(Debug, Default)]
pub struct RecordingAuditNotifier {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditNotifier {
    /// Creates an empty recording notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AuditNotifier for RecordingAuditNotifier {
    fn record(
        &self,
        actor: &str,
        action: EntityAction,
        entity_type: EntityType,
        entity: AuditEntity<'_>,
        diff: Option<&str>,
        description: &str,
    ) {
        self.events.lock().push(AuditEvent {
            actor: actor.to_string(),
            action,
            entity_type,
            entity_id: entity.id,
            entity_name: entity.name.to_string(),
            diff: diff.map(str::to_string),
            description: description.to_string(),
        });
    }
}
