//! # luafn - Versioned Lua Query Functions
//!
//! luafn lets operators author value-producing query functions in Lua,
//! stores them as versioned definitions with a full edit history, and
//! executes them safely when the host query engine evaluates a clause.
//!
//! ## Architecture
//!
//! The crate splits into a repository half and an execution half:
//!
//! - **FunctionRegistry**: the only writer of definition state; create,
//!   update, soft-delete, restore, with validation and audit notification
//! - **Changelog**: append-only unified-diff history of every mutation
//! - **Edit log**: JSON-lines persistence, replayed on open
//! - **LuaCompiler**: syntax (and optionally contract) checks at save time
//! - **ValuesFunctionAdapter**: the host-facing wrapper that enters an
//!   isolated execution context, delegates to the compiled script, and
//!   guarantees context exit on every path
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use luafn::{FunctionRegistry, Options, ScriptForm};
//! use luafn::host::{FunctionOperand, QueryContext, TerminalClause, ValuesFunction};
//!
//! # fn main() -> Result<(), luafn::Error> {
//! let registry = Arc::new(FunctionRegistry::open("./registry", Options::default())?);
//!
//! // An operator saves a function definition.
//! let created = registry.create(
//!     "admin",
//!     &ScriptForm::new(
//!         "highPriority",
//!         r#"return { values = function(ctx) return { "high", "critical" } end }"#,
//!     ),
//! )?;
//!
//! // The host query engine invokes it through an adapter.
//! let adapter = registry.values_adapter(created.id)?;
//! let values = adapter.values(
//!     &QueryContext::for_user("admin"),
//!     &FunctionOperand::new("highPriority", vec![]),
//!     &TerminalClause::new("priority", "in"),
//! )?;
//! assert_eq!(values.len(), 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod audit;
pub mod changelog;
pub mod config;
pub mod definition;
pub mod error;
pub mod host;
pub mod script;
pub mod stats;
pub mod store;

// Re-exports
pub use config::Options;
pub use definition::{ChangelogDto, ScriptDto, ScriptForm};
pub use error::{Error, Result};

use audit::{AuditEntity, AuditNotifier, EntityAction, EntityType, LogAuditNotifier};
use changelog::{generate_diff, ChangelogEntry};
use definition::ScriptDefinition;
use parking_lot::RwLock;
use script::adapter::{CachedDelegateProvider, ScriptRevision};
use script::compiler::{LuaCompiler, ScriptCompiler};
use script::context::IsolatedContext;
use script::ValuesFunctionAdapter;
use stats::{ExecutionStatsProvider, ExecutionTracker};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use store::{EditLog, RegistryEdit};
use uuid::Uuid;

/// The mutable registry state guarded by one lock.
struct RegistryState {
    /// Canonical definitions keyed by id.
    definitions: BTreeMap<u64, ScriptDefinition>,

    /// Changelog entries per definition, append order.
    changelogs: BTreeMap<u64, Vec<ChangelogEntry>>,

    /// The append-only persistence log.
    log: EditLog,
}

/// Everything a registry handle shares: state, counters, collaborators.
///
/// Held behind an `Arc` so that adapters built by the registry can keep
/// reading current definition state independently of the handle.
struct RegistryInner {
    /// Registry directory path
    path: PathBuf,

    /// Configuration options
    options: Options,

    /// Definitions, changelogs, and the edit log
    state: RwLock<RegistryState>,

    /// Next definition id (monotonically increasing, never reused)
    next_id: AtomicU64,

    /// Save-time script compiler
    compiler: Arc<dyn ScriptCompiler>,

    /// Observer of completed transitions
    audit: Arc<dyn AuditNotifier>,

    /// Source of per-version execution statistics
    stats: Arc<dyn ExecutionStatsProvider>,
}

impl RegistryInner {
    /// Validates a create/update form. Fails fast; callers mutate nothing
    /// before this returns Ok.
    fn validate_form(
        &self,
        state: &RegistryState,
        existing_id: Option<u64>,
        form: &ScriptForm,
    ) -> Result<()> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(Error::validation_field("Name is required", "name"));
        }
        if name.chars().count() > self.options.max_name_length {
            return Err(Error::validation_field(
                format!("Name must be at most {} characters", self.options.max_name_length),
                "name",
            ));
        }

        // Names are the engine-visible lookup key: a live definition may
        // not share one with another live definition.
        let name_taken = state.definitions.values().any(|definition| {
            !definition.deleted
                && definition.name == form.name
                && Some(definition.id) != existing_id
        });
        if name_taken {
            return Err(Error::validation_field(
                format!("A function named {:?} already exists", form.name),
                "name",
            ));
        }

        if form.script_body.is_empty() {
            return Err(Error::validation_field("Script body is required", "scriptBody"));
        }

        if let Err(e) = self
            .compiler
            .parse(&form.script_body, self.options.verify_function_contract)
        {
            let message = match e {
                Error::Script(message) => message,
                other => other.to_string(),
            };
            return Err(Error::Validation { message, field: Some("scriptBody".to_string()) });
        }

        Ok(())
    }

    /// Builds the outbound shape for one definition.
    fn build_dto(
        &self,
        state: &RegistryState,
        definition: &ScriptDefinition,
        include_changelogs: bool,
        include_error_count: bool,
    ) -> ScriptDto {
        ScriptDto {
            id: definition.id,
            uuid: definition.uuid.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            script_body: definition.body.clone(),
            deleted: definition.deleted,
            changelogs: include_changelogs.then(|| {
                state
                    .changelogs
                    .get(&definition.id)
                    .map(|entries| entries.iter().map(ChangelogDto::from).collect())
                    .unwrap_or_default()
            }),
            error_count: include_error_count.then(|| self.stats.error_count(&definition.uuid)),
        }
    }
}

/// The registry of scripted function definitions.
///
/// This is the primary interface for managing definitions: it validates
/// submissions, assigns ids and version uuids, appends the changelog,
/// persists every mutation to the edit log, and notifies the audit
/// collaborator about completed transitions. It is the only writer of
/// canonical definition state.
///
/// # Thread Safety
///
/// `FunctionRegistry` is designed to be shared across threads using
/// `Arc<FunctionRegistry>`. Each operation is a single logical unit;
/// concurrent updates to the same definition are last-write-wins.
pub struct FunctionRegistry {
    inner: Arc<RegistryInner>,
}

impl FunctionRegistry {
    /// Opens a registry at the specified path with the given options and
    /// default collaborators (Lua compiler, logging audit notifier, empty
    /// execution tracker).
    ///
    /// If the registry does not exist, it will be created. If it exists,
    /// its edit log is replayed to rebuild the definition state.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path is invalid or inaccessible
    /// - The options fail validation
    /// - Replay fails due to a corrupted edit log
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use luafn::{FunctionRegistry, Options};
    ///
    /// # fn main() -> Result<(), luafn::Error> {
    /// let registry = FunctionRegistry::open("./registry", Options::default())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let compiler = Arc::new(LuaCompiler::new(options.script_timeout));
        Self::open_with(
            path,
            options,
            compiler,
            Arc::new(LogAuditNotifier),
            Arc::new(ExecutionTracker::new()),
        )
    }

    /// Opens a registry with explicit collaborators.
    ///
    /// Embedders use this to wire in their own compiler, audit sink, or
    /// execution-statistics source.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        options: Options,
        compiler: Arc<dyn ScriptCompiler>,
        audit: Arc<dyn AuditNotifier>,
        stats: Arc<dyn ExecutionStatsProvider>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Validate options
        options.validate()?;

        // Step 1: Create directory if not exists
        if !path.exists() {
            if options.create_if_missing {
                std::fs::create_dir_all(&path)?;
            } else {
                return Err(Error::not_found(format!(
                    "Registry directory does not exist: {:?}",
                    path
                )));
            }
        } else if options.error_if_exists {
            return Err(Error::invalid_argument(format!("Registry already exists: {:?}", path)));
        }

        // Step 2: Replay the edit log
        let (log, edits) = EditLog::open(&path, options.sync_writes)?;

        let mut definitions: BTreeMap<u64, ScriptDefinition> = BTreeMap::new();
        let mut changelogs: BTreeMap<u64, Vec<ChangelogEntry>> = BTreeMap::new();
        let mut next_id = 1u64;

        for edit in edits {
            match edit {
                RegistryEdit::Create { definition } | RegistryEdit::Update { definition } => {
                    next_id = next_id.max(definition.id + 1);
                    definitions.insert(definition.id, definition);
                }
                RegistryEdit::SetDeleted { id, deleted } => {
                    match definitions.get_mut(&id) {
                        Some(definition) => definition.deleted = deleted,
                        None => {
                            return Err(Error::corruption(format!(
                                "SetDeleted references unknown definition {}",
                                id
                            )));
                        }
                    }
                }
                RegistryEdit::AppendChangelog { entry } => {
                    changelogs.entry(entry.definition_id).or_default().push(entry);
                }
            }
        }

        log::info!("Registry opened at {:?} with {} definitions", path, definitions.len());

        // Step 3: Construct the registry
        Ok(Self {
            inner: Arc::new(RegistryInner {
                path,
                options,
                state: RwLock::new(RegistryState { definitions, changelogs, log }),
                next_id: AtomicU64::new(next_id),
                compiler,
                audit,
                stats,
            }),
        })
    }

    /// Returns the registry directory path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns the configuration the registry was opened with.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Returns every non-deleted definition.
    ///
    /// `include_changelogs` hydrates each result with its edit history;
    /// `include_error_counts` hydrates the execution error count for the
    /// definition's current uuid. No ordering is guaranteed beyond the
    /// storage iteration order (ascending id).
    pub fn list_all(&self, include_changelogs: bool, include_error_counts: bool) -> Vec<ScriptDto> {
        let state = self.inner.state.read();

        state
            .definitions
            .values()
            .filter(|definition| !definition.deleted)
            .map(|definition| {
                self.inner.build_dto(&state, definition, include_changelogs, include_error_counts)
            })
            .collect()
    }

    /// Returns one definition by id, deleted or not, without hydration.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no definition has this id.
    pub fn get(&self, id: u64) -> Result<ScriptDto> {
        let state = self.inner.state.read();

        let definition = state
            .definitions
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("script definition {}", id)))?;

        Ok(self.inner.build_dto(&state, definition, false, false))
    }

    /// Creates a new definition from `form`, authored by `author`.
    ///
    /// Assigns a fresh id and uuid, persists the definition, appends a
    /// changelog entry diffed against the empty prior state (with the
    /// supplied comment, or `"Created."` when none is given), and emits a
    /// `CREATED` audit event.
    ///
    /// Returns the definition hydrated with its changelog.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the form fails validation; nothing
    /// is created or altered in that case.
    pub fn create(&self, author: &str, form: &ScriptForm) -> Result<ScriptDto> {
        let mut state = self.inner.state.write();

        self.inner.validate_form(&state, None, form)?;

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let definition = ScriptDefinition {
            id,
            uuid: Uuid::new_v4().to_string(),
            name: form.name.clone(),
            description: form.description.clone(),
            body: form.script_body.clone(),
            deleted: false,
        };

        let diff = generate_diff(id, "", &definition.name, "", &definition.body);
        let comment = form.comment.clone().unwrap_or_else(|| "Created.".to_string());
        let entry = ChangelogEntry::new(id, author, diff.clone(), comment.clone());

        state.log.append(&RegistryEdit::Create { definition: definition.clone() })?;
        state.log.append(&RegistryEdit::AppendChangelog { entry: entry.clone() })?;
        state.definitions.insert(id, definition.clone());
        state.changelogs.entry(id).or_default().push(entry);

        log::info!("Created script definition {} ({:?})", id, definition.name);

        self.inner.audit.record(
            author,
            EntityAction::Created,
            EntityType::ScriptedFunction,
            AuditEntity { id, name: &definition.name },
            Some(&diff),
            &comment,
        );

        Ok(self.inner.build_dto(&state, &definition, true, false))
    }

    /// Updates the definition `id` with the contents of `form`.
    ///
    /// Appends a changelog entry diffing the existing (name, body) against
    /// the submitted one, rotates the uuid, overwrites the content, and
    /// emits an `UPDATED` audit event. The caller's comment is recorded
    /// verbatim; unlike [`create`](Self::create), no default comment is
    /// substituted. Submitting content identical to the current state
    /// still rotates the uuid and appends an (empty-delta) entry.
    ///
    /// Returns the definition hydrated with its changelog and the error
    /// count for the freshly assigned uuid.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown id and `Error::Validation`
    /// for a bad form; nothing is altered in either case.
    pub fn update(&self, author: &str, id: u64, form: &ScriptForm) -> Result<ScriptDto> {
        let mut state = self.inner.state.write();

        let existing = state
            .definitions
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("script definition {}", id)))?
            .clone();

        self.inner.validate_form(&state, Some(id), form)?;

        let diff = generate_diff(id, &existing.name, &form.name, &existing.body, &form.script_body);
        let comment = form.comment.clone().unwrap_or_default();
        let entry = ChangelogEntry::new(id, author, diff.clone(), comment.clone());

        let mut definition = existing;
        definition.uuid = Uuid::new_v4().to_string();
        definition.name = form.name.clone();
        definition.description = form.description.clone();
        definition.body = form.script_body.clone();

        state.log.append(&RegistryEdit::AppendChangelog { entry: entry.clone() })?;
        state.log.append(&RegistryEdit::Update { definition: definition.clone() })?;
        state.changelogs.entry(id).or_default().push(entry);
        state.definitions.insert(id, definition.clone());

        log::info!("Updated script definition {} ({:?})", id, definition.name);

        self.inner.audit.record(
            author,
            EntityAction::Updated,
            EntityType::ScriptedFunction,
            AuditEntity { id, name: &definition.name },
            Some(&diff),
            &comment,
        );

        Ok(self.inner.build_dto(&state, &definition, true, true))
    }

    /// Soft-deletes the definition `id`.
    ///
    /// The definition is excluded from default listings but keeps its id,
    /// uuid, and full history, and remains retrievable via
    /// [`get`](Self::get). Emits a `DELETED` audit event (no diff).
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown id.
    pub fn delete(&self, author: &str, id: u64) -> Result<()> {
        self.set_deleted(author, id, true, EntityAction::Deleted)
    }

    /// Restores the soft-deleted definition `id`.
    ///
    /// Emits a `RESTORED` audit event (no diff).
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown id.
    pub fn restore(&self, author: &str, id: u64) -> Result<()> {
        self.set_deleted(author, id, false, EntityAction::Restored)
    }

    /// Builds a host-facing adapter for the definition `id`.
    ///
    /// The adapter owns a fresh isolated context and a delegate provider
    /// that caches the compiled script keyed by the definition's uuid:
    /// updating the definition rotates the uuid, so the next invocation
    /// recompiles from the current body. Invoking the adapter after the
    /// definition was deleted fails with `Error::NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no definition has this id.
    pub fn values_adapter(&self, id: u64) -> Result<ValuesFunctionAdapter> {
        let dto = self.get(id)?;

        let inner = Arc::clone(&self.inner);
        let fetch = move || {
            let state = inner.state.read();
            let definition = state
                .definitions
                .get(&id)
                .ok_or_else(|| Error::not_found(format!("script definition {}", id)))?;

            if definition.deleted {
                return Err(Error::not_found(format!("script definition {} is deleted", id)));
            }

            Ok(ScriptRevision {
                uuid: definition.uuid.clone(),
                name: definition.name.clone(),
                source: definition.body.clone(),
            })
        };

        let provider = CachedDelegateProvider::new(fetch, Arc::clone(&self.inner.compiler));

        Ok(ValuesFunctionAdapter::new(
            format!("script-{}", id),
            dto.name,
            IsolatedContext::new(),
            Arc::new(provider),
        ))
    }

    /// Flips the soft-delete flag and emits the matching audit event.
    fn set_deleted(
        &self,
        author: &str,
        id: u64,
        deleted: bool,
        action: EntityAction,
    ) -> Result<()> {
        let mut state = self.inner.state.write();

        let name = state
            .definitions
            .get(&id)
            .ok_or_else(|| Error::not_found(format!("script definition {}", id)))?
            .name
            .clone();

        state.log.append(&RegistryEdit::SetDeleted { id, deleted })?;
        if let Some(definition) = state.definitions.get_mut(&id) {
            definition.deleted = deleted;
        }

        let description = format!("{} - {}", id, name);

        log::info!("Set deleted={} on script definition {}", deleted, id);

        self.inner.audit.record(
            author,
            action,
            EntityType::ScriptedFunction,
            AuditEntity { id, name: &name },
            None,
            &description,
        );

        Ok(())
    }
}
