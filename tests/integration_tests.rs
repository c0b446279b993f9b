// End-to-End Integration Tests for luafn
// These tests verify complete definition lifecycles, persistence across
// reopen, and execution through the host-facing adapter

use luafn::audit::{AuditNotifier, EntityAction, LogAuditNotifier, RecordingAuditNotifier};
use luafn::host::{FunctionOperand, QueryContext, QueryLiteral, TerminalClause, ValuesFunction};
use luafn::script::LuaCompiler;
use luafn::stats::ExecutionTracker;
use luafn::{Error, FunctionRegistry, Options, ScriptForm};
use std::sync::Arc;
use tempfile::TempDir;

const COUNT_BODY: &str = r#"
    return {
        values = function(ctx)
            return { "high", "critical" }
        end
    }
"#;

const COUNT_BODY_V2: &str = r#"
    return {
        values = function(ctx)
            return { "high" }
        end
    }
"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Test the complete definition lifecycle: create, update, delete, restore.
#[test]
fn test_e2e_definition_lifecycle() {
    init_logging();

    let dir = TempDir::new().unwrap();
    let registry = Arc::new(FunctionRegistry::open(dir.path(), Options::default()).unwrap());

    // Create
    let created = registry
        .create("admin", &ScriptForm::new("High Priority Count", COUNT_BODY))
        .unwrap();

    let u1 = created.uuid.clone();
    assert!(!u1.is_empty());
    assert!(!created.deleted);

    let changelogs = created.changelogs.as_ref().unwrap();
    assert_eq!(changelogs.len(), 1);
    assert_eq!(changelogs[0].comment, "Created.");

    // Update
    let updated = registry
        .update(
            "admin",
            created.id,
            &ScriptForm::new("High Priority Count", COUNT_BODY_V2).comment("fix bug"),
        )
        .unwrap();

    assert_eq!(updated.id, created.id);
    assert_ne!(updated.uuid, u1);

    let changelogs = updated.changelogs.as_ref().unwrap();
    assert_eq!(changelogs.len(), 2);
    assert_eq!(changelogs[1].comment, "fix bug");

    // Delete: excluded from listings, still retrievable by id.
    registry.delete("admin", created.id).unwrap();

    assert!(registry.list_all(false, false).is_empty());
    let deleted = registry.get(created.id).unwrap();
    assert!(deleted.deleted);

    // Restore: flag flips back, id, uuid, and history are untouched.
    registry.restore("admin", created.id).unwrap();

    let restored = registry.get(created.id).unwrap();
    assert!(!restored.deleted);
    assert_eq!(restored.uuid, updated.uuid);

    let listed = registry.list_all(true, false);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].changelogs.as_ref().unwrap().len(), 2);
}

/// Test that definitions, history, and the soft-delete flag survive reopen.
#[test]
fn test_e2e_persistence_across_reopen() {
    init_logging();

    let dir = TempDir::new().unwrap();
    let path = dir.path().to_path_buf();

    let (kept_id, kept_uuid, deleted_id);

    // First session: create two definitions, delete one.
    {
        let registry = FunctionRegistry::open(&path, Options::default()).unwrap();

        let kept = registry
            .create("admin", &ScriptForm::new("kept", COUNT_BODY).comment("v1"))
            .unwrap();
        let kept = registry
            .update("admin", kept.id, &ScriptForm::new("kept", COUNT_BODY_V2).comment("v2"))
            .unwrap();

        let doomed = registry.create("admin", &ScriptForm::new("doomed", COUNT_BODY)).unwrap();
        registry.delete("admin", doomed.id).unwrap();

        kept_id = kept.id;
        kept_uuid = kept.uuid;
        deleted_id = doomed.id;
    }

    // Second session: verify replayed state.
    {
        let registry = FunctionRegistry::open(&path, Options::default()).unwrap();

        let listed = registry.list_all(true, false);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept_id);
        assert_eq!(listed[0].uuid, kept_uuid);
        assert_eq!(listed[0].script_body, COUNT_BODY_V2);

        let changelogs = listed[0].changelogs.as_ref().unwrap();
        assert_eq!(changelogs.len(), 2);
        assert_eq!(changelogs[0].comment, "v1");
        assert_eq!(changelogs[1].comment, "v2");

        // The deleted definition is retrievable with full history.
        let doomed = registry.get(deleted_id).unwrap();
        assert!(doomed.deleted);

        // Fresh ids never collide with recovered ones.
        let another = registry.create("admin", &ScriptForm::new("another", COUNT_BODY)).unwrap();
        assert!(another.id > kept_id);
        assert!(another.id > deleted_id);
    }
}

/// Test executing a stored definition through the host-facing adapter,
/// including cache invalidation when the definition is updated.
#[test]
fn test_e2e_adapter_execution() {
    init_logging();

    let dir = TempDir::new().unwrap();
    let registry = Arc::new(FunctionRegistry::open(dir.path(), Options::default()).unwrap());

    let created = registry
        .create(
            "admin",
            &ScriptForm::new(
                "echoArgs",
                r#"
                return {
                    values = function(ctx)
                        return { ctx.field, ctx.args[1], ctx.args[2] }
                    end
                }
                "#,
            ),
        )
        .unwrap();

    let adapter = registry.values_adapter(created.id).unwrap();
    assert_eq!(adapter.function_name(), "echoArgs");

    let context = QueryContext::for_user("admin");
    let operand = FunctionOperand::new("echoArgs", vec!["a".to_string(), "b".to_string()]);
    let clause = TerminalClause::new("labels", "in");

    let values = adapter.values(&context, &operand, &clause).unwrap();
    assert_eq!(
        values,
        vec![
            QueryLiteral::text("labels"),
            QueryLiteral::text("a"),
            QueryLiteral::text("b"),
        ]
    );

    // Updating the body rotates the uuid; the adapter recompiles.
    registry
        .update("admin", created.id, &ScriptForm::new("echoArgs", COUNT_BODY_V2))
        .unwrap();

    let values = adapter.values(&context, &operand, &clause).unwrap();
    assert_eq!(values, vec![QueryLiteral::text("high")]);
}

/// Test that a script failing at invocation time surfaces as a script
/// error, while the stored definition remains intact.
#[test]
fn test_e2e_failing_script_propagates() {
    init_logging();

    let dir = TempDir::new().unwrap();
    let registry = Arc::new(FunctionRegistry::open(dir.path(), Options::default()).unwrap());

    // Parses fine, fails when invoked.
    let created = registry
        .create(
            "admin",
            &ScriptForm::new(
                "explosive",
                r#"
                return {
                    values = function(ctx)
                        error("boom: " .. ctx.field)
                    end
                }
                "#,
            ),
        )
        .unwrap();

    let adapter = registry.values_adapter(created.id).unwrap();
    let result = adapter.values(
        &QueryContext::default(),
        &FunctionOperand::new("explosive", vec![]),
        &TerminalClause::new("priority", "="),
    );

    match result {
        Err(Error::Script(msg)) => assert!(msg.contains("boom")),
        other => panic!("expected script error, got {:?}", other),
    }

    // The definition itself is untouched.
    let current = registry.get(created.id).unwrap();
    assert_eq!(current.uuid, created.uuid);
}

/// Test that validation failures leave no trace in state or audit trail.
#[test]
fn test_e2e_validation_failures_leave_no_trace() {
    init_logging();

    let dir = TempDir::new().unwrap();
    let audit = Arc::new(RecordingAuditNotifier::new());
    let registry = FunctionRegistry::open_with(
        dir.path(),
        Options::default(),
        Arc::new(LuaCompiler::new(None)),
        Arc::clone(&audit) as Arc<dyn AuditNotifier>,
        Arc::new(ExecutionTracker::new()),
    )
    .unwrap();

    for form in [
        ScriptForm::new("fn", ""),
        ScriptForm::new("fn", "return {"),
        ScriptForm::new("", COUNT_BODY),
    ] {
        assert!(matches!(
            registry.create("admin", &form),
            Err(Error::Validation { .. })
        ));
    }

    assert!(registry.list_all(false, false).is_empty());
    assert!(audit.is_empty());

    // Reopen sees nothing either: no partial writes reached the log.
    drop(registry);
    let registry = FunctionRegistry::open(dir.path(), Options::default()).unwrap();
    assert!(registry.list_all(false, false).is_empty());
}

/// Test the audit trail across the full lifecycle.
#[test]
fn test_e2e_audit_trail() {
    init_logging();

    let dir = TempDir::new().unwrap();
    let audit = Arc::new(RecordingAuditNotifier::new());
    let registry = FunctionRegistry::open_with(
        dir.path(),
        Options::default(),
        Arc::new(LuaCompiler::new(None)),
        Arc::clone(&audit) as Arc<dyn AuditNotifier>,
        Arc::new(ExecutionTracker::new()),
    )
    .unwrap();

    let created = registry.create("alice", &ScriptForm::new("fn", COUNT_BODY)).unwrap();
    registry
        .update("bob", created.id, &ScriptForm::new("fn", COUNT_BODY_V2).comment("trim"))
        .unwrap();
    registry.delete("carol", created.id).unwrap();
    registry.restore("dave", created.id).unwrap();

    let actions: Vec<EntityAction> = audit.events().iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            EntityAction::Created,
            EntityAction::Updated,
            EntityAction::Deleted,
            EntityAction::Restored,
        ]
    );

    let events = audit.events();
    assert!(events[0].diff.as_ref().unwrap().contains("+"));
    assert!(events[1].diff.is_some());
    assert_eq!(events[2].diff, None);
    assert_eq!(events[2].description, format!("{} - fn", created.id));
    assert_eq!(events[3].diff, None);
}

/// Test that the default log-based notifier works end to end (smoke test;
/// output is only visible with RUST_LOG set).
#[test]
fn test_e2e_default_collaborators() {
    init_logging();

    let dir = TempDir::new().unwrap();
    let registry = FunctionRegistry::open_with(
        dir.path(),
        Options::default(),
        Arc::new(LuaCompiler::new(None)),
        Arc::new(LogAuditNotifier),
        Arc::new(ExecutionTracker::new()),
    )
    .unwrap();

    let created = registry.create("admin", &ScriptForm::new("fn", COUNT_BODY)).unwrap();
    registry.delete("admin", created.id).unwrap();
}
