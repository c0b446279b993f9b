//! The adapter between the host query engine and scripted delegates.
//!
//! The host engine resolves a function by name and calls whatever
//! implements its [`ValuesFunction`] contract. `ValuesFunctionAdapter`
//! satisfies that contract over a dynamically produced delegate: every
//! invocation enters the adapter's isolated context, obtains the current
//! delegate from a [`Provider`], and invokes it, with the context exit
//! guaranteed on every path. The adapter never interprets, wraps, or
//! suppresses delegate errors.

use crate::error::Result;
use crate::host::{FunctionOperand, QueryContext, QueryLiteral, TerminalClause, ValuesFunction};
use crate::script::compiler::ScriptCompiler;
use crate::script::context::{IsolatedContext, NamespaceId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Capability interface for obtaining the current delegate instance.
///
/// Whether `get` returns a cached instance or lazily recompiles is the
/// provider's business; the adapter is agnostic.
pub trait Provider<T>: Send + Sync {
    /// Returns the current instance.
    fn get(&self) -> Result<T>;
}

impl<T, F> Provider<T> for F
where
    F: Fn() -> Result<T> + Send + Sync,
{
    fn get(&self) -> Result<T> {
        self()
    }
}

/// Exposes one scripted delegate behind the host's function contract.
pub struct ValuesFunctionAdapter {
    /// Stable key the adapter is registered under in the host engine.
    key: String,

    /// Function name as written in queries.
    function_name: String,

    /// The delegate's isolated resolution namespace.
    context: IsolatedContext,

    /// Source of the current delegate instance.
    delegate: Arc<dyn Provider<Arc<dyn ValuesFunction>>>,
}

impl ValuesFunctionAdapter {
    /// Creates an adapter for `function_name`, registered under `key`.
    pub fn new(
        key: impl Into<String>,
        function_name: impl Into<String>,
        context: IsolatedContext,
        delegate: Arc<dyn Provider<Arc<dyn ValuesFunction>>>,
    ) -> Self {
        Self {
            key: key.into(),
            function_name: function_name.into(),
            context,
            delegate,
        }
    }

    /// Returns the registration key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the function name as seen in queries.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Returns the adapter's namespace id.
    pub fn namespace(&self) -> NamespaceId {
        self.context.namespace()
    }
}

impl ValuesFunction for ValuesFunctionAdapter {
    fn values(
        &self,
        context: &QueryContext,
        operand: &FunctionOperand,
        clause: &TerminalClause,
    ) -> Result<Vec<QueryLiteral>> {
        // Guard drops on every return path, restoring the prior namespace
        // even when the provider or the delegate fails.
        let _guard = self.context.enter();

        let delegate = self.delegate.get()?;
        delegate.values(context, operand, clause)
    }
}

/// The current revision of a definition, as seen by a provider.
#[derive(Debug, Clone)]
pub struct ScriptRevision {
    /// Content-version token of the revision.
    pub uuid: String,
    /// Display name of the definition.
    pub name: String,
    /// Lua source text of the revision.
    pub source: String,
}

/// A [`Provider`] that compiles lazily and caches by version token.
///
/// `fetch` reports the definition's current revision. The compiled
/// delegate is reused as long as the uuid matches; a rotated uuid makes
/// the cached delegate stale and triggers recompilation, which is exactly
/// the invalidation contract the registry's uuid rotation promises.
pub struct CachedDelegateProvider {
    fetch: Box<dyn Fn() -> Result<ScriptRevision> + Send + Sync>,
    compiler: Arc<dyn ScriptCompiler>,
    cached: Mutex<Option<(String, Arc<dyn ValuesFunction>)>>,
}

impl CachedDelegateProvider {
    /// Creates a provider over a revision source and a compiler.
    pub fn new(
        fetch: impl Fn() -> Result<ScriptRevision> + Send + Sync + 'static,
        compiler: Arc<dyn ScriptCompiler>,
    ) -> Self {
        Self { fetch: Box::new(fetch), compiler, cached: Mutex::new(None) }
    }
}

impl Provider<Arc<dyn ValuesFunction>> for CachedDelegateProvider {
    fn get(&self) -> Result<Arc<dyn ValuesFunction>> {
        let revision = (self.fetch)()?;

        let mut cached = self.cached.lock();
        if let Some((uuid, delegate)) = cached.as_ref() {
            if *uuid == revision.uuid {
                return Ok(Arc::clone(delegate));
            }
        }

        log::debug!(
            "compiling delegate for '{}' at version {}",
            revision.name,
            revision.uuid
        );

        let compiled = self.compiler.parse(&revision.source, false)?;
        let delegate: Arc<dyn ValuesFunction> =
            Arc::new(compiled.values_function(revision.name.clone()));

        *cached = Some((revision.uuid, Arc::clone(&delegate)));

        Ok(delegate)
    }
}
