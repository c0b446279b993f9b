//! Isolated execution contexts for dynamically loaded functions.
//!
//! Code produced from operator-supplied scripts must not resolve names
//! against whatever namespace the host query engine happens to have
//! active. Each scripted function owns an `IsolatedContext` carrying a
//! unique namespace id; while the function's code runs, that namespace is
//! the thread's current resolution namespace.
//!
//! The context performs no business logic. It is a thread-scoped pointer
//! switch with scoped-acquisition semantics: `enter()` returns a
//! [`ContextGuard`] whose drop restores whatever was active before, on
//! every exit path including panics. Nested enter/exit pairs from the
//! same call stack nest LIFO, and contexts entered on different threads
//! never observe one another.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Globally unique identifier of one isolated namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(u64);

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns-{}", self.0)
    }
}

/// Namespace id generator.
static NEXT_NAMESPACE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Stack of namespaces active on the current thread, innermost last.
    static ACTIVE: RefCell<Vec<NamespaceId>> = RefCell::new(Vec::new());
}

/// A scoped, reentrant-safe resolution namespace for one scripted function.
///
/// # Example
///
/// ```rust
/// use luafn::script::IsolatedContext;
///
/// let context = IsolatedContext::new();
/// assert_eq!(IsolatedContext::current(), None);
///
/// {
///     let _guard = context.enter();
///     assert_eq!(IsolatedContext::current(), Some(context.namespace()));
/// }
///
/// // Guard dropped: prior state restored.
/// assert_eq!(IsolatedContext::current(), None);
/// ```
#[derive(Debug)]
pub struct IsolatedContext {
    namespace: NamespaceId,
}

impl IsolatedContext {
    /// Creates a context with a fresh, globally unique namespace.
    pub fn new() -> Self {
        Self { namespace: NamespaceId(NEXT_NAMESPACE.fetch_add(1, Ordering::SeqCst)) }
    }

    /// Returns this context's namespace id.
    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    /// Activates this context's namespace on the calling thread.
    ///
    /// The returned guard deactivates it again when dropped, restoring
    /// whatever namespace was active before. The guard must be held for
    /// the whole protected region; it is not sendable to another thread.
    /// Repeated or nested enters from the same call are fine and unwind
    /// in LIFO order.
    pub fn enter(&self) -> ContextGuard {
        ACTIVE.with(|stack| stack.borrow_mut().push(self.namespace));
        ContextGuard { namespace: self.namespace, _not_send: PhantomData }
    }

    /// Returns the namespace active on the calling thread, if any.
    pub fn current() -> Option<NamespaceId> {
        ACTIVE.with(|stack| stack.borrow().last().copied())
    }
}

impl Default for IsolatedContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one activation of an [`IsolatedContext`].
///
/// Dropping the guard pops the activation and restores the previously
/// active namespace. The drop runs on every exit path from the protected
/// region, including unwinds.
#[must_use = "the context is only active while the guard is held"]
pub struct ContextGuard {
    namespace: NamespaceId,
    // Activation is thread-scoped; the guard must drop on the entering thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        ACTIVE.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if popped != Some(self.namespace) {
                // Guards are !Send and pop LIFO, so this indicates a bug
                // in the crate itself rather than in a caller.
                log::warn!(
                    "unbalanced context exit: expected {}, popped {:?}",
                    self.namespace,
                    popped
                );
            }
        });
    }
}

/// Runs `f` with `context` active, guaranteeing exit on every path.
///
/// The guard is acquired before `f` runs; if acquisition does not
/// complete, `f` is never invoked and no exit is attempted.
pub fn with_isolated_context<R>(context: &IsolatedContext, f: impl FnOnce() -> R) -> R {
    let _guard = context.enter();
    f()
}
