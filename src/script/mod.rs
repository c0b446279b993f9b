//! Scripted-function execution: compilation, isolation, and adaptation.
//!
//! This module is the execution half of the crate. The registry owns the
//! authoritative source text; everything here turns that text into
//! something the host query engine can safely call:
//!
//! - **LuaCompiler**: compiles source into a [`CompiledScript`] factory
//! - **ScriptedValuesFunction**: one runnable delegate, fresh VM per call
//! - **IsolatedContext**: the namespace active while delegate code runs
//! - **ValuesFunctionAdapter**: the host-facing wrapper that enters the
//!   context, delegates, and guarantees exit on every path
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use luafn::host::{FunctionOperand, QueryContext, TerminalClause, ValuesFunction};
//! use luafn::script::{IsolatedContext, LuaCompiler, ScriptCompiler, ValuesFunctionAdapter};
//!
//! # fn main() -> Result<(), luafn::Error> {
//! let compiler = LuaCompiler::default();
//! let compiled = compiler.parse(
//!     r#"return { values = function(ctx) return { "high" } end }"#,
//!     false,
//! )?;
//!
//! let delegate: Arc<dyn ValuesFunction> = Arc::new(compiled.values_function("highPriority"));
//! let adapter = ValuesFunctionAdapter::new(
//!     "script-1",
//!     "highPriority",
//!     IsolatedContext::new(),
//!     Arc::new(move || Ok(Arc::clone(&delegate))),
//! );
//!
//! let values = adapter.values(
//!     &QueryContext::default(),
//!     &FunctionOperand::new("highPriority", vec![]),
//!     &TerminalClause::new("priority", "in"),
//! )?;
//! assert_eq!(values.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod compiler;
pub mod context;
pub mod function;

pub use adapter::{CachedDelegateProvider, Provider, ScriptRevision, ValuesFunctionAdapter};
pub use compiler::{CompiledScript, LuaCompiler, ScriptCompiler};
pub use context::{with_isolated_context, ContextGuard, IsolatedContext, NamespaceId};
pub use function::ScriptedValuesFunction;
