//! Script compilation boundary.
//!
//! The registry validates bodies through the [`ScriptCompiler`] trait and
//! the runtime obtains delegates from the [`CompiledScript`] factory it
//! yields. The concrete compiler is Lua via `mlua`; nothing outside this
//! module depends on that choice.
//!
//! A script exports its function by returning a table:
//!
//! ```lua
//! return {
//!     values = function(ctx)
//!         -- ctx.field, ctx.operator, ctx.args, ctx.user
//!         return { "high", "critical" }
//!     end
//! }
//! ```

use crate::error::{Error, Result};
use crate::script::function::ScriptedValuesFunction;
use mlua::Lua;
use std::sync::Arc;
use std::time::Duration;

/// Name of the function a script's exported table must expose.
pub const VALUES_EXPORT: &str = "values";

/// Turns script source text into a loadable artifact.
pub trait ScriptCompiler: Send + Sync {
    /// Compiles `source`, returning a factory for runnable instances.
    ///
    /// With `strict = false` only the syntax is checked. With
    /// `strict = true` the chunk is additionally executed once and must
    /// yield a table exposing a `values` function.
    ///
    /// # Errors
    ///
    /// Returns `Error::Script` when the source does not compile, or (in
    /// strict mode) does not satisfy the export contract.
    fn parse(&self, source: &str, strict: bool) -> Result<CompiledScript>;
}

/// A successfully compiled script, usable as a delegate factory.
///
/// Instances produced by the factory are independent: each invocation of
/// a produced delegate runs in a fresh VM, so instances are safe to call
/// from concurrent query workers.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    source: Arc<str>,
    timeout: Option<Duration>,
}

impl CompiledScript {
    /// Returns the validated source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Produces a value-computing delegate named `name` from this script.
    pub fn values_function(&self, name: impl Into<String>) -> ScriptedValuesFunction {
        ScriptedValuesFunction::new(name, Arc::clone(&self.source), self.timeout)
    }
}

/// The Lua implementation of [`ScriptCompiler`].
///
/// Compilation happens in a throwaway VM; the VM used for any later
/// invocation is created fresh by the delegate itself.
#[derive(Debug, Clone, Default)]
pub struct LuaCompiler {
    /// Execution time limit handed to produced delegates.
    timeout: Option<Duration>,
}

impl LuaCompiler {
    /// Creates a compiler whose produced delegates enforce `timeout`.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ScriptCompiler for LuaCompiler {
    fn parse(&self, source: &str, strict: bool) -> Result<CompiledScript> {
        let lua = Lua::new();

        // Syntax check: compiling the chunk does not execute it.
        let chunk = lua
            .load(source)
            .into_function()
            .map_err(|e| Error::script(format!("Lua parse failed: {}", e)))?;

        if strict {
            let exports = chunk
                .call::<_, mlua::Value>(())
                .map_err(|e| Error::script(format!("Lua evaluation failed: {}", e)))?;

            let table = match exports {
                mlua::Value::Table(table) => table,
                other => {
                    return Err(Error::script(format!(
                        "script must return a table, got {}",
                        other.type_name()
                    )));
                }
            };

            let values = table
                .get::<_, mlua::Value>(VALUES_EXPORT)
                .map_err(|e| Error::script(format!("Lua evaluation failed: {}", e)))?;

            if !matches!(values, mlua::Value::Function(_)) {
                return Err(Error::script(format!(
                    "script must export a '{}' function, got {}",
                    VALUES_EXPORT,
                    values.type_name()
                )));
            }
        }

        Ok(CompiledScript { source: Arc::from(source), timeout: self.timeout })
    }
}
