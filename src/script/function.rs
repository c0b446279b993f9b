//! The Lua-backed value-computing delegate.
//!
//! Each invocation runs in a fresh, single-use Lua VM: the stored chunk
//! is evaluated, the exported `values` function is called with a context
//! table, and the returned sequence is mapped to host literals. The fresh
//! VM means invocations share no interpreter state, so a delegate can be
//! called from any number of query workers at once.

use crate::error::{Error, Result};
use crate::host::{FunctionOperand, QueryContext, QueryLiteral, TerminalClause, ValuesFunction};
use crate::script::compiler::VALUES_EXPORT;
use mlua::Lua;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A scripted implementation of the host's [`ValuesFunction`] contract.
pub struct ScriptedValuesFunction {
    /// Display name, used in log and error messages.
    name: String,

    /// Validated Lua source text.
    source: Arc<str>,

    /// Maximum execution time per invocation.
    timeout: Option<Duration>,
}

impl ScriptedValuesFunction {
    /// Creates a delegate over validated source text.
    pub(crate) fn new(
        name: impl Into<String>,
        source: Arc<str>,
        timeout: Option<Duration>,
    ) -> Self {
        Self { name: name.into(), source, timeout }
    }

    /// Returns the delegate's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the `ctx` table passed to the script's `values` function.
    fn build_context_table<'lua>(
        lua: &'lua Lua,
        context: &QueryContext,
        operand: &FunctionOperand,
        clause: &TerminalClause,
    ) -> mlua::Result<mlua::Table<'lua>> {
        let ctx = lua.create_table()?;

        ctx.set("name", operand.name.as_str())?;
        ctx.set("field", clause.field.as_str())?;
        ctx.set("operator", clause.operator.as_str())?;

        let args = lua.create_table()?;
        for (i, arg) in operand.args.iter().enumerate() {
            args.set(i + 1, arg.as_str())?;
        }
        ctx.set("args", args)?;

        if let Some(user) = &context.user {
            ctx.set("user", user.as_str())?;
        }
        ctx.set("security_overridden", context.security_overridden)?;

        Ok(ctx)
    }

    /// Maps the script's return value to host literals.
    fn convert_literals(value: mlua::Value<'_>) -> mlua::Result<Vec<QueryLiteral>> {
        let table = match value {
            mlua::Value::Table(table) => table,
            mlua::Value::Nil => return Ok(Vec::new()),
            other => {
                return Err(mlua::Error::RuntimeError(format!(
                    "'{}' must return a sequence of values, got {}",
                    VALUES_EXPORT,
                    other.type_name()
                )));
            }
        };

        let mut literals = Vec::new();
        for item in table.sequence_values::<mlua::Value>() {
            match item? {
                mlua::Value::String(s) => literals.push(QueryLiteral::Text(s.to_str()?.to_string())),
                mlua::Value::Integer(i) => literals.push(QueryLiteral::Number(i)),
                mlua::Value::Number(n) => literals.push(QueryLiteral::Number(n as i64)),
                other => {
                    return Err(mlua::Error::RuntimeError(format!(
                        "unsupported literal type: {}",
                        other.type_name()
                    )));
                }
            }
        }

        Ok(literals)
    }
}

impl ValuesFunction for ScriptedValuesFunction {
    fn values(
        &self,
        context: &QueryContext,
        operand: &FunctionOperand,
        clause: &TerminalClause,
    ) -> Result<Vec<QueryLiteral>> {
        let start_time = Instant::now();

        let lua = Lua::new();

        // Set up timeout hook if specified
        if let Some(timeout) = self.timeout {
            let timeout_start = start_time;
            lua.set_hook(
                mlua::HookTriggers {
                    every_nth_instruction: Some(1000),
                    ..Default::default()
                },
                move |_lua, _debug| {
                    if timeout_start.elapsed() > timeout {
                        Err(mlua::Error::RuntimeError("Script execution timeout".to_string()))
                    } else {
                        Ok(())
                    }
                },
            );
        }

        let result = (|| -> mlua::Result<Vec<QueryLiteral>> {
            let exports = lua.load(self.source.as_ref()).eval::<mlua::Value<'_>>()?;

            let table = match exports {
                mlua::Value::Table(table) => table,
                other => {
                    return Err(mlua::Error::RuntimeError(format!(
                        "script must return a table, got {}",
                        other.type_name()
                    )));
                }
            };

            let values_fn = match table.get::<_, mlua::Value>(VALUES_EXPORT)? {
                mlua::Value::Function(f) => f,
                other => {
                    return Err(mlua::Error::RuntimeError(format!(
                        "script must export a '{}' function, got {}",
                        VALUES_EXPORT,
                        other.type_name()
                    )));
                }
            };

            let ctx = Self::build_context_table(&lua, context, operand, clause)?;
            let returned = values_fn.call::<_, mlua::Value>(ctx)?;

            Self::convert_literals(returned)
        })();

        match result {
            Ok(literals) => {
                log::debug!(
                    "scripted function '{}' produced {} values in {:?}",
                    self.name,
                    literals.len(),
                    start_time.elapsed()
                );
                Ok(literals)
            }
            Err(e) => {
                log::warn!("scripted function '{}' failed: {}", self.name, e);
                Err(Error::script(format!("Lua function '{}' failed: {}", self.name, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::compiler::{LuaCompiler, ScriptCompiler};

    fn delegate(source: &str) -> ScriptedValuesFunction {
        LuaCompiler::new(Some(Duration::from_secs(5)))
            .parse(source, false)
            .unwrap()
            .values_function("test function")
    }

    fn invoke(source: &str) -> Result<Vec<QueryLiteral>> {
        delegate(source).values(
            &QueryContext::for_user("admin"),
            &FunctionOperand::new("testFunction", vec!["7".to_string()]),
            &TerminalClause::new("priority", "in"),
        )
    }

    #[test]
    fn test_values_returns_literals() {
        let literals = invoke(
            r#"
            return {
                values = function(ctx)
                    return { "high", "critical", 42 }
                end
            }
            "#,
        )
        .unwrap();

        assert_eq!(
            literals,
            vec![
                QueryLiteral::text("high"),
                QueryLiteral::text("critical"),
                QueryLiteral::number(42),
            ]
        );
    }

    #[test]
    fn test_values_sees_invocation_context() {
        let literals = invoke(
            r#"
            return {
                values = function(ctx)
                    return { ctx.field, ctx.operator, ctx.args[1], ctx.user, ctx.name }
                end
            }
            "#,
        )
        .unwrap();

        assert_eq!(
            literals,
            vec![
                QueryLiteral::text("priority"),
                QueryLiteral::text("in"),
                QueryLiteral::text("7"),
                QueryLiteral::text("admin"),
                QueryLiteral::text("testFunction"),
            ]
        );
    }

    #[test]
    fn test_empty_and_nil_results() {
        assert!(invoke("return { values = function(ctx) return {} end }").unwrap().is_empty());
        assert!(invoke("return { values = function(ctx) end }").unwrap().is_empty());
    }

    #[test]
    fn test_script_runtime_error_propagates() {
        let result = invoke(
            r#"
            return {
                values = function(ctx)
                    error("nope")
                end
            }
            "#,
        );

        match result {
            Err(Error::Script(msg)) => assert!(msg.contains("nope")),
            other => panic!("expected script error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_export_is_a_script_error() {
        let result = invoke("return { something_else = 1 }");
        assert!(matches!(result, Err(Error::Script(_))));
    }

    #[test]
    fn test_unsupported_literal_is_a_script_error() {
        let result = invoke("return { values = function(ctx) return { true } end }");
        assert!(matches!(result, Err(Error::Script(_))));
    }

    #[test]
    fn test_timeout_aborts_runaway_script() {
        let runaway = LuaCompiler::new(Some(Duration::from_millis(100)))
            .parse(
                r#"
                return {
                    values = function(ctx)
                        while true do end
                    end
                }
                "#,
                false,
            )
            .unwrap()
            .values_function("runaway");

        let result = runaway.values(
            &QueryContext::default(),
            &FunctionOperand::new("runaway", vec![]),
            &TerminalClause::new("f", "="),
        );

        assert!(matches!(result, Err(Error::Script(_))));
    }
}
