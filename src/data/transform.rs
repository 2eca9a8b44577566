//! Bulk row transforms
//!
//! A transform is a Lua function expression of one argument:
//!
//! ```lua
//! function(doc)
//!   doc.price = doc.price * 2
//!   return doc
//! end
//! ```
//!
//! Returning `nil` deletes the document. The function runs in its own Lua
//! state with only the `string`, `table`, `math` and `utf8` libraries and a
//! memory cap; it has no file, process or module access. Each document is
//! copied into a fresh Lua table, so the caller's rows are never touched.
//!
//! This is not a sandbox against hostile code (CPU time is unbounded).
//! Do not expose it to untrusted users without isolating the process.

use mlua::{Function, Lua, LuaOptions, LuaSerdeExt, StdLib};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

const MEMORY_LIMIT: usize = 64 * 1024 * 1024;
const BLOCKED_GLOBALS: &[&str] = &["dofile", "loadfile", "load", "require", "collectgarbage"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("Compile error: {message}")]
    Compile { message: String },

    #[error("Transform failed: {message}")]
    Runtime { message: String },
}

impl TransformError {
    fn compile(message: impl Into<String>) -> Self {
        TransformError::Compile {
            message: message.into(),
        }
    }

    fn runtime(message: impl Into<String>) -> Self {
        TransformError::Runtime {
            message: message.into(),
        }
    }
}

/// A compiled transform, ready to run over many documents
pub struct TransformFn {
    lua: Lua,
    function: Function,
}

impl std::fmt::Debug for TransformFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformFn").finish_non_exhaustive()
    }
}

/// Compile transform source. Syntax errors and sources that do not
/// evaluate to a function come back as [`TransformError::Compile`].
pub fn compile(source: &str) -> Result<TransformFn, TransformError> {
    let libs = StdLib::STRING | StdLib::TABLE | StdLib::MATH | StdLib::UTF8;
    let lua = Lua::new_with(libs, LuaOptions::new())
        .map_err(|e| TransformError::compile(e.to_string()))?;
    lua.set_memory_limit(MEMORY_LIMIT)
        .map_err(|e| TransformError::compile(e.to_string()))?;

    let globals = lua.globals();
    for name in BLOCKED_GLOBALS {
        globals
            .set(*name, mlua::Value::Nil)
            .map_err(|e| TransformError::compile(e.to_string()))?;
    }

    let value = lua
        .load(source)
        .set_name("transform")
        .eval::<mlua::Value>()
        .map_err(|e| match e {
            mlua::Error::SyntaxError { message, .. } => TransformError::compile(message),
            other => TransformError::compile(other.to_string()),
        })?;

    match value {
        mlua::Value::Function(function) => Ok(TransformFn { lua, function }),
        other => Err(TransformError::compile(format!(
            "expected a function, got {}",
            other.type_name()
        ))),
    }
}

impl TransformFn {
    /// Run the function on one document. `Ok(None)` means delete.
    pub fn call(&self, doc: &Value) -> Result<Option<Value>, TransformError> {
        let arg = self
            .lua
            .to_value(doc)
            .map_err(|e| TransformError::runtime(e.to_string()))?;
        let result: mlua::Value = self
            .function
            .call(arg)
            .map_err(|e| TransformError::runtime(e.to_string()))?;

        if result.is_nil() || result == mlua::Value::NULL {
            return Ok(None);
        }
        let value: Value = self
            .lua
            .from_value(result)
            .map_err(|e| TransformError::runtime(e.to_string()))?;
        match value {
            Value::Object(_) => Ok(Some(value)),
            other => Err(TransformError::runtime(format!(
                "transform must return a table or nil, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Stands in for a deleted document in `TransformResult::docs`/`edited`
pub fn delete_marker() -> Value {
    json!({"_deleted": true})
}

pub fn is_delete_marker(value: &Value) -> bool {
    value.get("_deleted") == Some(&Value::Bool(true))
}

/// Outcome of running a transform over a document set
#[derive(Debug, Clone, Default)]
pub struct TransformResult {
    /// One entry per input, in order; `None` where the transform failed
    pub docs: Vec<Option<Value>>,
    /// Results that differ from their input by value, plus delete markers
    pub edited: Vec<Value>,
    /// Inputs whose transform returned nil
    pub deleted: Vec<Value>,
    /// Inputs whose transform raised
    pub failed: Vec<Value>,
    /// Input index and error for each failure
    pub errors: Vec<(usize, TransformError)>,
}

impl TransformResult {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Structural equality where numbers compare by value, so an integer and the
/// integral float a transform turns it into are the same.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_f64() || y.is_f64() => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| same_value(x, y)))
        }
        _ => a == b,
    }
}

/// Run `transform` over every document. A failing document is recorded and
/// skipped; the rest of the batch still runs.
pub fn apply(docs: &[Value], transform: &TransformFn) -> TransformResult {
    let mut result = TransformResult {
        docs: Vec::with_capacity(docs.len()),
        ..Default::default()
    };

    for (index, doc) in docs.iter().enumerate() {
        match transform.call(doc) {
            Ok(None) => {
                let marker = delete_marker();
                result.edited.push(marker.clone());
                result.deleted.push(doc.clone());
                result.docs.push(Some(marker));
            }
            Ok(Some(updated)) => {
                if !same_value(&updated, doc) {
                    result.edited.push(updated.clone());
                }
                result.docs.push(Some(updated));
            }
            Err(err) => {
                warn!(index, error = %err, "Transform failed for document");
                result.failed.push(doc.clone());
                result.errors.push((index, err));
                result.docs.push(None);
            }
        }
    }

    debug!(
        total = docs.len(),
        edited = result.edited.len(),
        deleted = result.deleted.len(),
        failed = result.failed.len(),
        "Transform applied"
    );
    result
}

/// Before/after text for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub before: String,
    pub after: String,
}

/// Show what `transform` would do, as JSON text pairs. With `focus` only
/// that field is shown; deleted and failed documents show `{}` afterwards.
pub fn preview(docs: &[Value], transform: &TransformFn, focus: Option<&str>) -> Vec<PreviewRow> {
    let result = apply(docs, transform);
    let empty = Value::Object(Default::default());

    docs.iter()
        .zip(result.docs.iter())
        .map(|(before, after)| {
            let after = match after {
                Some(doc) if !is_delete_marker(doc) => doc,
                _ => &empty,
            };
            match focus {
                Some(field) => PreviewRow {
                    before: render(before.get(field)),
                    after: render(after.get(field)),
                },
                None => PreviewRow {
                    before: render(Some(before)),
                    after: render(Some(after)),
                },
            }
        })
        .collect()
}

fn render(value: Option<&Value>) -> String {
    value
        .map(|v| serde_json::to_string(v).unwrap_or_default())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_rejects_syntax_errors() {
        let err = compile("function(doc) return doc").unwrap_err();
        assert!(matches!(err, TransformError::Compile { .. }));
    }

    #[test]
    fn test_compile_requires_function() {
        let err = compile("'not a function'").unwrap_err();
        match err {
            TransformError::Compile { message } => assert!(message.contains("string")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sandbox_has_no_io() {
        let f = compile("function(doc) doc.x = io.open('/etc/passwd') return doc end").unwrap();
        assert!(f.call(&json!({"x": 1})).is_err());
        let f = compile("function(doc) return require('os') end").unwrap();
        assert!(f.call(&json!({})).is_err());
    }

    #[test]
    fn test_call_edits_copy() {
        let f = compile("function(doc) doc.price = doc.price * 2 return doc end").unwrap();
        let original = json!({"id": 1, "price": 5});
        let updated = f.call(&original).unwrap().unwrap();
        assert_eq!(updated, json!({"id": 1, "price": 10}));
        assert_eq!(original["price"], json!(5));
    }

    #[test]
    fn test_nil_means_delete() {
        let f = compile("function(doc) if doc.id == 2 then return nil end return doc end").unwrap();
        assert_eq!(f.call(&json!({"id": 2})).unwrap(), None);
        assert!(f.call(&json!({"id": 3})).unwrap().is_some());
    }

    #[test]
    fn test_non_table_result_is_runtime_error() {
        let f = compile("function(doc) return 'x' end").unwrap();
        assert!(matches!(
            f.call(&json!({})),
            Err(TransformError::Runtime { .. })
        ));
    }

    #[test]
    fn test_preview_focus_field() {
        let f = compile("function(doc) doc.name = string.upper(doc.name) return doc end").unwrap();
        let docs = vec![json!({"name": "ann"}), json!({"other": 1})];
        let rows = preview(&docs, &f, Some("name"));
        assert_eq!(rows[0].before, "\"ann\"");
        assert_eq!(rows[0].after, "\"ANN\"");
        // string.upper(nil) raises, the failed row shows an empty object
        assert_eq!(rows[1].before, "");
        assert_eq!(rows[1].after, "");
    }

    #[test]
    fn test_integral_float_is_not_an_edit() {
        let f = compile("function(doc) doc.n = doc.n / 1 return doc end").unwrap();
        let docs = vec![json!({"id": 1, "n": 5}), json!({"id": 2, "n": 3})];
        let result = apply(&docs, &f);
        assert_eq!(result.docs.len(), 2);
        assert!(result.edited.is_empty());

        let f = compile("function(doc) doc.n = doc.n / 2 return doc end").unwrap();
        let result = apply(&docs, &f);
        assert_eq!(result.edited.len(), 2);
    }

    #[test]
    fn test_same_value_by_number() {
        assert!(same_value(&json!({"a": [1, {"b": 2}]}), &json!({"a": [1.0, {"b": 2.0}]})));
        assert!(!same_value(&json!({"a": 1}), &json!({"a": 1.5})));
        assert!(!same_value(&json!({"a": 1}), &json!({"a": 1, "b": null})));
        assert!(!same_value(&json!(1), &json!("1")));
    }
}
