use data_explorer::data::transform::{apply, compile, is_delete_marker, preview, TransformError};
use serde_json::{json, Value};

fn docs() -> Vec<Value> {
    vec![
        json!({"id": "1", "price": 10, "name": "bolt"}),
        json!({"id": "2", "price": 0, "name": "nut"}),
        json!({"id": "3", "price": 4, "name": "gear"}),
        json!({"id": "4", "price": 7, "name": "spring"}),
    ]
}

const SOURCE: &str = r#"
function(doc)
  if doc.name == "gear" then error("gears are special") end
  if doc.price == 0 then return nil end
  if doc.name == "spring" then return doc end
  doc.price = doc.price * 2
  return doc
end
"#;

#[test]
fn test_failure_is_isolated() {
    let transform = compile(SOURCE).unwrap();
    let input = docs();
    let result = apply(&input, &transform);

    assert_eq!(result.docs.len(), 4);
    assert_eq!(result.failed, vec![input[2].clone()]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].0, 2);
    assert!(matches!(&result.errors[0].1, TransformError::Runtime { message } if message.contains("gears are special")));

    assert_eq!(result.deleted, vec![input[1].clone()]);
    assert_eq!(result.edited.len(), 2);
    assert_eq!(result.edited[0]["price"], json!(20));
    assert!(is_delete_marker(&result.edited[1]));
    assert!(result.docs[2].is_none());
}

#[test]
fn test_unchanged_document_is_neither_edited_nor_deleted() {
    let transform = compile("function(doc) return doc end").unwrap();
    let result = apply(&docs(), &transform);
    assert!(result.edited.is_empty());
    assert!(result.deleted.is_empty());
    assert!(!result.has_failures());
}

#[test]
fn test_caller_documents_are_untouched() {
    let input = docs();
    let before = input.clone();
    let transform = compile("function(doc) doc.price = -1 doc.extra = true return doc end").unwrap();
    let result = apply(&input, &transform);
    assert_eq!(input, before);
    assert_eq!(result.edited.len(), 4);
}

#[test]
fn test_compile_errors_are_data() {
    assert!(matches!(
        compile("function(doc) return doc"),
        Err(TransformError::Compile { .. })
    ));
    assert!(matches!(compile("42"), Err(TransformError::Compile { .. })));
}

#[test]
fn test_sandbox_has_no_io() {
    let transform = compile("function(doc) io.write('x') return doc end").unwrap();
    let result = apply(&docs()[..1], &transform);
    assert_eq!(result.failed.len(), 1);

    assert!(matches!(
        compile("function(doc) os.exit(1) end").map(|t| t.call(&json!({}))),
        Ok(Err(TransformError::Runtime { .. }))
    ));
}

#[test]
fn test_preview_pairs() {
    let transform = compile(SOURCE).unwrap();
    let rows = preview(&docs(), &transform, Some("price"));
    assert_eq!(rows[0].before, "10");
    assert_eq!(rows[0].after, "20");
    // deleted and failed rows render as empty after
    assert_eq!(rows[1].after, "");
    assert_eq!(rows[2].after, "");
    assert_eq!(rows[3].before, rows[3].after);

    let whole = preview(&docs()[..1], &transform, None);
    assert_eq!(whole[0].after, r#"{"id":"1","name":"bolt","price":20}"#);
}
