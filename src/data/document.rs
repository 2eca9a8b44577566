//! Fields and documents
//!
//! A [`Document`] is one row of a dataset: a JSON object plus the id the
//! dataset knows it by. A [`Field`] describes one column.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Date,
    Object,
    GeoPoint,
    Any,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Integer)
    }

    /// Infer a field type from a sample value. Strings are never promoted,
    /// a CSV cell that looks like a number is still a string.
    pub fn infer(value: &Value) -> Option<FieldType> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(FieldType::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(FieldType::Integer),
            Value::Number(_) => Some(FieldType::Number),
            Value::String(_) => Some(FieldType::String),
            Value::Array(_) => Some(FieldType::Any),
            Value::Object(_) => Some(FieldType::Object),
        }
    }

    /// Merge two observed types (for columns with mixed values)
    pub fn merge(self, other: FieldType) -> FieldType {
        match (self, other) {
            (a, b) if a == b => a,
            (FieldType::Integer, FieldType::Number) | (FieldType::Number, FieldType::Integer) => {
                FieldType::Number
            }
            _ => FieldType::Any,
        }
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

impl Field {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            field_type: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// Label to show for this field, falling back to the id
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn is_numeric(&self) -> bool {
        self.field_type.map_or(false, |t| t.is_numeric())
    }
}

pub fn fields_from_headers<S: AsRef<str>>(headers: &[S]) -> Vec<Field> {
    headers.iter().map(|h| Field::new(h.as_ref())).collect()
}

/// Take field ids from the keys of the first row
pub fn infer_fields(rows: &[Value]) -> Vec<Field> {
    rows.first()
        .and_then(Value::as_object)
        .map(|obj| obj.keys().map(Field::new).collect())
        .unwrap_or_default()
}

/// Fill in missing field types from the values present in `rows`
pub fn infer_field_types(fields: &mut [Field], rows: &[Value]) {
    for field in fields.iter_mut().filter(|f| f.field_type.is_none()) {
        let mut inferred: Option<FieldType> = None;
        for value in rows.iter().filter_map(|row| row.get(&field.id)) {
            if let Some(t) = FieldType::infer(value) {
                inferred = Some(inferred.map_or(t, |prev| prev.merge(t)));
            }
        }
        field.field_type = inferred;
    }
}

/// The id a raw row carries, if any. Numeric ids are normalized to strings.
pub fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Give every object row without an `id` its position as id
pub fn assign_index_ids(rows: &mut [Value]) {
    for (index, row) in rows.iter_mut().enumerate() {
        if let Value::Object(map) = row {
            map.entry("id").or_insert_with(|| Value::from(index));
        }
    }
}

/// A single row owned by a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    attributes: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Wrap a raw row. The row's own `id` wins; otherwise `fallback_id` is used.
    /// Non-object rows are stored under a single `value` attribute.
    pub fn from_row(row: Value, fallback_id: impl FnOnce() -> String) -> Self {
        let id = row_id(&row).unwrap_or_else(fallback_id);
        let attributes = match row {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self { id, attributes }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Local change only; call `Dataset::save` to make it visible to the backend
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field == "id" {
            match &value {
                Value::String(s) => self.id = s.clone(),
                Value::Number(n) => self.id = n.to_string(),
                _ => {}
            }
        }
        self.attributes.insert(field, value);
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// The raw row as stored by backends (no synthetic id is added)
    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes.clone())
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let has_id = self.attributes.contains_key("id");
        let len = self.attributes.len() + usize::from(!has_id);
        let mut map = serializer.serialize_map(Some(len))?;
        if !has_id {
            map.serialize_entry("id", &self.id)?;
        }
        for (key, value) in &self.attributes {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_id_normalizes_numbers() {
        assert_eq!(row_id(&json!({"id": 7, "x": 1})), Some("7".to_string()));
        assert_eq!(row_id(&json!({"id": "a-1"})), Some("a-1".to_string()));
        assert_eq!(row_id(&json!({"x": 1})), None);
    }

    #[test]
    fn test_assign_index_ids_keeps_existing() {
        let mut rows = vec![json!({"a": 1}), json!({"id": "x", "a": 2}), json!({"a": 3})];
        assign_index_ids(&mut rows);
        assert_eq!(rows[0]["id"], json!(0));
        assert_eq!(rows[1]["id"], json!("x"));
        assert_eq!(rows[2]["id"], json!(2));
    }

    #[test]
    fn test_document_uses_fallback_id() {
        let doc = Document::from_row(json!({"name": "Jones"}), || "row-4".to_string());
        assert_eq!(doc.id(), "row-4");
        assert_eq!(doc.to_json(), json!({"name": "Jones"}));

        let serialized = serde_json::to_value(&doc).unwrap();
        assert_eq!(serialized, json!({"id": "row-4", "name": "Jones"}));
    }

    #[test]
    fn test_set_id_attribute_changes_document_id() {
        let mut doc = Document::from_row(json!({"id": 1, "x": 2}), || unreachable!());
        doc.set("id", json!(9));
        assert_eq!(doc.id(), "9");
        doc.set("x", json!(3));
        assert_eq!(doc.get("x"), Some(&json!(3)));
    }

    #[test]
    fn test_infer_field_types() {
        let rows = vec![
            json!({"a": 1, "b": "x", "c": null}),
            json!({"a": 2.5, "b": "y", "c": true}),
        ];
        let mut fields = infer_fields(&rows);
        infer_field_types(&mut fields, &rows);
        let types: Vec<_> = fields.iter().map(|f| (f.id.as_str(), f.field_type)).collect();
        assert_eq!(
            types,
            vec![
                ("a", Some(FieldType::Number)),
                ("b", Some(FieldType::String)),
                ("c", Some(FieldType::Boolean)),
            ]
        );
    }

    #[test]
    fn test_field_deserializes_type_key() {
        let field: Field = serde_json::from_value(json!({"id": "price", "type": "number"})).unwrap();
        assert!(field.is_numeric());
        assert_eq!(field.label(), "price");
    }
}
