use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

/// Top-level fields of a document.
pub type Fields = serde_json::Map<String, Value>;

/// Name under which filters address the document id.
pub const ID_FIELD: &str = "id";

/// A stored document: its id plus an opaque JSON object of fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Document {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Reads a list of strings, skipping any non-string entries.
    pub fn str_list(&self, name: &str) -> Vec<String> {
        match self.field(name) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn matches_eq(&self, field: &str, value: &Value) -> bool {
        if field == ID_FIELD {
            return value.as_str() == Some(self.id.as_str());
        }
        self.field(field) == Some(value)
    }

    pub fn matches_in(&self, field: &str, values: &[String]) -> bool {
        let actual = if field == ID_FIELD {
            Some(self.id.as_str())
        } else {
            self.str_field(field)
        };
        actual.is_some_and(|actual| values.iter().any(|v| v == actual))
    }

    /// Deserializes the document into a typed record. The document id is
    /// exposed to the record as an `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut fields = self.fields.clone();
        fields.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));

        serde_json::from_value(Value::Object(fields)).map_err(|e| StoreError::InvalidDocument {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

impl fanout::Keyed for Document {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Serializes a record into document fields. The value must serialize to a
/// JSON object.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidDocument {
            id: String::new(),
            reason: format!("expected an object, got {other}"),
        }),
    }
}

/// Applies a partial update to `fields`.
///
/// Top-level keys replace the existing value. A dotted key such as
/// `grades.s1` sets one entry of a nested object, creating the object if it
/// is missing.
pub fn apply_partial(fields: &mut Fields, partial: Fields) {
    for (key, value) in partial {
        match key.split_once('.') {
            Some((parent, child)) => {
                let entry = fields
                    .entry(parent.to_string())
                    .or_insert_with(|| Value::Object(Fields::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Fields::new());
                }
                if let Value::Object(nested) = entry {
                    nested.insert(child.to_string(), value);
                }
            }
            None => {
                fields.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Notice {
        id: String,
        author_id: String,
        created_at: i64,
    }

    #[test]
    fn test_decode_includes_id() {
        let doc = Document::new("n1", fields(json!({"authorId": "t1", "createdAt": 5})));
        let notice: Notice = doc.decode().unwrap();
        assert_eq!(
            notice,
            Notice {
                id: "n1".into(),
                author_id: "t1".into(),
                created_at: 5,
            }
        );
    }

    #[test]
    fn test_decode_reports_document_id() {
        let doc = Document::new("n2", fields(json!({"authorId": 7})));
        let err = doc.decode::<Notice>().unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { id, .. } if id == "n2"));
    }

    #[test]
    fn test_encode_rejects_non_objects() {
        assert!(encode(&json!({"a": 1})).is_ok());
        assert!(matches!(
            encode(&json!([1, 2])),
            Err(StoreError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_matching() {
        let doc = Document::new("q1", fields(json!({"teacherId": "t1", "status": "open"})));
        assert!(doc.matches_eq("teacherId", &json!("t1")));
        assert!(!doc.matches_eq("teacherId", &json!("t2")));
        assert!(doc.matches_eq("id", &json!("q1")));
        assert!(doc.matches_in("teacherId", &["t9".into(), "t1".into()]));
        assert!(doc.matches_in("id", &["q1".into()]));
        assert!(!doc.matches_in("missing", &["t1".into()]));
    }

    #[test]
    fn test_apply_partial() {
        let mut doc = fields(json!({"title": "old", "grades": {"s1": "B"}, "flat": 3}));
        apply_partial(
            &mut doc,
            fields(json!({"title": "new", "grades.s2": "A", "flat.x": 1})),
        );

        assert_eq!(
            Value::Object(doc),
            json!({"title": "new", "grades": {"s1": "B", "s2": "A"}, "flat": {"x": 1}})
        );
    }

    #[test]
    fn test_str_list_skips_non_strings() {
        let doc = Document::new("s1", fields(json!({"preferredTeachers": ["t1", 4, "t2"]})));
        assert_eq!(doc.str_list("preferredTeachers"), vec!["t1", "t2"]);
        assert!(doc.str_list("missing").is_empty());
    }
}
