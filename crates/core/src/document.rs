//! Core document types for DevCamper.
//!
//! A `Document` is a schemaless stored record: a unique UUID plus an ordered
//! map of named `FieldValue`s. Nested objects are addressed with dotted paths
//! (`location.city`) and the id with `_id`.

use crate::config;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Ordered field map of a document or nested object.
pub type Fields = BTreeMap<String, FieldValue>;

/// A typed value stored in a document field.
///
/// Uses the default externally-tagged serde representation for bincode
/// compatibility. The HTTP layer converts to/from untagged JSON with
/// [`FieldValue::from_json`] and [`FieldValue::to_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Explicit absence of a value.
    Null,
    /// Boolean value (`true` / `false`).
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// UTC timestamp, rendered as RFC 3339 in JSON.
    DateTime(DateTime<Utc>),
    /// Ordered list of values.
    Array(Vec<FieldValue>),
    /// Nested object.
    Object(Fields),
}

impl FieldValue {
    /// Convert an untagged JSON value into a field value.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => FieldValue::String(s),
            serde_json::Value::Array(items) => {
                FieldValue::Array(items.into_iter().map(FieldValue::from_json).collect())
            }
            serde_json::Value::Object(map) => FieldValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into untagged JSON for API responses.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Boolean(b) => serde_json::Value::Bool(*b),
            FieldValue::Integer(i) => serde_json::json!(*i),
            FieldValue::Float(f) => serde_json::json!(*f),
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::DateTime(dt) => {
                serde_json::Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            FieldValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(FieldValue::to_json).collect())
            }
            FieldValue::Object(fields) => fields_to_json(fields),
        }
    }

    /// Numeric view of integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String view of string values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Integer(_) | FieldValue::Float(_) => 1,
            FieldValue::String(_) => 2,
            FieldValue::Object(_) => 3,
            FieldValue::Array(_) => 4,
            FieldValue::Boolean(_) => 5,
            FieldValue::DateTime(_) => 6,
        }
    }

    /// Total order used for sorting: values of different types order by type
    /// (null < numbers < strings < objects < arrays < booleans < dates).
    pub fn sort_cmp(&self, other: &FieldValue) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a.cmp(b),
            (FieldValue::String(a), FieldValue::String(b)) => a.cmp(b),
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a.cmp(b),
            (FieldValue::Array(a), FieldValue::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.sort_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (FieldValue::Object(a), FieldValue::Object(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.sort_cmp(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => Ordering::Equal,
            },
        }
    }
}

/// Render a field map as a JSON object.
pub fn fields_to_json(fields: &Fields) -> serde_json::Value {
    serde_json::Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Look up a dotted path inside a field map.
pub fn get_path<'a>(fields: &'a Fields, path: &str) -> Option<&'a FieldValue> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        match current {
            FieldValue::Object(inner) => current = inner.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Set a dotted path inside a field map, creating intermediate objects.
pub fn set_path(fields: &mut Fields, path: &str, value: FieldValue) {
    match path.split_once('.') {
        None => {
            fields.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = fields
                .entry(head.to_string())
                .or_insert_with(|| FieldValue::Object(Fields::new()));
            if !matches!(entry, FieldValue::Object(_)) {
                *entry = FieldValue::Object(Fields::new());
            }
            if let FieldValue::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Remove a dotted path from a field map. Returns the removed value.
pub fn remove_path(fields: &mut Fields, path: &str) -> Option<FieldValue> {
    match path.split_once('.') {
        None => fields.remove(path),
        Some((head, rest)) => match fields.get_mut(head) {
            Some(FieldValue::Object(inner)) => remove_path(inner, rest),
            _ => None,
        },
    }
}

/// A stored document with a unique ID and its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (UUID v4).
    pub id: Uuid,
    /// Field values, including `createdAt`.
    pub fields: Fields,
}

impl Document {
    /// Creates a new document with a random UUID, stamping `createdAt` if absent.
    pub fn new(fields: Fields) -> Self {
        Self::with_id(Uuid::new_v4(), fields)
    }

    /// Creates a document with a specific UUID, stamping `createdAt` if absent.
    pub fn with_id(id: Uuid, mut fields: Fields) -> Self {
        fields
            .entry(config::CREATED_AT_FIELD.to_string())
            .or_insert_with(|| FieldValue::DateTime(Utc::now()));
        Self { id, fields }
    }

    /// Look up a dotted field path. `_id` resolves to the document id as a string.
    pub fn get(&self, path: &str) -> Option<Cow<'_, FieldValue>> {
        if path == config::ID_FIELD {
            return Some(Cow::Owned(FieldValue::String(self.id.to_string())));
        }
        get_path(&self.fields, path).map(Cow::Borrowed)
    }

    /// Render as a JSON object with the id under `_id`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(
            config::ID_FIELD.to_string(),
            serde_json::Value::String(self.id.to_string()),
        );
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.to_json());
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        let fields = match FieldValue::from_json(json!({
            "name": "Devworks Bootcamp",
            "averageCost": 10000,
            "location": { "city": "Boston", "coordinates": [-71.1, 42.3] }
        })) {
            FieldValue::Object(f) => f,
            _ => unreachable!(),
        };
        Document::new(fields)
    }

    #[test]
    fn test_new_stamps_created_at() {
        let doc = sample();
        assert!(matches!(
            doc.fields.get("createdAt"),
            Some(FieldValue::DateTime(_))
        ));
    }

    #[test]
    fn test_with_id_keeps_existing_created_at() {
        let ts = Utc::now() - chrono::Duration::days(3);
        let mut fields = Fields::new();
        fields.insert("createdAt".into(), FieldValue::DateTime(ts));
        let doc = Document::with_id(Uuid::new_v4(), fields);
        assert_eq!(doc.fields["createdAt"], FieldValue::DateTime(ts));
    }

    #[test]
    fn test_get_nested_path() {
        let doc = sample();
        assert_eq!(
            doc.get("location.city").unwrap().as_str(),
            Some("Boston")
        );
        assert!(doc.get("location.zipcode").is_none());
        assert!(doc.get("name.first").is_none());
    }

    #[test]
    fn test_get_id_path() {
        let doc = sample();
        let id = doc.id.to_string();
        assert_eq!(doc.get("_id").unwrap().as_str(), Some(id.as_str()));
    }

    #[test]
    fn test_json_conversion_keeps_numbers_apart() {
        assert_eq!(FieldValue::from_json(json!(3)), FieldValue::Integer(3));
        assert_eq!(FieldValue::from_json(json!(3.5)), FieldValue::Float(3.5));
        assert_eq!(FieldValue::Integer(3).to_json(), json!(3));
    }

    #[test]
    fn test_to_json_has_id_and_fields() {
        let doc = sample();
        let out = doc.to_json();
        assert_eq!(out["_id"], json!(doc.id.to_string()));
        assert_eq!(out["name"], json!("Devworks Bootcamp"));
        assert_eq!(out["location"]["coordinates"], json!([-71.1, 42.3]));
        assert!(out["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_set_and_remove_path() {
        let mut fields = Fields::new();
        set_path(&mut fields, "location.city", FieldValue::String("Boston".into()));
        assert_eq!(
            get_path(&fields, "location.city"),
            Some(&FieldValue::String("Boston".into()))
        );
        assert!(remove_path(&mut fields, "location.city").is_some());
        assert!(get_path(&fields, "location.city").is_none());
        assert!(remove_path(&mut fields, "missing.path").is_none());
    }

    #[test]
    fn test_sort_cmp_orders_types() {
        assert_eq!(
            FieldValue::Null.sort_cmp(&FieldValue::Integer(0)),
            Ordering::Less
        );
        assert_eq!(
            FieldValue::Integer(10).sort_cmp(&FieldValue::String("a".into())),
            Ordering::Less
        );
        assert_eq!(
            FieldValue::Integer(2).sort_cmp(&FieldValue::Float(1.5)),
            Ordering::Greater
        );
        assert_eq!(
            FieldValue::String("abc".into()).sort_cmp(&FieldValue::String("abd".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_bincode_roundtrip() {
        let doc = sample();
        let bytes = bincode::serialize(&doc).unwrap();
        let back: Document = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, doc);
    }
}
