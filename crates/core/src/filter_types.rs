//! Query types shared by the query translator and the storage layer.
//!
//! A [`FilterClause`] is the normalized predicate built from client query
//! parameters: an AND of [`FilterCondition`]s plus an optional geospatial
//! [`GeoWithin`] cap. Operands are kept as the raw client strings and are
//! cast to the stored field's type when evaluated.

use crate::document::{get_path, remove_path, set_path, Document, Fields};
use serde::Serialize;

/// Predicate with `must` (AND) conditions and an optional spherical cap.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterClause {
    pub must: Vec<FilterCondition>,
    pub within: Option<GeoWithin>,
}

impl FilterClause {
    /// Predicate that matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Single equality condition, the usual way handlers look documents up
    /// by a reference field.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            must: vec![FilterCondition::new(field, FilterOperator::Eq, value)],
            within: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.within.is_none()
    }

    /// Render as a store-style JSON document, e.g. `{"price": {"gt": 50}}`.
    ///
    /// Conditions on the same field are merged into one object. Operands are
    /// rendered as numbers or booleans when they parse as such.
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for cond in &self.must {
            let rendered = match cond.op {
                FilterOperator::In => {
                    serde_json::Value::Array(cond.values.iter().map(|v| infer_scalar(v)).collect())
                }
                _ => cond
                    .values
                    .first()
                    .map(|v| infer_scalar(v))
                    .unwrap_or(serde_json::Value::Null),
            };
            let entry = out
                .entry(cond.field.clone())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if let serde_json::Value::Object(ops) = entry {
                ops.insert(cond.op.as_str().to_string(), rendered);
            }
        }
        if let Some(geo) = &self.within {
            out.insert(
                geo.field.clone(),
                serde_json::json!({
                    "within": {
                        "center": [geo.lng, geo.lat],
                        "radius": geo.radius,
                    }
                }),
            );
        }
        serde_json::Value::Object(out)
    }
}

fn infer_scalar(raw: &str) -> serde_json::Value {
    if let Ok(i) = raw.parse::<i64>() {
        return serde_json::json!(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return serde_json::json!(f);
        }
    }
    match raw {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(raw.to_string()),
    }
}

/// A single condition on a document field.
///
/// `values` holds exactly one operand for `eq`/`gt`/`gte`/`lt`/`lte` and the
/// candidate list for `in`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCondition {
    pub field: String,
    pub op: FilterOperator,
    pub values: Vec<String>,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, op: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            values: vec![value.into()],
        }
    }

    pub fn any_of(field: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOperator::In,
            values,
        }
    }
}

/// Comparison operator for filter conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOperator {
    /// Parse a bracketed operator token. Only the fixed vocabulary is accepted.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(Self::Eq),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
        }
    }
}

/// Spherical cap: documents whose `[lng, lat]` at `field` lie within
/// `radius` radians (central angle) of the centre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoWithin {
    pub field: String,
    pub lng: f64,
    pub lat: f64,
    pub radius: f64,
}

/// Sort direction for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One key of a multi-key sort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Field projection applied to returned documents. The id is always kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Include(fields.into_iter().map(Into::into).collect())
    }

    /// Apply the projection to a document, returning the projected copy.
    pub fn apply(&self, doc: &Document) -> Document {
        match self {
            Projection::All => doc.clone(),
            Projection::Include(paths) => {
                let mut fields = Fields::new();
                for path in paths {
                    if let Some(value) = get_path(&doc.fields, path) {
                        set_path(&mut fields, path, value.clone());
                    }
                }
                Document {
                    id: doc.id,
                    fields,
                }
            }
            Projection::Exclude(paths) => {
                let mut out = doc.clone();
                for path in paths {
                    remove_path(&mut out.fields, path);
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldValue;
    use serde_json::json;

    #[test]
    fn test_to_json_infers_scalars() {
        let clause = FilterClause {
            must: vec![
                FilterCondition::new("price", FilterOperator::Gt, "50"),
                FilterCondition::new("housing", FilterOperator::Eq, "true"),
                FilterCondition::new("location.state", FilterOperator::Eq, "MA"),
            ],
            within: None,
        };
        assert_eq!(
            clause.to_json(),
            json!({
                "price": {"gt": 50},
                "housing": {"eq": true},
                "location.state": {"eq": "MA"}
            })
        );
    }

    #[test]
    fn test_to_json_merges_same_field() {
        let clause = FilterClause {
            must: vec![
                FilterCondition::new("averageCost", FilterOperator::Gte, "5000"),
                FilterCondition::new("averageCost", FilterOperator::Lt, "12000.5"),
                FilterCondition::any_of("careers", vec!["Business".into(), "UI/UX".into()]),
            ],
            within: None,
        };
        assert_eq!(
            clause.to_json(),
            json!({
                "averageCost": {"gte": 5000, "lt": 12000.5},
                "careers": {"in": ["Business", "UI/UX"]}
            })
        );
    }

    #[test]
    fn test_operator_vocabulary() {
        for op in ["eq", "gt", "gte", "lt", "lte", "in"] {
            assert_eq!(FilterOperator::parse(op).unwrap().as_str(), op);
        }
        assert!(FilterOperator::parse("ne").is_none());
        assert!(FilterOperator::parse("$gt").is_none());
        assert!(FilterOperator::parse("GT").is_none());
    }

    #[test]
    fn test_projection_include_keeps_id() {
        let mut fields = Fields::new();
        fields.insert("name".into(), FieldValue::String("ModernTech".into()));
        fields.insert("description".into(), FieldValue::String("x".into()));
        let doc = Document::new(fields);

        let projected = Projection::include(["name"]).apply(&doc);
        assert_eq!(projected.id, doc.id);
        assert_eq!(projected.fields.len(), 1);
        assert!(projected.fields.contains_key("name"));
    }

    #[test]
    fn test_projection_exclude_nested() {
        let mut fields = Fields::new();
        set_path(&mut fields, "location.city", FieldValue::String("Boston".into()));
        set_path(&mut fields, "location.state", FieldValue::String("MA".into()));
        let doc = Document::new(fields);

        let projected = Projection::Exclude(vec!["location.city".into()]).apply(&doc);
        assert!(get_path(&projected.fields, "location.city").is_none());
        assert!(get_path(&projected.fields, "location.state").is_some());
        assert!(projected.fields.contains_key("createdAt"));
    }
}
