//! Predicate evaluation against stored documents.
//!
//! Operands arrive as raw client strings and are cast to the type of the
//! stored value: numbers compare numerically, strings lexically, dates by
//! instant. When the stored value is an array, a condition matches if any
//! element matches.

use crate::document::{Document, FieldValue};
use crate::filter_types::{FilterClause, FilterCondition, FilterOperator};
use crate::query::geo;
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;

/// Check if a document matches the given filter clause.
/// `must` conditions are AND-ed together with the optional `within` cap.
pub fn matches_filter(doc: &Document, filter: &FilterClause) -> bool {
    for cond in &filter.must {
        if !evaluate_condition(doc, cond) {
            return false;
        }
    }
    if let Some(ref cap) = filter.within {
        return geo::contains(cap, doc);
    }
    true
}

fn evaluate_condition(doc: &Document, cond: &FilterCondition) -> bool {
    let field_value = match doc.get(&cond.field) {
        Some(v) => v,
        None => return false,
    };
    matches_value(&field_value, cond)
}

fn matches_value(value: &FieldValue, cond: &FilterCondition) -> bool {
    if let FieldValue::Array(items) = value {
        return items.iter().any(|item| matches_value(item, cond));
    }
    let operand = match cond.values.first() {
        Some(v) => v,
        None => return false,
    };
    match cond.op {
        FilterOperator::Eq => value_eq(value, operand),
        FilterOperator::Gt => value_cmp(value, operand).is_some_and(|o| o == Ordering::Greater),
        FilterOperator::Gte => value_cmp(value, operand).is_some_and(|o| o != Ordering::Less),
        FilterOperator::Lt => value_cmp(value, operand).is_some_and(|o| o == Ordering::Less),
        FilterOperator::Lte => value_cmp(value, operand).is_some_and(|o| o != Ordering::Greater),
        FilterOperator::In => cond.values.iter().any(|v| value_eq(value, v)),
    }
}

/// Compare a stored value with a raw operand for equality.
fn value_eq(value: &FieldValue, raw: &str) -> bool {
    match value {
        FieldValue::String(s) => s == raw,
        FieldValue::Integer(i) => match raw.trim().parse::<i64>() {
            Ok(n) => *i == n,
            Err(_) => parse_number(raw).is_some_and(|n| *i as f64 == n),
        },
        FieldValue::Float(f) => parse_number(raw).is_some_and(|n| *f == n),
        FieldValue::Boolean(b) => raw.parse::<bool>().is_ok_and(|rb| *b == rb),
        FieldValue::DateTime(dt) => parse_datetime(raw).is_some_and(|rd| *dt == rd),
        FieldValue::Null => raw == "null",
        FieldValue::Array(_) | FieldValue::Object(_) => false,
    }
}

/// Compare a stored value with a raw operand for ordering.
fn value_cmp(value: &FieldValue, raw: &str) -> Option<Ordering> {
    match value {
        FieldValue::String(s) => Some(s.as_str().cmp(raw)),
        FieldValue::Integer(_) | FieldValue::Float(_) => {
            let stored = value.as_f64()?;
            stored.partial_cmp(&parse_number(raw)?)
        }
        FieldValue::DateTime(dt) => Some(dt.cmp(&parse_datetime(raw)?)),
        FieldValue::Boolean(b) => Some(b.cmp(&raw.parse::<bool>().ok()?)),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{set_path, Fields};
    use chrono::TimeZone;

    fn doc(pairs: Vec<(&str, FieldValue)>) -> Document {
        let mut fields = Fields::new();
        for (k, v) in pairs {
            set_path(&mut fields, k, v);
        }
        Document::new(fields)
    }

    fn clause(conds: Vec<FilterCondition>) -> FilterClause {
        FilterClause {
            must: conds,
            within: None,
        }
    }

    #[test]
    fn test_eq_string() {
        let d = doc(vec![("location.state", FieldValue::String("MA".into()))]);
        assert!(matches_filter(
            &d,
            &clause(vec![FilterCondition::new(
                "location.state",
                FilterOperator::Eq,
                "MA"
            )])
        ));
        assert!(!matches_filter(
            &d,
            &clause(vec![FilterCondition::new(
                "location.state",
                FilterOperator::Eq,
                "CA"
            )])
        ));
    }

    #[test]
    fn test_numeric_operand_cast() {
        let d = doc(vec![("averageCost", FieldValue::Integer(10000))]);
        let check = |op, raw: &str| {
            matches_filter(&d, &clause(vec![FilterCondition::new("averageCost", op, raw)]))
        };
        assert!(check(FilterOperator::Eq, "10000"));
        assert!(check(FilterOperator::Eq, "10000.0"));
        assert!(check(FilterOperator::Lte, "10000"));
        assert!(check(FilterOperator::Gt, "9999.5"));
        assert!(!check(FilterOperator::Lt, "10000"));
        assert!(!check(FilterOperator::Gte, "abc"));
    }

    #[test]
    fn test_string_stored_zipcode_compares_as_text() {
        let d = doc(vec![("location.zipcode", FieldValue::String("02118".into()))]);
        assert!(matches_filter(
            &d,
            &clause(vec![FilterCondition::new(
                "location.zipcode",
                FilterOperator::Eq,
                "02118"
            )])
        ));
        assert!(!matches_filter(
            &d,
            &clause(vec![FilterCondition::new(
                "location.zipcode",
                FilterOperator::Eq,
                "2118"
            )])
        ));
    }

    #[test]
    fn test_in_against_array_field() {
        let d = doc(vec![(
            "careers",
            FieldValue::Array(vec![
                FieldValue::String("Web Development".into()),
                FieldValue::String("Business".into()),
            ]),
        )]);
        let hit = clause(vec![FilterCondition::any_of(
            "careers",
            vec!["Business".into(), "Other".into()],
        )]);
        let miss = clause(vec![FilterCondition::any_of(
            "careers",
            vec!["UI/UX".into()],
        )]);
        assert!(matches_filter(&d, &hit));
        assert!(!matches_filter(&d, &miss));
    }

    #[test]
    fn test_eq_against_array_element() {
        let d = doc(vec![(
            "careers",
            FieldValue::Array(vec![FieldValue::String("UI/UX".into())]),
        )]);
        assert!(matches_filter(
            &d,
            &clause(vec![FilterCondition::new("careers", FilterOperator::Eq, "UI/UX")])
        ));
    }

    #[test]
    fn test_boolean_and_missing_field() {
        let d = doc(vec![("housing", FieldValue::Boolean(true))]);
        assert!(matches_filter(
            &d,
            &clause(vec![FilterCondition::new("housing", FilterOperator::Eq, "true")])
        ));
        assert!(!matches_filter(
            &d,
            &clause(vec![FilterCondition::new("jobGuarantee", FilterOperator::Eq, "true")])
        ));
    }

    #[test]
    fn test_date_range() {
        let mut fields = Fields::new();
        fields.insert(
            "createdAt".into(),
            FieldValue::DateTime(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()),
        );
        let d = Document::new(fields);
        assert!(matches_filter(
            &d,
            &clause(vec![FilterCondition::new(
                "createdAt",
                FilterOperator::Gte,
                "2024-03-01"
            )])
        ));
        assert!(!matches_filter(
            &d,
            &clause(vec![FilterCondition::new(
                "createdAt",
                FilterOperator::Lt,
                "2024-03-10T11:59:59Z"
            )])
        ));
    }

    #[test]
    fn test_id_filter() {
        let d = doc(vec![]);
        let id = d.id.to_string();
        assert!(matches_filter(
            &d,
            &clause(vec![FilterCondition::new("_id", FilterOperator::Eq, id)])
        ));
    }

    #[test]
    fn test_empty_clause_matches() {
        assert!(matches_filter(&doc(vec![]), &FilterClause::all()));
    }
}
