//! Parsing of client query parameters into a [`QuerySpec`].
//!
//! Keys are partitioned into the reserved control keys (`select`, `sort`,
//! `page`, `limit`) and filter keys. A filter key is `field` or
//! `field[op]`; the operator is only ever recognized inside the brackets
//! and must come from the fixed vocabulary, so nothing the client sends is
//! spliced into the store query as an operator. Parsing never fails: keys
//! that don't fit are dropped and logged at debug.

use crate::config::{
    CONTROL_KEYS, DEFAULT_LIMIT, DEFAULT_PAGE, DEFAULT_SORT, MAX_FIELD_PATH_LEN,
    MAX_FILTER_CONDITIONS, MAX_LIMIT,
};
use crate::filter_types::{
    FilterClause, FilterCondition, FilterOperator, Projection, SortDirection, SortKey,
};
use std::collections::HashMap;

/// Normalized, bounded query built from one request's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub filter: FilterClause,
    pub projection: Projection,
    pub sort: Vec<SortKey>,
    /// 1-based page number.
    pub page: usize,
    /// Page size, `1..=MAX_LIMIT`.
    pub limit: usize,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filter: FilterClause::default(),
            projection: Projection::All,
            sort: default_sort(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QuerySpec {
    /// Build a spec from raw `(key, value)` pairs in request order.
    /// Repeated keys are allowed.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut spec = QuerySpec::default();
        let mut select = None;
        let mut sort = None;
        let mut page = None;
        let mut limit = None;

        let mut conditions: Vec<FilterCondition> = Vec::new();
        let mut in_slots: HashMap<String, usize> = HashMap::new();

        for (key, value) in pairs {
            match key.as_str() {
                "select" => select = Some(value.as_str()),
                "sort" => sort = Some(value.as_str()),
                "page" => page = Some(value.as_str()),
                "limit" => limit = Some(value.as_str()),
                _ => {
                    let Some((field, op)) = parse_filter_key(key) else {
                        tracing::debug!(key = %key, "ignoring unrecognized filter key");
                        continue;
                    };
                    if op == FilterOperator::In {
                        let values = split_list(value);
                        if let Some(&slot) = in_slots.get(&field) {
                            conditions[slot].values.extend(values);
                            continue;
                        }
                        if conditions.len() >= MAX_FILTER_CONDITIONS {
                            tracing::debug!(key = %key, "filter condition limit reached");
                            continue;
                        }
                        in_slots.insert(field.clone(), conditions.len());
                        conditions.push(FilterCondition::any_of(field, values));
                    } else {
                        if conditions.len() >= MAX_FILTER_CONDITIONS {
                            tracing::debug!(key = %key, "filter condition limit reached");
                            continue;
                        }
                        conditions.push(FilterCondition::new(field, op, value.clone()));
                    }
                }
            }
        }

        conditions.retain(|c| !c.values.is_empty());
        spec.filter.must = conditions;
        if let Some(raw) = select {
            spec.projection = parse_select(raw);
        }
        if let Some(raw) = sort {
            let keys = parse_sort(raw);
            if !keys.is_empty() {
                spec.sort = keys;
            }
        }
        spec.page = page.and_then(parse_positive).unwrap_or(DEFAULT_PAGE);
        spec.limit = limit
            .and_then(parse_positive)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        spec
    }

    /// Re-encode as query pairs. Parsing the output with
    /// [`QuerySpec::from_pairs`] yields an equal spec. The geospatial cap is
    /// set by handlers, not by clients, and is not encoded.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for cond in &self.filter.must {
            let key = match cond.op {
                FilterOperator::Eq => cond.field.clone(),
                op => format!("{}[{}]", cond.field, op.as_str()),
            };
            let value = match cond.op {
                FilterOperator::In => cond.values.join(","),
                _ => cond.values.first().cloned().unwrap_or_default(),
            };
            pairs.push((key, value));
        }
        match &self.projection {
            Projection::All => {}
            Projection::Include(fields) => pairs.push(("select".into(), fields.join(","))),
            Projection::Exclude(fields) => pairs.push((
                "select".into(),
                fields
                    .iter()
                    .map(|f| format!("-{f}"))
                    .collect::<Vec<_>>()
                    .join(","),
            )),
        }
        let sort = self
            .sort
            .iter()
            .map(|k| match k.direction {
                SortDirection::Asc => k.field.clone(),
                SortDirection::Desc => format!("-{}", k.field),
            })
            .collect::<Vec<_>>()
            .join(",");
        pairs.push(("sort".into(), sort));
        pairs.push(("page".into(), self.page.to_string()));
        pairs.push(("limit".into(), self.limit.to_string()));
        pairs
    }
}

fn default_sort() -> Vec<SortKey> {
    parse_sort(DEFAULT_SORT)
}

/// Parse `field` or `field[op]`.
fn parse_filter_key(key: &str) -> Option<(String, FilterOperator)> {
    let (field, op) = match key.find('[') {
        None => (key, FilterOperator::Eq),
        Some(open) => {
            let inner = key[open + 1..].strip_suffix(']')?;
            (&key[..open], FilterOperator::parse(inner)?)
        }
    };
    if !is_valid_path(field) || CONTROL_KEYS.contains(&field) {
        return None;
    }
    Some((field.to_string(), op))
}

/// Dot-separated segments of `[A-Za-z0-9_]`, bounded in length.
pub fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && path.len() <= MAX_FIELD_PATH_LEN
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

fn parse_select(raw: &str) -> Projection {
    let mut include: Vec<String> = Vec::new();
    let mut exclude: Vec<String> = Vec::new();
    for token in raw.split(',').map(str::trim) {
        let (target, field) = match token.strip_prefix('-') {
            Some(rest) => (&mut exclude, rest),
            None => (&mut include, token),
        };
        if !is_valid_path(field) {
            if !token.is_empty() {
                tracing::debug!(field = %token, "ignoring invalid select field");
            }
            continue;
        }
        if !target.iter().any(|f| f == field) {
            target.push(field.to_string());
        }
    }
    if !include.is_empty() {
        Projection::Include(include)
    } else if !exclude.is_empty() {
        Projection::Exclude(exclude)
    } else {
        Projection::All
    }
}

fn parse_sort(raw: &str) -> Vec<SortKey> {
    let mut keys: Vec<SortKey> = Vec::new();
    for token in raw.split(',').map(str::trim) {
        let key = match token.strip_prefix('-') {
            Some(field) => SortKey::desc(field),
            None => SortKey::asc(token),
        };
        if !is_valid_path(&key.field) {
            if !token.is_empty() {
                tracing::debug!(field = %token, "ignoring invalid sort field");
            }
            continue;
        }
        if !keys.iter().any(|k| k.field == key.field) {
            keys.push(key);
        }
    }
    keys
}

/// Leading-integer parse (`"10abc"` is 10). Zero, negative or non-numeric
/// input yields `None`.
fn parse_positive(raw: &str) -> Option<usize> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut value: usize = 0;
    let mut seen = false;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        seen = true;
        value = value.saturating_mul(10).saturating_add(usize::from(b - b'0'));
    }
    if !seen || negative || value == 0 {
        return None;
    }
    Some(value)
}
