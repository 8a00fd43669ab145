//! Bulk import and removal of bootcamp and course fixtures.
//!
//! Fixture files use the API's JSON shape plus an `_id` per record. Ids that
//! are not UUIDs are replaced, and course `bootcamp` references follow the
//! replacement. Every record passes through the same validation as the API.

use crate::geocoder::{first_match, GeocodeError, Geocoder};
use devcamper_core::document::Document;
use devcamper_core::filter_types::FilterClause;
use devcamper_core::model::bootcamp::{self, BootcampInput};
use devcamper_core::model::course::{self, CourseInput};
use devcamper_core::model::{ModelError, BOOTCAMPS, COURSES};
use devcamper_core::storage::{Database, StoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("{collection} record {index}: {message}")]
    Record {
        collection: &'static str,
        index: usize,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}

/// What an import wrote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub bootcamps: usize,
    pub courses: usize,
    /// Bootcamps whose address found no geocoder match.
    pub ungeocoded: usize,
}

/// Read a JSON array of records. A missing file is an empty list.
pub fn read_records(path: &Path) -> Result<Vec<Value>, SeedError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Fixture file missing, skipping");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(SeedError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };
    serde_json::from_str(&raw).map_err(|source| SeedError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn record_error(collection: &'static str, index: usize, message: impl ToString) -> SeedError {
    SeedError::Record {
        collection,
        index,
        message: message.to_string(),
    }
}

fn validation_error(collection: &'static str, index: usize, err: ModelError) -> SeedError {
    record_error(collection, index, err)
}

/// Stored id for a fixture `_id`: kept when it is a UUID, fresh otherwise.
fn resolve_id(raw: Option<&Value>, remap: &mut HashMap<String, Uuid>) -> Uuid {
    let Some(raw) = raw.and_then(Value::as_str) else {
        return Uuid::new_v4();
    };
    *remap
        .entry(raw.to_string())
        .or_insert_with(|| Uuid::parse_str(raw).unwrap_or_else(|_| Uuid::new_v4()))
}

/// Insert bootcamps, then courses, then recompute average costs.
pub async fn import_data(
    db: &Database,
    geocoder: &dyn Geocoder,
    bootcamps: Vec<Value>,
    courses: Vec<Value>,
) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();
    let mut remap: HashMap<String, Uuid> = HashMap::new();
    let bootcamp_col = db.collection(BOOTCAMPS)?;
    let course_col = db.collection(COURSES)?;

    for (index, record) in bootcamps.into_iter().enumerate() {
        let id = resolve_id(record.get("_id"), &mut remap);
        let input: BootcampInput = serde_json::from_value(record)
            .map_err(|e| record_error(BOOTCAMPS, index, e))?;
        bootcamp::validate_create(&input).map_err(|e| validation_error(BOOTCAMPS, index, e))?;
        let location = match input.address.as_deref() {
            Some(address) => first_match(geocoder, address).await?,
            None => None,
        };
        if location.is_none() {
            report.ungeocoded += 1;
        }
        let fields = bootcamp::create_fields(input, location.as_ref())
            .map_err(|e| validation_error(BOOTCAMPS, index, e))?;
        bootcamp_col.insert(Document::with_id(id, fields))?;
        report.bootcamps += 1;
    }

    let mut touched = Vec::new();
    for (index, record) in courses.into_iter().enumerate() {
        let id = resolve_id(record.get("_id"), &mut remap);
        let owner = record
            .get("bootcamp")
            .and_then(Value::as_str)
            .and_then(|raw| remap.get(raw).copied().or_else(|| Uuid::parse_str(raw).ok()))
            .filter(|owner| bootcamp_col.get(owner).is_some())
            .ok_or_else(|| record_error(COURSES, index, "bootcamp reference does not resolve"))?;
        let input: CourseInput =
            serde_json::from_value(record).map_err(|e| record_error(COURSES, index, e))?;
        let fields =
            course::create_fields(input, owner).map_err(|e| validation_error(COURSES, index, e))?;
        course_col.insert(Document::with_id(id, fields))?;
        if !touched.contains(&owner) {
            touched.push(owner);
        }
        report.courses += 1;
    }
    for owner in &touched {
        course::update_average_cost(db, owner)?;
    }

    tracing::info!(
        bootcamps = report.bootcamps,
        courses = report.courses,
        ungeocoded = report.ungeocoded,
        "Data imported"
    );
    Ok(report)
}

/// Remove every bootcamp and course. Returns `(bootcamps, courses)` removed.
pub fn destroy_data(db: &Database) -> Result<(usize, usize), SeedError> {
    let courses = db.collection(COURSES)?.delete_many(&FilterClause::all())?;
    let bootcamps = db.collection(BOOTCAMPS)?.delete_many(&FilterClause::all())?;
    tracing::info!(bootcamps, courses, "Data destroyed");
    Ok((bootcamps, courses))
}
