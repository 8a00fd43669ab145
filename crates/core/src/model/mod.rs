//! Domain records: bootcamps, courses and users.
//!
//! Each submodule validates client input and turns it into document
//! [`Fields`](crate::document::Fields). Nothing here touches the network;
//! geocoding and password hashing happen in the server and are handed in.

/// Bootcamp validation, slugs and field building.
pub mod bootcamp;
/// Course validation and the bootcamp average-cost aggregate.
pub mod course;
/// Geocoder results and the stored `location` object.
pub mod location;
/// User registration input and public rendering.
pub mod user;

use crate::storage::{Database, StoreError};
use thiserror::Error;

/// Collection holding bootcamps.
pub const BOOTCAMPS: &str = "bootcamps";
/// Collection holding courses.
pub const COURSES: &str = "courses";
/// Collection holding users.
pub const USERS: &str = "users";

/// Input rejected by a domain model. Carries every failed rule.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Create the domain collections with their unique constraints if missing.
pub fn ensure_collections(db: &Database) -> Result<(), StoreError> {
    db.ensure_collection(BOOTCAMPS, &["name"])?;
    db.ensure_collection(COURSES, &[])?;
    db.ensure_collection(USERS, &["email"])?;
    Ok(())
}

/// Accumulates validation failures.
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<String>);

impl Violations {
    pub(crate) fn check(&mut self, ok: bool, message: &str) {
        if !ok {
            self.0.push(message.to_string());
        }
    }

    pub(crate) fn into_result(self) -> Result<(), ModelError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ModelError::Validation(self.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_joins_rules() {
        let mut v = Violations::default();
        v.check(false, "Please add a name");
        v.check(true, "never shown");
        v.check(false, "Please add a description");
        let err = v.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Please add a name, Please add a description");
    }

    #[test]
    fn test_ensure_collections() {
        let db = Database::new();
        ensure_collections(&db).unwrap();
        let mut names = db.list_collections();
        names.sort();
        assert_eq!(names, vec!["bootcamps", "courses", "users"]);
    }
}
