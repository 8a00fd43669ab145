//! # devcamper-core
//!
//! Document store, query translator and domain models behind the DevCamper
//! bootcamp directory API.
//!
//! This is the core library crate with zero async dependencies. The HTTP
//! server, auth and geocoding live in `devcamper-server`.

/// Global configuration constants: limits, defaults, and validation bounds.
pub mod config;
/// Core document types: `Document` struct and `FieldValue` enum.
pub mod document;
/// Filter, sort and projection types shared by the translator and storage.
pub mod filter_types;
/// Domain models: bootcamps, courses and users.
pub mod model;
/// Query translator: parameter parsing, predicate evaluation, pagination.
pub mod query;
/// Storage layer: collections, database, write-ahead log, and disk persistence.
pub mod storage;
