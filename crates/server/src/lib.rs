//! devcamper-server: HTTP server for the DevCamper bootcamp directory.
//!
//! Provides the REST API, JWT authentication and address geocoding.
//! Storage, query translation and domain validation live in `devcamper-core`.

/// REST API layer: Axum router, HTTP handlers, models, auth, metrics.
pub mod api;
/// Address geocoding providers.
pub mod geocoder;
/// Fixture import and removal used by `devcamper-seed`.
pub mod seed;
