//! Prometheus metrics recording and background collection.

use devcamper_core::storage::Database;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Records HTTP request metrics.
pub fn record_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Records a write operation metric.
pub fn record_write_operation(collection: &str, operation: &str) {
    counter!(
        "devcamper_operations_total",
        "collection" => collection.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Records a read query metric (`list`, `radius`, `get`).
pub fn record_query(collection: &str, kind: &str) {
    counter!(
        "devcamper_queries_total",
        "collection" => collection.to_string(),
        "type" => kind.to_string()
    )
    .increment(1);
}

/// Updates collection-level Prometheus gauges.
pub fn update_collection_metrics(db: &Database) {
    let collections = db.collections.read();
    gauge!("devcamper_collections_total").set(collections.len() as f64);
    for (name, collection) in collections.iter() {
        let labels = [("collection", name.clone())];
        gauge!("devcamper_documents_total", &labels).set(collection.document_count() as f64);
    }
}

/// Updates the `devcamper_wal_size_bytes` gauge.
pub fn update_wal_metrics(db: &Database) {
    if let Some(wal) = db.wal() {
        gauge!("devcamper_wal_size_bytes").set(wal.size_bytes() as f64);
    }
}
