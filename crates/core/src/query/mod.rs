//! Query translator: client query parameters to bounded store queries.
//!
//! [`QuerySpec::from_pairs`] normalizes untrusted parameters; [`advanced_results`]
//! runs the two store round trips (count, then find) and assembles a
//! [`PageResult`] with next/previous descriptors. Store errors propagate
//! unchanged; nothing is retried.

/// Chainable cursor and the `DocumentStore` trait it runs against.
pub mod cursor;
/// Predicate evaluation against documents.
pub mod eval;
/// Spherical-cap radius search.
pub mod geo;
/// Page windows and pagination descriptors.
pub mod pagination;
/// Query parameter parsing and re-encoding.
pub mod params;

pub use cursor::{Cursor, DocumentStore, FindQuery, Populate};
pub use eval::matches_filter;
pub use pagination::{PageDescriptor, PageResult, PageWindow, Pagination};
pub use params::QuerySpec;

use crate::storage::StoreError;

/// Count matching documents, then fetch the requested page with projection,
/// sort and joins applied.
pub fn advanced_results<S: DocumentStore + ?Sized>(
    store: &S,
    collection: &str,
    spec: &QuerySpec,
    populate: &[Populate],
) -> Result<PageResult, StoreError> {
    let window = PageWindow::new(spec.page, spec.limit);
    let total = store.count(collection, &spec.filter)?;

    let mut cursor = Cursor::new(store, collection, spec.filter.clone())
        .select(spec.projection.clone())
        .sort(spec.sort.clone())
        .skip(window.start_index)
        .limit(spec.limit);
    for join in populate {
        cursor = cursor.populate(join.clone());
    }
    let data = cursor.exec()?;

    tracing::debug!(
        collection,
        filter = %spec.filter.to_json(),
        total,
        returned = data.len(),
        "advanced results"
    );

    Ok(PageResult {
        total,
        count: data.len(),
        pagination: Pagination::compute(spec.page, spec.limit, total),
        data,
    })
}
