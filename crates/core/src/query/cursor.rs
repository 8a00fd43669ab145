//! Store interface used by the query translator and a chainable cursor over it.

use crate::document::Document;
use crate::filter_types::{FilterClause, Projection, SortKey};
use crate::storage::StoreError;

/// Joins resolved after the page of documents is selected.
#[derive(Debug, Clone, PartialEq)]
pub enum Populate {
    /// Replace the id stored at `field` with the referenced document from
    /// `collection`, projected through `select`.
    Reference {
        field: String,
        collection: String,
        select: Projection,
    },
    /// Attach, under `as_field`, every document of `collection` whose
    /// `foreign_field` holds this document's id.
    Reverse {
        as_field: String,
        collection: String,
        foreign_field: String,
    },
}

/// Everything one `find` round trip needs.
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub filter: FilterClause,
    pub projection: Projection,
    pub sort: Vec<SortKey>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub populate: Vec<Populate>,
}

/// Document store seen by the query translator.
pub trait DocumentStore {
    /// Number of documents in `collection` matching `filter`.
    fn count(&self, collection: &str, filter: &FilterClause) -> Result<usize, StoreError>;

    /// Materialize the documents selected by `query`.
    fn fetch(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    /// Start a cursor over `collection`.
    fn find(&self, collection: &str, filter: FilterClause) -> Cursor<'_, Self>
    where
        Self: Sized,
    {
        Cursor::new(self, collection, filter)
    }
}

/// Lazily built query; nothing touches the store until [`Cursor::exec`].
pub struct Cursor<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    collection: String,
    query: FindQuery,
}

impl<'a, S: DocumentStore + ?Sized> Cursor<'a, S> {
    pub fn new(store: &'a S, collection: &str, filter: FilterClause) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            query: FindQuery {
                filter,
                ..FindQuery::default()
            },
        }
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.query.projection = projection;
        self
    }

    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.query.sort = keys;
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.query.skip = n;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.query.limit = Some(n);
        self
    }

    pub fn populate(mut self, populate: Populate) -> Self {
        self.query.populate.push(populate);
        self
    }

    pub fn exec(self) -> Result<Vec<Document>, StoreError> {
        self.store.fetch(&self.collection, &self.query)
    }
}
