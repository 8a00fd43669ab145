//! Collection and database data structures.
//!
//! A [`Collection`] holds schemaless documents by id and enforces
//! unique-field constraints. [`Database`] manages named collections with
//! thread-safe concurrent access, logs every mutation to an optional
//! write-ahead log, and serves the query translator through
//! [`DocumentStore`].

use crate::document::{Document, FieldValue, Fields};
use crate::filter_types::{FilterClause, Projection, SortDirection, SortKey};
use crate::query::cursor::{DocumentStore, FindQuery, Populate};
use crate::query::eval::matches_filter;
use crate::storage::error::StoreError;
use crate::storage::wal::{ReplayStats, SyncWriteAheadLog, WalEntry};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Internal data for a collection, protected by a `RwLock`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionData {
    pub name: String,
    /// Field paths whose non-null values must be unique across documents.
    pub unique_fields: Vec<String>,
    pub documents: HashMap<Uuid, Arc<Document>>,
}

impl CollectionData {
    pub fn new(name: String, unique_fields: Vec<String>) -> Self {
        Self {
            name,
            unique_fields,
            documents: HashMap::new(),
        }
    }

    /// Validate internal invariants after deserialization.
    pub fn validate(&self) -> Result<(), String> {
        for (id, doc) in &self.documents {
            if *id != doc.id {
                return Err(format!("document keyed {} has id {}", id, doc.id));
            }
        }
        for doc in self.documents.values() {
            if let Err(e) = self.check_unique(doc, Some(doc.id)) {
                return Err(e.to_string());
            }
        }
        Ok(())
    }

    /// Reject `doc` if a unique field collides with another document.
    fn check_unique(&self, doc: &Document, exclude: Option<Uuid>) -> Result<(), StoreError> {
        for field in &self.unique_fields {
            let value = match doc.get(field) {
                Some(v) if *v != FieldValue::Null => v,
                _ => continue,
            };
            let clash = self.documents.values().any(|other| {
                Some(other.id) != exclude && other.get(field).is_some_and(|o| *o == *value)
            });
            if clash {
                return Err(StoreError::Duplicate {
                    field: field.clone(),
                    value: value.to_json().to_string(),
                });
            }
        }
        Ok(())
    }

    fn matching<'a>(
        &'a self,
        filter: &'a FilterClause,
    ) -> impl Iterator<Item = &'a Arc<Document>> + 'a {
        self.documents
            .values()
            .filter(move |doc| matches_filter(doc, filter))
    }
}

/// Merge `changes` into `fields`; `Null` removes the field.
fn merge_fields(fields: &mut Fields, changes: Fields) {
    for (key, value) in changes {
        if value == FieldValue::Null {
            fields.remove(&key);
        } else {
            fields.insert(key, value);
        }
    }
}

/// Order documents by the sort keys, ties broken by id.
fn compare_documents(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let av = a.get(&key.field);
        let bv = b.get(&key.field);
        let ord = av
            .as_deref()
            .unwrap_or(&FieldValue::Null)
            .sort_cmp(bv.as_deref().unwrap_or(&FieldValue::Null));
        let ord = match key.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.id.cmp(&b.id)
}

/// A thread-safe collection of documents.
///
/// Cloning a `Collection` produces a new handle to the same shared data.
/// Mutations run under the write lock in the order: constraint check, WAL
/// append, apply.
#[derive(Debug, Clone)]
pub struct Collection {
    pub data: Arc<RwLock<CollectionData>>,
    wal: Option<Arc<SyncWriteAheadLog>>,
}

impl Collection {
    /// Creates a new empty collection.
    pub fn new(name: String, unique_fields: Vec<String>) -> Self {
        Self::from_data(CollectionData::new(name, unique_fields), None)
    }

    pub fn from_data(data: CollectionData, wal: Option<Arc<SyncWriteAheadLog>>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            wal,
        }
    }

    pub fn name(&self) -> String {
        self.data.read().name.clone()
    }

    fn log(&self, entry: WalEntry) -> Result<(), StoreError> {
        if let Some(wal) = &self.wal {
            wal.append(&entry)?;
        }
        Ok(())
    }

    /// Inserts a document. Fails with `Duplicate` on a unique-field clash.
    pub fn insert(&self, doc: Document) -> Result<Arc<Document>, StoreError> {
        let mut data = self.data.write();
        data.check_unique(&doc, None)?;
        self.log(WalEntry::Insert {
            collection: data.name.clone(),
            document: doc.clone(),
        })?;
        let doc = Arc::new(doc);
        data.documents.insert(doc.id, Arc::clone(&doc));
        Ok(doc)
    }

    /// Merges `changes` into a document and returns the updated version.
    pub fn update(&self, id: &Uuid, changes: Fields) -> Result<Arc<Document>, StoreError> {
        let mut data = self.data.write();
        let mut updated = match data.documents.get(id) {
            Some(doc) => Document::clone(doc),
            None => return Err(StoreError::NotFound(*id)),
        };
        merge_fields(&mut updated.fields, changes);
        data.check_unique(&updated, Some(*id))?;
        self.log(WalEntry::Update {
            collection: data.name.clone(),
            document: updated.clone(),
        })?;
        let updated = Arc::new(updated);
        data.documents.insert(*id, Arc::clone(&updated));
        Ok(updated)
    }

    /// Deletes a document by UUID and returns it.
    pub fn delete(&self, id: &Uuid) -> Result<Arc<Document>, StoreError> {
        let mut data = self.data.write();
        if !data.documents.contains_key(id) {
            return Err(StoreError::NotFound(*id));
        }
        self.log(WalEntry::Delete {
            collection: data.name.clone(),
            id: *id,
        })?;
        data.documents
            .remove(id)
            .ok_or(StoreError::NotFound(*id))
    }

    /// Deletes every document matching `filter`. Returns how many were removed.
    pub fn delete_many(&self, filter: &FilterClause) -> Result<usize, StoreError> {
        let mut data = self.data.write();
        let ids: Vec<Uuid> = data.matching(filter).map(|doc| doc.id).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.log(WalEntry::DeleteMany {
            collection: data.name.clone(),
            ids: ids.clone(),
        })?;
        for id in &ids {
            data.documents.remove(id);
        }
        Ok(ids.len())
    }

    /// Retrieves a document by UUID, or `None` if not found.
    pub fn get(&self, id: &Uuid) -> Option<Arc<Document>> {
        self.data.read().documents.get(id).cloned()
    }

    /// First document matching `filter` in id order.
    pub fn find_one(&self, filter: &FilterClause) -> Option<Arc<Document>> {
        self.data
            .read()
            .matching(filter)
            .min_by_key(|doc| doc.id)
            .cloned()
    }

    pub fn count(&self, filter: &FilterClause) -> usize {
        self.data.read().matching(filter).count()
    }

    /// Matching documents, sorted, then windowed by `skip` and `limit`.
    pub fn find(
        &self,
        filter: &FilterClause,
        sort: &[SortKey],
        skip: usize,
        limit: Option<usize>,
    ) -> Vec<Arc<Document>> {
        let data = self.data.read();
        let mut docs: Vec<Arc<Document>> = data.matching(filter).cloned().collect();
        drop(data);
        docs.sort_by(|a, b| compare_documents(a, b, sort));
        docs.into_iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Mean of the numeric values at `field` over matching documents.
    /// `None` when no matching document has a numeric value there.
    pub fn average(&self, filter: &FilterClause, field: &str) -> Option<f64> {
        let data = self.data.read();
        let (sum, n) = data
            .matching(filter)
            .filter_map(|doc| doc.get(field).and_then(|v| v.as_f64()))
            .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Returns the number of documents.
    pub fn document_count(&self) -> usize {
        self.data.read().documents.len()
    }

    /// Apply a replayed WAL entry without logging or constraint checks.
    fn apply(&self, entry: WalEntry) {
        let mut data = self.data.write();
        match entry {
            WalEntry::Insert { document, .. } | WalEntry::Update { document, .. } => {
                data.documents.insert(document.id, Arc::new(document));
            }
            WalEntry::Delete { id, .. } => {
                data.documents.remove(&id);
            }
            WalEntry::DeleteMany { ids, .. } => {
                for id in ids {
                    data.documents.remove(&id);
                }
            }
            WalEntry::CreateCollection { .. } => {}
        }
    }
}

/// Database holds all collections.
#[derive(Debug, Clone, Default)]
pub struct Database {
    pub collections: Arc<RwLock<HashMap<String, Collection>>>,
    wal: Option<Arc<SyncWriteAheadLog>>,
    derived: Arc<Mutex<()>>,
}

impl Database {
    /// Creates a new empty in-memory database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty database that logs every mutation to `wal`.
    pub fn with_wal(wal: Arc<SyncWriteAheadLog>) -> Self {
        Self {
            collections: Arc::default(),
            wal: Some(wal),
            derived: Arc::default(),
        }
    }

    pub fn wal(&self) -> Option<&Arc<SyncWriteAheadLog>> {
        self.wal.as_ref()
    }

    /// Serializes read-then-write recomputation of derived fields, so the
    /// last recompute always sees every write that finished before it.
    /// Never held across collection locks taken elsewhere.
    pub fn derived_lock(&self) -> MutexGuard<'_, ()> {
        self.derived.lock()
    }

    /// Returns the named collection, creating (and logging) it if missing.
    /// Unique fields of an existing collection are left unchanged.
    pub fn ensure_collection(
        &self,
        name: &str,
        unique_fields: &[&str],
    ) -> Result<Collection, StoreError> {
        let mut collections = self.collections.write();
        if let Some(existing) = collections.get(name) {
            return Ok(existing.clone());
        }
        let unique_fields: Vec<String> = unique_fields.iter().map(|f| f.to_string()).collect();
        if let Some(wal) = &self.wal {
            wal.append(&WalEntry::CreateCollection {
                name: name.to_string(),
                unique_fields: unique_fields.clone(),
            })?;
        }
        let collection = Collection::from_data(
            CollectionData::new(name.to_string(), unique_fields),
            self.wal.clone(),
        );
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    /// Register a collection loaded from a snapshot, attaching this database's WAL.
    pub fn attach(&self, data: CollectionData) {
        let name = data.name.clone();
        let collection = Collection::from_data(data, self.wal.clone());
        self.collections.write().insert(name, collection);
    }

    /// Returns a cloned handle to the named collection, or `None` if not found.
    pub fn get_collection(&self, name: &str) -> Option<Collection> {
        self.collections.read().get(name).cloned()
    }

    /// Like [`get_collection`](Self::get_collection) but fails with `UnknownCollection`.
    pub fn collection(&self, name: &str) -> Result<Collection, StoreError> {
        self.get_collection(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }

    /// Returns the names of all collections.
    pub fn list_collections(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Replay the attached WAL into memory.
    pub fn replay_wal(&self) -> Result<ReplayStats, StoreError> {
        let Some(wal) = self.wal.clone() else {
            return Ok(ReplayStats::default());
        };
        let (entries, stats) = wal.replay()?;
        for entry in entries {
            self.apply_wal_entry(entry);
        }
        Ok(stats)
    }

    fn apply_wal_entry(&self, entry: WalEntry) {
        let name = match &entry {
            WalEntry::CreateCollection {
                name,
                unique_fields,
            } => {
                let mut collections = self.collections.write();
                if !collections.contains_key(name) {
                    let collection = Collection::from_data(
                        CollectionData::new(name.clone(), unique_fields.clone()),
                        self.wal.clone(),
                    );
                    collections.insert(name.clone(), collection);
                }
                return;
            }
            WalEntry::Insert { collection, .. }
            | WalEntry::Update { collection, .. }
            | WalEntry::Delete { collection, .. }
            | WalEntry::DeleteMany { collection, .. } => collection.clone(),
        };
        match self.get_collection(&name) {
            Some(collection) => collection.apply(entry),
            None => tracing::warn!(collection = %name, "WAL entry for unknown collection, skipping"),
        }
    }

    /// Resolve joins for a page of documents.
    fn populate(&self, doc: &mut Document, join: &Populate) -> Result<(), StoreError> {
        match join {
            Populate::Reference {
                field,
                collection,
                select,
            } => {
                let target = self.collection(collection)?;
                let referenced = doc
                    .fields
                    .get(field)
                    .and_then(FieldValue::as_str)
                    .and_then(|raw| Uuid::parse_str(raw).ok())
                    .and_then(|id| target.get(&id));
                if let Some(found) = referenced {
                    doc.fields
                        .insert(field.clone(), embed(&select.apply(&found)));
                }
            }
            Populate::Reverse {
                as_field,
                collection,
                foreign_field,
            } => {
                let source = self.collection(collection)?;
                let related = source.find(
                    &FilterClause::eq(foreign_field.as_str(), doc.id.to_string()),
                    &[SortKey::asc(crate::config::CREATED_AT_FIELD)],
                    0,
                    None,
                );
                doc.fields.insert(
                    as_field.clone(),
                    FieldValue::Array(related.iter().map(|d| embed(d)).collect()),
                );
            }
        }
        Ok(())
    }
}

/// Nested representation of a document, with its id under `_id`.
fn embed(doc: &Document) -> FieldValue {
    let mut fields = doc.fields.clone();
    fields.insert(
        crate::config::ID_FIELD.to_string(),
        FieldValue::String(doc.id.to_string()),
    );
    FieldValue::Object(fields)
}

impl DocumentStore for Database {
    fn count(&self, collection: &str, filter: &FilterClause) -> Result<usize, StoreError> {
        Ok(self.collection(collection)?.count(filter))
    }

    fn fetch(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let docs = self
            .collection(collection)?
            .find(&query.filter, &query.sort, query.skip, query.limit);
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut projected = match &query.projection {
                Projection::All => Document::clone(&doc),
                projection => projection.apply(&doc),
            };
            for join in &query.populate {
                self.populate(&mut projected, join)?;
            }
            out.push(projected);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_types::{FilterCondition, FilterOperator};
    use std::path::PathBuf;

    fn fields(pairs: Vec<(&str, FieldValue)>) -> Fields {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn s(v: &str) -> FieldValue {
        FieldValue::String(v.to_string())
    }

    fn tmp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("devcamper_col_{}", Uuid::new_v4()))
    }

    // ── Collection CRUD ────────────────────────────────────────────────

    #[test]
    fn test_insert_and_get() {
        let col = Collection::new("bootcamps".into(), vec![]);
        let doc = col
            .insert(Document::new(fields(vec![("name", s("Devworks"))])))
            .unwrap();
        assert_eq!(col.document_count(), 1);
        assert_eq!(col.get(&doc.id).unwrap().fields["name"], s("Devworks"));
        assert!(col.get(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_unique_constraint() {
        let col = Collection::new("bootcamps".into(), vec!["name".into()]);
        col.insert(Document::new(fields(vec![("name", s("Devworks"))])))
            .unwrap();
        let err = col
            .insert(Document::new(fields(vec![("name", s("Devworks"))])))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "name"));
        assert_eq!(col.document_count(), 1);
    }

    #[test]
    fn test_update_merges_and_removes() {
        let col = Collection::new("bootcamps".into(), vec!["name".into()]);
        let doc = col
            .insert(Document::new(fields(vec![
                ("name", s("Devworks")),
                ("averageCost", FieldValue::Integer(10000)),
            ])))
            .unwrap();
        let updated = col
            .update(
                &doc.id,
                fields(vec![("housing", FieldValue::Boolean(true)), ("averageCost", FieldValue::Null)]),
            )
            .unwrap();
        assert_eq!(updated.fields["housing"], FieldValue::Boolean(true));
        assert!(!updated.fields.contains_key("averageCost"));
        assert_eq!(updated.fields["name"], s("Devworks"));
        assert!(updated.fields.contains_key("createdAt"));
    }

    #[test]
    fn test_update_to_own_unique_value_allowed() {
        let col = Collection::new("users".into(), vec!["email".into()]);
        let a = col
            .insert(Document::new(fields(vec![("email", s("a@x.io"))])))
            .unwrap();
        col.insert(Document::new(fields(vec![("email", s("b@x.io"))])))
            .unwrap();
        assert!(col.update(&a.id, fields(vec![("email", s("a@x.io"))])).is_ok());
        assert!(matches!(
            col.update(&a.id, fields(vec![("email", s("b@x.io"))])),
            Err(StoreError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_update_and_delete_missing() {
        let col = Collection::new("courses".into(), vec![]);
        let id = Uuid::new_v4();
        assert!(matches!(col.update(&id, Fields::new()), Err(StoreError::NotFound(_))));
        assert!(matches!(col.delete(&id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete_many_and_average() {
        let col = Collection::new("courses".into(), vec![]);
        let camp_a = Uuid::new_v4().to_string();
        let camp_b = Uuid::new_v4().to_string();
        for (camp, tuition) in [(&camp_a, 8000), (&camp_a, 10000), (&camp_b, 5000)] {
            col.insert(Document::new(fields(vec![
                ("bootcamp", s(camp)),
                ("tuition", FieldValue::Integer(tuition)),
            ])))
            .unwrap();
        }
        let by_a = FilterClause::eq("bootcamp", camp_a.as_str());
        assert_eq!(col.average(&by_a, "tuition"), Some(9000.0));
        assert_eq!(col.delete_many(&by_a).unwrap(), 2);
        assert_eq!(col.average(&by_a, "tuition"), None);
        assert_eq!(col.document_count(), 1);
    }

    #[test]
    fn test_find_sorts_and_windows() {
        let col = Collection::new("bootcamps".into(), vec![]);
        for (name, cost) in [("b", 3), ("a", 3), ("c", 1), ("d", 2)] {
            col.insert(Document::new(fields(vec![
                ("name", s(name)),
                ("averageCost", FieldValue::Integer(cost)),
            ])))
            .unwrap();
        }
        let names = |docs: Vec<Arc<Document>>| -> Vec<String> {
            docs.iter()
                .map(|d| d.fields["name"].as_str().unwrap().to_string())
                .collect()
        };
        let sorted = col.find(
            &FilterClause::all(),
            &[SortKey::desc("averageCost"), SortKey::asc("name")],
            0,
            None,
        );
        assert_eq!(names(sorted), vec!["a", "b", "d", "c"]);

        let window = col.find(&FilterClause::all(), &[SortKey::asc("name")], 1, Some(2));
        assert_eq!(names(window), vec!["b", "c"]);

        let filtered = col.find(
            &FilterClause {
                must: vec![FilterCondition::new("averageCost", FilterOperator::Lt, "3")],
                within: None,
            },
            &[SortKey::asc("averageCost")],
            0,
            None,
        );
        assert_eq!(names(filtered), vec!["c", "d"]);
    }

    #[test]
    fn test_missing_sort_field_orders_first() {
        let col = Collection::new("bootcamps".into(), vec![]);
        col.insert(Document::new(fields(vec![("name", s("rated")), ("averageRating", FieldValue::Integer(8))])))
            .unwrap();
        col.insert(Document::new(fields(vec![("name", s("unrated"))])))
            .unwrap();
        let docs = col.find(&FilterClause::all(), &[SortKey::asc("averageRating")], 0, None);
        assert_eq!(docs[0].fields["name"], s("unrated"));
    }

    // ── Database ───────────────────────────────────────────────────────

    #[test]
    fn test_ensure_collection_is_idempotent() {
        let db = Database::new();
        db.ensure_collection("users", &["email"]).unwrap();
        db.ensure_collection("users", &[]).unwrap();
        assert_eq!(db.list_collections(), vec!["users".to_string()]);
        assert_eq!(
            db.get_collection("users").unwrap().data.read().unique_fields,
            vec!["email".to_string()]
        );
        assert!(matches!(
            db.collection("nope"),
            Err(StoreError::UnknownCollection(_))
        ));
    }

    #[test]
    fn test_populate_reference_and_reverse() {
        let db = Database::new();
        let camps = db.ensure_collection("bootcamps", &[]).unwrap();
        let courses = db.ensure_collection("courses", &[]).unwrap();
        let camp = camps
            .insert(Document::new(fields(vec![
                ("name", s("Devworks")),
                ("description", s("Full stack")),
                ("phone", s("(111) 111-1111")),
            ])))
            .unwrap();
        courses
            .insert(Document::new(fields(vec![
                ("title", s("Front End")),
                ("bootcamp", s(&camp.id.to_string())),
            ])))
            .unwrap();

        let with_camp = db
            .find("courses", FilterClause::all())
            .populate(Populate::Reference {
                field: "bootcamp".into(),
                collection: "bootcamps".into(),
                select: Projection::include(["name", "description"]),
            })
            .exec()
            .unwrap();
        let json = with_camp[0].to_json();
        assert_eq!(json["bootcamp"]["name"], "Devworks");
        assert_eq!(json["bootcamp"]["_id"], camp.id.to_string());
        assert!(json["bootcamp"].get("phone").is_none());

        let with_courses = db
            .find("bootcamps", FilterClause::all())
            .populate(Populate::Reverse {
                as_field: "courses".into(),
                collection: "courses".into(),
                foreign_field: "bootcamp".into(),
            })
            .exec()
            .unwrap();
        let json = with_courses[0].to_json();
        assert_eq!(json["courses"].as_array().unwrap().len(), 1);
        assert_eq!(json["courses"][0]["title"], "Front End");
    }

    #[test]
    fn test_wal_replay_restores_documents() {
        let dir = tmp_dir();
        let (kept, removed, edited);
        {
            let wal = Arc::new(SyncWriteAheadLog::new(&dir).unwrap());
            let db = Database::with_wal(wal);
            let col = db.ensure_collection("bootcamps", &["name"]).unwrap();
            kept = col
                .insert(Document::new(fields(vec![("name", s("Kept"))])))
                .unwrap()
                .id;
            removed = col
                .insert(Document::new(fields(vec![("name", s("Removed"))])))
                .unwrap()
                .id;
            edited = col
                .insert(Document::new(fields(vec![("name", s("Before"))])))
                .unwrap()
                .id;
            col.delete(&removed).unwrap();
            col.update(&edited, fields(vec![("name", s("After"))])).unwrap();
        }
        {
            let wal = Arc::new(SyncWriteAheadLog::new(&dir).unwrap());
            let db = Database::with_wal(wal);
            let stats = db.replay_wal().unwrap();
            assert_eq!(stats.success, 6);
            let col = db.collection("bootcamps").unwrap();
            assert_eq!(col.document_count(), 2);
            assert!(col.get(&kept).is_some());
            assert!(col.get(&removed).is_none());
            assert_eq!(col.get(&edited).unwrap().fields["name"], s("After"));
            assert_eq!(col.data.read().unique_fields, vec!["name".to_string()]);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
