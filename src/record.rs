use crate::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A business record a report is rendered for.
///
/// Records are read-only here: expressions can read the id and named fields
/// but never change them.
pub trait Record: fmt::Debug + Send + Sync {
    /// Name of the model the record belongs to, e.g. `res.partner`.
    fn model(&self) -> &str;

    fn id(&self) -> i64;

    /// Value of the field `name`, or `None` if the model has no such field.
    fn field(&self, name: &str) -> Option<Value>;
}

/// Record with its fields held in memory, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct RecordData {
    model: String,
    id: i64,
    fields: IndexMap<String, Value>,
}

impl RecordData {
    pub fn new<S: Into<String>>(model: S, id: i64) -> RecordData {
        RecordData {
            model: model.into(),
            id,
            fields: IndexMap::new(),
        }
    }

    pub fn with_field<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.set(name, value);
        self
    }

    pub fn set<K, V>(&mut self, name: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(name.into(), value.into());
    }

    pub fn fields(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.fields.iter()
    }
}

impl Record for RecordData {
    fn model(&self) -> &str {
        &self.model
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }
}

/// Lookup of records by model and id, the way a host application browses its database.
pub trait RecordStore {
    fn browse(&self, model: &str, id: i64) -> Option<Arc<dyn Record>>;
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn browse(&self, model: &str, id: i64) -> Option<Arc<dyn Record>> {
        (**self).browse(model, id)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn browse(&self, model: &str, id: i64) -> Option<Arc<dyn Record>> {
        (**self).browse(model, id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<(String, i64), Arc<dyn Record>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Adds `record`, replacing any record with the same model and id.
    pub fn insert<R: Record + 'static>(&mut self, record: R) {
        let key = (record.model().to_string(), record.id());
        self.records.insert(key, Arc::new(record));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn browse(&self, model: &str, id: i64) -> Option<Arc<dyn Record>> {
        self.records.get(&(model.to_string(), id)).cloned()
    }
}
