//! Live records
//!
//! A [`Record`] is the only sanctioned way to touch a schema instance.
//! `get`/`set` consult the schema's accessor table; names the schema does
//! not declare are dropped (strict schemas) or admitted as `any` fields
//! (lenient schemas). Records are shared handles: a nested record read from
//! a field is the same record stored in it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::descriptor::FieldType;
use crate::error::{ErrorSink, SetterError};
use crate::schema::Schema;
use crate::sequence::TypedSequence;
use crate::value::{Map, Value};

/// Shared handle to a schema instance
#[derive(Clone)]
pub struct Record {
    inner: Rc<RecordInner>,
}

/// Storage a record allocates for a structural field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Allocated {
    Sequence,
    Nested,
    Plain,
}

pub(crate) struct RecordInner {
    schema: Schema,
    store: RefCell<HashMap<String, Value>>,
    errors: ErrorSink,
}

impl Record {
    /// Bind a fresh record to `schema`; sequences and objects are allocated up front
    pub fn new(schema: &Schema) -> Self {
        let record = Self {
            inner: Rc::new(RecordInner {
                schema: schema.clone(),
                store: RefCell::new(HashMap::new()),
                errors: ErrorSink::new(),
            }),
        };

        let owner = record.downgrade();
        let allocated: Vec<(String, Value)> = schema
            .bindings()
            .into_iter()
            .filter_map(|(_, binding)| {
                let key = binding.storage_key.clone();
                binding.allocate(&owner).map(|value| (key, value))
            })
            .collect();
        record.inner.store.borrow_mut().extend(allocated);
        record
    }

    /// Bind a record and write each key of `initial`, in order
    pub fn with_values(schema: &Schema, initial: impl Into<Value>) -> Self {
        let record = Self::new(schema);
        let initial = initial.into();
        match initial.entries() {
            Some(entries) => {
                for (name, value) in entries {
                    record.set(&name, value);
                }
            }
            None if initial.is_nullish() => {}
            None => debug!(kind = initial.type_name(), "ignoring non-structural initial values"),
        }
        record
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Whether the schema declares (or has admitted) `name`
    pub fn has(&self, name: &str) -> bool {
        self.inner.schema.contains(name)
    }

    /// Current value of a field.
    ///
    /// Unset fields with a default yield the coerced default without storing
    /// it. Undeclared names read whatever is stored under them, which is
    /// normally nothing.
    pub fn get(&self, name: &str) -> Value {
        match self.inner.schema.binding(name) {
            Some(binding) => binding.read(self),
            None => self.stored(name),
        }
    }

    /// Write a field through its coercion pipeline.
    ///
    /// Rejections never surface here; poll [`Record::errors`].
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let binding = match self.inner.schema.binding(name) {
            Some(binding) => binding,
            None if self.inner.schema.is_strict() => {
                debug!(field = name, "dropping write to undeclared field");
                return;
            }
            None => self.inner.schema.admit(name),
        };
        binding.write(self, value.into());
    }

    /// The live sequence of an array field
    pub fn sequence(&self, name: &str) -> Option<TypedSequence> {
        self.get(name).as_sequence().cloned()
    }

    /// The live nested record of an object field
    pub fn nested(&self, name: &str) -> Option<Record> {
        self.get(name).as_record().cloned()
    }

    /// Schema-free deep snapshot of every visible field
    pub fn export(&self) -> Value {
        let mut snapshot = Map::new();
        for (name, binding) in self.inner.schema.bindings() {
            if binding.invisible {
                continue;
            }
            snapshot.insert(name, binding.read(self).to_plain());
        }
        Value::Object(snapshot)
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.export().to_json()
    }

    /// Failed writes recorded so far
    pub fn errors(&self) -> Vec<SetterError> {
        self.inner.errors.snapshot()
    }

    pub fn has_errors(&self) -> bool {
        !self.inner.errors.is_empty()
    }

    pub fn clear_errors(&self) {
        self.inner.errors.clear();
    }

    /// Reset every field to unset.
    ///
    /// Containers the record owns are emptied in place rather than dropped:
    /// sequences are cleared and nested records cleared recursively. Untyped
    /// object fields get a fresh empty object. Handles obtained earlier stay
    /// valid.
    pub fn clear(&self) {
        let previous = std::mem::take(&mut *self.inner.store.borrow_mut());

        let mut kept = HashMap::new();
        for (key, value) in previous {
            let Some(allocated) = self.allocated_type(&key) else {
                continue;
            };
            let reset = match (allocated, value) {
                (Allocated::Sequence, Value::Sequence(seq)) => {
                    seq.clear();
                    Value::Sequence(seq)
                }
                (Allocated::Nested, Value::Record(nested)) => {
                    nested.clear();
                    Value::Record(nested)
                }
                (Allocated::Plain, _) => Value::Object(Map::new()),
                _ => continue,
            };
            kept.insert(key, reset);
        }
        self.inner.store.borrow_mut().extend(kept);
    }

    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Kind of container allocated for the field stored under `key`, if any
    fn allocated_type(&self, key: &str) -> Option<Allocated> {
        let binding = self.inner.schema.binding(key).filter(|b| !b.alias)?;
        match binding.descriptor.field_type {
            FieldType::Array => Some(Allocated::Sequence),
            FieldType::Object if binding.descriptor.nested.is_some() => Some(Allocated::Nested),
            FieldType::Object => Some(Allocated::Plain),
            _ => None,
        }
    }

    pub(crate) fn from_inner(inner: Rc<RecordInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RecordInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn stored(&self, key: &str) -> Value {
        self.inner.store.borrow().get(key).cloned().unwrap_or_default()
    }

    pub(crate) fn store(&self, key: &str, value: Value) {
        self.inner.store.borrow_mut().insert(key.to_string(), value);
    }

    pub(crate) fn record_error(&self, error: SetterError) {
        self.inner.errors.push(error);
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Record");
        match self.inner.store.try_borrow() {
            Ok(store) => {
                for name in self.inner.schema.field_names() {
                    if let Some(value) = store.get(&name) {
                        out.field(&name, value);
                    }
                }
            }
            Err(_) => {
                out.field("store", &"<borrowed>");
            }
        }
        out.field("errors", &self.inner.errors.len()).finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldDescriptor;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn person() -> Schema {
        Schema::builder()
            .field("name", "string")
            .field("age", FieldDescriptor::number().min(0.0))
            .field("tags", crate::normalize::RawField::array_of("string"))
            .field("address", Schema::new([("city", "string")]))
            .build()
    }

    #[test]
    fn test_structural_fields_are_allocated() {
        let record = person().create();
        assert!(record.sequence("tags").is_some());
        assert!(record.nested("address").is_some());
        assert_eq!(record.get("name"), Value::Undefined);
    }

    #[test]
    fn test_rejected_write_keeps_prior_value() {
        let record = person().create_with(json!({"age": 30}));
        record.set("age", -5);
        assert_eq!(record.get("age"), Value::from(30));

        let errors = record.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::ConstraintViolation);
        assert_eq!(errors[0].prior, Value::from(30));
        assert_eq!(errors[0].field(), Some("age"));

        record.clear_errors();
        assert!(!record.has_errors());
    }

    #[test]
    fn test_container_identity_is_stable() {
        let record = person().create();
        let tags = record.sequence("tags").unwrap();
        let address = record.nested("address").unwrap();

        record.set("tags", vec!["a", "b"]);
        record.set("address", json!({"city": "Oslo"}));

        assert!(record.sequence("tags").unwrap().ptr_eq(&tags));
        assert_eq!(tags.len(), 2);
        assert!(record.nested("address").unwrap().ptr_eq(&address));
        assert_eq!(address.get("city"), Value::from("Oslo"));
    }

    #[test]
    fn test_self_assignment_keeps_contents() {
        let record = person().create_with(json!({
            "tags": ["x", "y"],
            "address": {"city": "Rome"}
        }));
        record.set("tags", record.get("tags"));
        record.set("address", record.get("address"));
        assert_eq!(record.sequence("tags").unwrap().len(), 2);
        assert_eq!(record.nested("address").unwrap().get("city"), Value::from("Rome"));
    }

    #[test]
    fn test_clear_empties_in_place() {
        let record = person().create_with(json!({
            "name": "Ada",
            "tags": ["x"],
            "address": {"city": "Paris"}
        }));
        let tags = record.sequence("tags").unwrap();
        let address = record.nested("address").unwrap();

        record.clear();
        assert_eq!(record.get("name"), Value::Undefined);
        assert!(tags.is_empty());
        assert_eq!(address.get("city"), Value::Undefined);
        assert!(record.sequence("tags").unwrap().ptr_eq(&tags));
        assert!(record.nested("address").unwrap().ptr_eq(&address));
    }

    #[test]
    fn test_clear_leaves_other_records_alone() {
        let owner = person().create_with(json!({"name": "Ada", "tags": ["x", "y"]}));
        let other = Schema::new([("meta", "object")]).create();

        other.set("meta", owner.get("tags"));
        other.clear();
        assert_eq!(owner.sequence("tags").unwrap().len(), 2);
        assert_eq!(other.get("meta"), Value::Object(Map::new()));

        other.set("meta", owner.clone());
        assert!(other.get("meta").as_record().is_none());
        other.clear();
        assert_eq!(owner.get("name"), Value::from("Ada"));
    }

    #[test]
    fn test_write_prior_is_resolved_default() {
        let schema = Schema::builder()
            .field(
                "limit",
                FieldDescriptor::number()
                    .default_value(10)
                    .max(100.0)
                    .transform(|v, prior, _| if v.is_nullish() { prior.clone() } else { v }),
            )
            .build();

        let record = schema.create();
        record.set("limit", 500);
        assert_eq!(record.errors()[0].prior, Value::from(10));

        record.set("limit", Value::Null);
        assert_eq!(record.get("limit"), Value::from(10));
        assert_eq!(record.errors().len(), 1);
    }

    #[test]
    fn test_element_errors_reach_owner() {
        let schema = Schema::new([("scores", crate::normalize::RawField::array_of("number"))]);
        let record = schema.create();
        let scores = record.sequence("scores").unwrap();
        scores.append([Value::from(1), Value::from("x"), Value::from(2)]);

        assert_eq!(scores.len(), 2);
        assert_eq!(record.errors().len(), 1);
        assert_eq!(record.errors()[0].kind, ErrorKind::TypeMismatch);
        assert!(scores.owner().unwrap().ptr_eq(&record));
    }

    #[test]
    fn test_serialize_matches_export() {
        let record = person().create_with(json!({"name": "Ada", "age": "36", "tags": [1]}));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, json!({"name": "Ada", "age": 36, "tags": ["1"], "address": {}}));
    }
}
