//! Typed sequences
//!
//! Array fields hold a [`TypedSequence`]: an ordered container bound to the
//! field's descriptor. Appended values are coerced against the element
//! descriptor one by one; a value that fails is left out of the batch and
//! its error lands in the owning record's error sink. No error is raised
//! by the append itself.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::coerce::coerce_in;
use crate::descriptor::FieldDescriptor;
use crate::record::{Record, RecordInner};
use crate::value::Value;

/// Shared handle to an ordered, element-coercing container
#[derive(Clone)]
pub struct TypedSequence {
    inner: Rc<SequenceInner>,
}

struct SequenceInner {
    /// Descriptor of the array field: element rules and `unique`
    descriptor: Rc<FieldDescriptor>,
    owner: Weak<RecordInner>,
    items: RefCell<Vec<Value>>,
}

impl TypedSequence {
    /// Sequence reporting element failures to `owner`
    pub(crate) fn owned(descriptor: Rc<FieldDescriptor>, owner: Weak<RecordInner>) -> Self {
        Self {
            inner: Rc::new(SequenceInner {
                descriptor,
                owner,
                items: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Sequence with no owning record; element failures are only logged
    pub fn detached(descriptor: Rc<FieldDescriptor>) -> Self {
        Self::owned(descriptor, Weak::new())
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.inner.descriptor
    }

    /// The record whose field holds this sequence, while it is alive
    pub fn owner(&self) -> Option<Record> {
        self.inner.owner.upgrade().map(Record::from_inner)
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Current elements; nested records and sequences stay live handles
    pub fn values(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.inner.items.borrow().contains(value)
    }

    /// Append one value; returns the new length
    pub fn push(&self, value: impl Into<Value>) -> usize {
        self.append([value.into()])
    }

    /// Append a batch of values; returns the new length
    pub fn append<I>(&self, values: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let owner = self.owner();
        let coerced: Vec<Value> = values
            .into_iter()
            .filter_map(|value| self.admit(value.into(), owner.as_ref()))
            .collect();

        let batch = if self.inner.descriptor.unique {
            let existing = self.inner.items.borrow();
            let mut accepted: Vec<Value> = Vec::with_capacity(coerced.len());
            for value in coerced {
                if !existing.contains(&value) && !accepted.contains(&value) {
                    accepted.push(value);
                }
            }
            accepted
        } else {
            coerced
        };

        let mut items = self.inner.items.borrow_mut();
        items.extend(batch);
        items.len()
    }

    pub fn pop(&self) -> Option<Value> {
        self.inner.items.borrow_mut().pop()
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let mut items = self.inner.items.borrow_mut();
        (index < items.len()).then(|| items.remove(index))
    }

    pub fn clear(&self) {
        self.inner.items.borrow_mut().clear();
    }

    /// Plain copy of the elements: records exported, sequences materialized
    pub fn to_plain(&self) -> Vec<Value> {
        self.values().iter().map(Value::to_plain).collect()
    }

    pub fn ptr_eq(&self, other: &TypedSequence) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Empty the sequence and append `values`, keeping its identity
    pub(crate) fn replace(&self, values: Vec<Value>) {
        self.clear();
        self.append(values);
    }

    /// Coerce one element, routing a failure to the owner's error sink
    fn admit(&self, value: Value, owner: Option<&Record>) -> Option<Value> {
        let Some(element) = &self.inner.descriptor.element else {
            return Some(value);
        };

        match coerce_in(value, &Value::Undefined, element, owner) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(
                    field = self.inner.descriptor.label(),
                    kind = %err.kind,
                    message = %err.message,
                    "dropping sequence element"
                );
                if let Some(owner) = owner {
                    owner.record_error(err);
                }
                None
            }
        }
    }
}

impl fmt::Debug for TypedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.items.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("[<borrowed>]"),
        }
    }
}

impl Serialize for TypedSequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Value::Sequence(self.clone()).to_json().serialize(serializer)
    }
}
