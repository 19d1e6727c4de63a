//! Field accessor table
//!
//! Each schema field compiles to a [`FieldBinding`]: the storage key it
//! reads and writes plus the effective descriptor driving coercion. Alias
//! fields bind to their target's storage key and a copy of the target's
//! descriptor, with the alias's own transform composed after the target's.

use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::coerce::coerce_in;
use crate::descriptor::{FieldDescriptor, FieldType, Transform};
use crate::record::{Record, RecordInner};
use crate::sequence::TypedSequence;
use crate::value::{Map, Value};

/// Read/write paths of one field
#[derive(Debug, Clone)]
pub(crate) struct FieldBinding {
    pub(crate) storage_key: String,
    pub(crate) descriptor: Rc<FieldDescriptor>,
    pub(crate) alias: bool,
    /// The declared field's own visibility, which aliases do not inherit
    pub(crate) invisible: bool,
}

impl FieldBinding {
    /// Bind `name`, which must be a key of `fields`
    pub(crate) fn bind(name: &str, fields: &IndexMap<String, Rc<FieldDescriptor>>) -> Self {
        let declared = &fields[name];
        if declared.field_type != FieldType::Alias {
            return Self {
                storage_key: name.to_string(),
                descriptor: declared.clone(),
                alias: false,
                invisible: declared.invisible,
            };
        }

        let mut visited = vec![name.to_string()];
        let (storage_key, descriptor) = resolve_alias(name, fields, &mut visited);
        Self {
            storage_key,
            descriptor: Rc::new(descriptor),
            alias: true,
            invisible: declared.invisible,
        }
    }

    /// Current value, substituting the coerced default when unset.
    ///
    /// Defaults are never written back; every read resolves them again.
    pub(crate) fn read(&self, record: &Record) -> Value {
        self.resolve(record, true)
    }

    /// Coerce and store `value`; failures go to the record's error sink.
    ///
    /// The prior value handed to transforms and errors is the field as a
    /// read would see it, so an unset field with a default reports the
    /// default. A default that fails to coerce counts as unset here and is
    /// only reported by reads.
    pub(crate) fn write(&self, record: &Record, value: Value) {
        if self.descriptor.read_only {
            debug!(field = self.descriptor.label(), "ignoring write to read-only field");
            return;
        }

        let prior = self.resolve(record, false);
        match coerce_in(value, &prior, &self.descriptor, Some(record)) {
            Ok(value) => record.store(&self.storage_key, value),
            Err(err) => {
                debug!(
                    field = self.descriptor.label(),
                    kind = %err.kind,
                    message = %err.message,
                    "write rejected"
                );
                record.record_error(err);
            }
        }
    }

    fn resolve(&self, record: &Record, report: bool) -> Value {
        let stored = record.stored(&self.storage_key);
        if !stored.is_undefined() {
            return stored;
        }

        let Some(default) = &self.descriptor.default else {
            return stored;
        };

        match coerce_in(default.resolve(), &Value::Undefined, &self.descriptor, Some(record)) {
            Ok(value) => value,
            Err(err) => {
                debug!(field = self.descriptor.label(), kind = %err.kind, "default rejected");
                if report {
                    record.record_error(err);
                }
                Value::Undefined
            }
        }
    }

    /// Storage allocated when a record is built: sequences and objects only
    pub(crate) fn allocate(&self, owner: &Weak<RecordInner>) -> Option<Value> {
        if self.alias {
            return None;
        }

        match self.descriptor.field_type {
            FieldType::Array => Some(Value::Sequence(TypedSequence::owned(
                self.descriptor.clone(),
                owner.clone(),
            ))),
            FieldType::Object => Some(match &self.descriptor.nested {
                Some(schema) => Value::Record(schema.create()),
                None => Value::Object(Map::new()),
            }),
            _ => None,
        }
    }
}

/// Storage key and effective descriptor of an alias, following alias chains
fn resolve_alias(
    name: &str,
    fields: &IndexMap<String, Rc<FieldDescriptor>>,
    visited: &mut Vec<String>,
) -> (String, FieldDescriptor) {
    let declared = &fields[name];
    let target = declared.alias_target.as_deref().unwrap_or(name);

    let (storage_key, mut effective) = match fields.get(target) {
        None => {
            warn!(field = name, target, "alias target is not declared, treating as any");
            (target.to_string(), FieldDescriptor::any())
        }
        Some(_) if visited.iter().any(|seen| seen == target) => {
            warn!(field = name, target, "alias cycle, treating as any");
            (target.to_string(), FieldDescriptor::any())
        }
        Some(found) if found.field_type == FieldType::Alias => {
            visited.push(target.to_string());
            resolve_alias(target, fields, visited)
        }
        Some(found) => (target.to_string(), (**found).clone()),
    };

    effective.transform = compose(effective.transform.take(), declared.transform.clone());
    effective.read_only |= declared.read_only;
    effective.name = Some(name.to_string());
    (storage_key, effective)
}

/// `first`, then `then`
fn compose(first: Option<Transform>, then: Option<Transform>) -> Option<Transform> {
    match (first, then) {
        (Some(first), Some(then)) => {
            let composed: Transform =
                Rc::new(move |value: Value, prior: &Value, descriptor: &FieldDescriptor| {
                    let value = first(value, prior, descriptor);
                    then(value, prior, descriptor)
                });
            Some(composed)
        }
        (first, None) => first,
        (None, then) => then,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn fields(entries: Vec<(&str, FieldDescriptor)>) -> IndexMap<String, Rc<FieldDescriptor>> {
        entries
            .into_iter()
            .map(|(name, d)| (name.to_string(), Rc::new(normalize(d, Some(name)))))
            .collect()
    }

    #[test]
    fn test_plain_binding() {
        let fields = fields(vec![("name", FieldDescriptor::string().invisible())]);
        let binding = FieldBinding::bind("name", &fields);
        assert_eq!(binding.storage_key, "name");
        assert!(!binding.alias);
        assert!(binding.invisible);
    }

    #[test]
    fn test_alias_inherits_target() {
        let fields = fields(vec![
            ("name", FieldDescriptor::string().max_length(5)),
            ("title", FieldDescriptor::alias("name").read_only()),
        ]);
        let binding = FieldBinding::bind("title", &fields);
        assert_eq!(binding.storage_key, "name");
        assert!(binding.alias);
        assert_eq!(binding.descriptor.field_type, FieldType::String);
        assert_eq!(binding.descriptor.max_length, Some(5));
        assert!(binding.descriptor.read_only);
        assert_eq!(binding.descriptor.label(), "title");
    }

    fn suffix(tag: &'static str) -> impl Fn(Value, &Value, &FieldDescriptor) -> Value {
        move |v, _, _| Value::from(format!("{}-{}", v.scalar_text().unwrap_or_default(), tag))
    }

    fn apply(binding: &FieldBinding, input: &str) -> Value {
        let transform = binding.descriptor.transform.clone().unwrap();
        transform(Value::from(input), &Value::Undefined, &binding.descriptor)
    }

    #[test]
    fn test_alias_chain_and_transform_order() {
        let fields = fields(vec![
            ("code", FieldDescriptor::string().transform(suffix("t"))),
            ("short", FieldDescriptor::alias("code").transform(suffix("a"))),
            ("tiny", FieldDescriptor::alias("short")),
        ]);

        let short = FieldBinding::bind("short", &fields);
        assert_eq!(apply(&short, "x"), Value::from("x-t-a"));

        let tiny = FieldBinding::bind("tiny", &fields);
        assert_eq!(tiny.storage_key, "code");
        assert_eq!(apply(&tiny, "x"), Value::from("x-t-a"));
    }

    #[test]
    fn test_broken_aliases_degrade_to_any() {
        let fields = fields(vec![
            ("ghost", FieldDescriptor::alias("missing")),
            ("a", FieldDescriptor::alias("b")),
            ("b", FieldDescriptor::alias("a")),
        ]);

        let ghost = FieldBinding::bind("ghost", &fields);
        assert_eq!(ghost.storage_key, "missing");
        assert_eq!(ghost.descriptor.field_type, FieldType::Any);

        let cyclic = FieldBinding::bind("a", &fields);
        assert_eq!(cyclic.descriptor.field_type, FieldType::Any);
    }
}
