//! Compiled schema definitions
//!
//! A [`Schema`] is a cheap, shared handle to a compiled field map. Every
//! record created from it reads the same descriptors and the same accessor
//! table. The only mutation after compilation is lenient admission of
//! undeclared fields (see [`SchemaOptions::strict`]).

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binding::FieldBinding;
use crate::descriptor::{FieldDescriptor, FieldType};
use crate::error::{Result, SchemaError};
use crate::normalize::{normalize, RawField};
use crate::record::Record;
use crate::value::Value;

/// Options fixed when a schema is compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaOptions {
    /// Drop writes to undeclared fields instead of admitting them as `any`
    #[serde(default = "default_true")]
    pub strict: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Shared handle to a compiled schema
#[derive(Clone)]
pub struct Schema {
    inner: Rc<SchemaInner>,
}

struct SchemaInner {
    options: SchemaOptions,
    fields: RefCell<IndexMap<String, Rc<FieldDescriptor>>>,
    bindings: RefCell<IndexMap<String, FieldBinding>>,
}

impl Schema {
    /// Compile a strict schema from field declarations
    pub fn new<I, K, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<RawField>,
    {
        Self::with_options(fields, SchemaOptions::default())
    }

    pub fn with_options<I, K, F>(fields: I, options: SchemaOptions) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<RawField>,
    {
        let fields: IndexMap<String, Rc<FieldDescriptor>> = fields
            .into_iter()
            .map(|(name, raw)| {
                let name = name.into();
                let descriptor = normalize(raw, Some(&name));
                (name, Rc::new(descriptor))
            })
            .collect();

        let bindings = fields
            .keys()
            .map(|name| (name.clone(), FieldBinding::bind(name, &fields)))
            .collect();

        Self {
            inner: Rc::new(SchemaInner {
                options,
                fields: RefCell::new(fields),
                bindings: RefCell::new(bindings),
            }),
        }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Compile a JSON declaration; the root must be an object
    pub fn from_json(declaration: &serde_json::Value) -> Result<Self> {
        Self::from_json_with(declaration, SchemaOptions::default())
    }

    pub fn from_json_with(declaration: &serde_json::Value, options: SchemaOptions) -> Result<Self> {
        let map = declaration.as_object().ok_or_else(|| {
            SchemaError::InvalidDeclaration(format!(
                "expected an object of fields, found {}",
                json_kind(declaration)
            ))
        })?;

        Ok(Self::with_options(
            map.iter().map(|(name, raw)| (name.clone(), RawField::from(raw.clone()))),
            options,
        ))
    }

    pub fn from_json_str(declaration: &str) -> Result<Self> {
        Self::from_json(&serde_json::from_str(declaration)?)
    }

    pub fn options(&self) -> SchemaOptions {
        self.inner.options
    }

    pub fn is_strict(&self) -> bool {
        self.inner.options.strict
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.fields.borrow().contains_key(name)
    }

    /// Declared descriptor of a field, as normalized
    pub fn descriptor(&self, name: &str) -> Option<Rc<FieldDescriptor>> {
        self.inner.fields.borrow().get(name).cloned()
    }

    /// Field names in declaration order, admitted fields last
    pub fn field_names(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.borrow().is_empty()
    }

    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// New record with every field unset (structural fields allocated)
    pub fn create(&self) -> Record {
        Record::new(self)
    }

    /// New record populated from `initial`, one field write per key
    pub fn create_with(&self, initial: impl Into<Value>) -> Record {
        Record::with_values(self, initial)
    }

    pub(crate) fn binding(&self, name: &str) -> Option<FieldBinding> {
        self.inner.bindings.borrow().get(name).cloned()
    }

    /// Snapshot of the accessor table, in field order
    pub(crate) fn bindings(&self) -> Vec<(String, FieldBinding)> {
        self.inner
            .bindings
            .borrow()
            .iter()
            .map(|(name, binding)| (name.clone(), binding.clone()))
            .collect()
    }

    /// Append an `any` field for an undeclared name.
    ///
    /// Every record sharing this schema sees the new field. Not safe to
    /// interleave with other access to the same schema from another thread;
    /// the handle is `!Send`, so that cannot happen without external help.
    pub(crate) fn admit(&self, name: &str) -> FieldBinding {
        if let Some(binding) = self.binding(name) {
            return binding;
        }

        debug!(field = name, "admitting undeclared field");
        let descriptor = Rc::new(normalize(FieldType::Any, Some(name)));
        let mut fields = self.inner.fields.borrow_mut();
        fields.insert(name.to_string(), descriptor);
        let binding = FieldBinding::bind(name, &fields);
        self.inner
            .bindings
            .borrow_mut()
            .insert(name.to_string(), binding.clone());
        binding
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("options", &self.inner.options)
            .field("fields", &self.field_names())
            .finish()
    }
}

/// Incremental schema declaration
#[derive(Default)]
pub struct SchemaBuilder {
    fields: Vec<(String, RawField)>,
    options: SchemaOptions,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, raw: impl Into<RawField>) -> Self {
        self.fields.push((name.into(), raw.into()));
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Schema {
        Schema::with_options(self.fields, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_preserves_order() {
        let schema = Schema::new([("b", "string"), ("a", "number"), ("c", "date")]);
        assert_eq!(schema.field_names(), vec!["b", "a", "c"]);
        assert!(schema.is_strict());
        assert_eq!(schema.descriptor("a").unwrap().field_type, FieldType::Number);
        assert_eq!(schema.descriptor("c").unwrap().name.as_deref(), Some("c"));
    }

    #[test]
    fn test_from_json() {
        let schema = Schema::from_json(&json!({
            "name": "string",
            "age": {"type": "number", "min": 0},
            "tags": ["string"],
            "profile": {"first": "string"}
        }))
        .unwrap();

        assert_eq!(schema.len(), 4);
        assert_eq!(schema.descriptor("age").unwrap().min, Some(0.0));
        assert_eq!(schema.descriptor("tags").unwrap().field_type, FieldType::Array);
        assert!(schema.descriptor("profile").unwrap().nested.is_some());
    }

    #[test]
    fn test_from_json_rejects_non_object_root() {
        let err = Schema::from_json(&json!(["string"])).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDeclaration(_)));
        assert!(Schema::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_admit_appends_any_field() {
        let schema = Schema::builder().field("name", "string").strict(false).build();
        assert!(!schema.is_strict());

        schema.admit("extra");
        assert!(schema.contains("extra"));
        assert_eq!(schema.field_names(), vec!["name", "extra"]);
        assert_eq!(schema.descriptor("extra").unwrap().field_type, FieldType::Any);

        schema.admit("extra");
        assert_eq!(schema.len(), 2);
    }
}
