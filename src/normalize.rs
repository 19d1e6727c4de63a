//! Field declaration normalization
//!
//! Schema fields may be declared in several shorthand forms. [`RawField`]
//! captures all of them and [`normalize`] folds each into one canonical
//! [`FieldDescriptor`]:
//!
//! | declaration                         | canonical result                       |
//! |-------------------------------------|----------------------------------------|
//! | `"string"`, `FieldType::Number`     | `{type}` (names are case-insensitive)  |
//! | `{type: X, ...props}`               | props, with `X` resolved recursively   |
//! | `null`                              | `any`                                  |
//! | `[X]` / `[]`                        | `array` with / without element rules   |
//! | `{field: ...}` map, `Schema` handle | `object` backed by a nested schema     |
//!
//! Normalization never fails. Anything it cannot make sense of becomes an
//! `any` field and a warning is logged.

use std::rc::Rc;

use regex::Regex;
use tracing::warn;

use crate::descriptor::{DefaultValue, FieldDescriptor, FieldType};
use crate::schema::Schema;
use crate::value::Value;

/// A field declaration before normalization
#[derive(Debug, Clone)]
pub enum RawField {
    /// Null type: accepts anything
    Null,
    /// Bare type name, e.g. `"string"` or `"Date"`
    Type(String),
    /// Name-bearing type handle
    Kind(FieldType),
    /// An object carrying its own `type`, plus properties
    Declared { ty: Box<RawField>, props: FieldDescriptor },
    /// `[Element]`, or `[]` for an untyped sequence
    Sequence(Option<Box<RawField>>),
    /// Nested schema map
    Map(Vec<(String, RawField)>),
    /// Already compiled schema handle
    Schema(Schema),
    /// Already canonical descriptor
    Canonical(FieldDescriptor),
}

impl RawField {
    pub fn array_of(element: impl Into<RawField>) -> Self {
        RawField::Sequence(Some(Box::new(element.into())))
    }

    pub fn array() -> Self {
        RawField::Sequence(None)
    }

    pub fn map<I, K, F>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<RawField>,
    {
        RawField::Map(entries.into_iter().map(|(k, f)| (k.into(), f.into())).collect())
    }

    /// `{type: ty, ...props}`
    pub fn declared(ty: impl Into<RawField>, props: FieldDescriptor) -> Self {
        RawField::Declared {
            ty: Box::new(ty.into()),
            props,
        }
    }
}

impl From<&str> for RawField {
    fn from(name: &str) -> Self {
        RawField::Type(name.to_string())
    }
}

impl From<String> for RawField {
    fn from(name: String) -> Self {
        RawField::Type(name)
    }
}

impl From<FieldType> for RawField {
    fn from(kind: FieldType) -> Self {
        RawField::Kind(kind)
    }
}

impl From<FieldDescriptor> for RawField {
    fn from(descriptor: FieldDescriptor) -> Self {
        RawField::Canonical(descriptor)
    }
}

impl From<Schema> for RawField {
    fn from(schema: Schema) -> Self {
        RawField::Schema(schema)
    }
}

impl From<serde_json::Value> for RawField {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => RawField::Null,
            Json::String(name) => RawField::Type(name),
            Json::Array(items) => {
                RawField::Sequence(items.into_iter().next().map(|e| Box::new(RawField::from(e))))
            }
            Json::Object(mut map) => match map.shift_remove("type") {
                Some(ty) => RawField::Declared {
                    ty: Box::new(RawField::from(ty)),
                    props: json_props(&map),
                },
                None => RawField::Map(
                    map.into_iter().map(|(k, v)| (k, RawField::from(v))).collect(),
                ),
            },
            other => {
                warn!(declaration = %other, "unusable field declaration, treating as any");
                RawField::Null
            }
        }
    }
}

/// Normalize a declaration into a canonical descriptor.
///
/// When `name` is given it becomes the descriptor's diagnostic label.
/// Normalizing a canonical descriptor only relabels it.
pub fn normalize(raw: impl Into<RawField>, name: Option<&str>) -> FieldDescriptor {
    let mut descriptor = match raw.into() {
        RawField::Canonical(descriptor) => descriptor,
        RawField::Declared { ty, props } => resolve(*ty, props),
        other => resolve(other, FieldDescriptor::default()),
    };

    if descriptor.field_type == FieldType::Alias && descriptor.alias_target.is_none() {
        warn!(field = descriptor.label(), "alias field without a target, treating as any");
        descriptor.field_type = FieldType::Any;
    }

    if let Some(name) = name {
        descriptor.name = Some(name.to_string());
    }
    descriptor
}

/// Settle the type of `props` from a type declaration
fn resolve(ty: RawField, mut props: FieldDescriptor) -> FieldDescriptor {
    match ty {
        RawField::Null => props.field_type = FieldType::Any,
        RawField::Type(name) => {
            props.field_type = FieldType::from_name(&name).unwrap_or_else(|| {
                warn!(
                    type_name = %name,
                    field = props.label(),
                    "unknown field type, treating as any"
                );
                FieldType::Any
            });
        }
        RawField::Kind(kind) => props.field_type = kind,
        RawField::Declared { ty, props: inner } => {
            props.inherit(&inner);
            return resolve(*ty, props);
        }
        RawField::Canonical(inner) => {
            props.inherit(&inner);
            props.field_type = inner.field_type;
        }
        RawField::Sequence(element) => {
            props.field_type = FieldType::Array;
            if props.element.is_none() {
                props.element = element.map(|e| Rc::new(normalize(*e, None)));
            }
        }
        RawField::Map(entries) => {
            props.field_type = FieldType::Object;
            if props.nested.is_none() && !entries.is_empty() {
                props.nested = Some(Schema::new(entries));
            }
        }
        RawField::Schema(schema) => {
            props.field_type = FieldType::Object;
            if props.nested.is_none() {
                props.nested = Some(schema);
            }
        }
    }
    props
}

/// Properties of a JSON `{type: ...}` declaration
fn json_props(map: &serde_json::Map<String, serde_json::Value>) -> FieldDescriptor {
    let mut props = FieldDescriptor::default();

    for (key, value) in map {
        match key.as_str() {
            "default" => props.default = Some(DefaultValue::Literal(Value::from(value.clone()))),
            "enum" => match value.as_array() {
                Some(items) => {
                    props.enum_values = Some(
                        items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
                    )
                }
                None => ignored(key, value),
            },
            "minLength" => props.min_length = length(key, value),
            "maxLength" => props.max_length = length(key, value),
            "min" => props.min = bound(key, value),
            "max" => props.max = bound(key, value),
            "regex" => {
                props.regex = value.as_str().and_then(|pattern| match Regex::new(pattern) {
                    Ok(regex) => Some(regex),
                    Err(err) => {
                        warn!(pattern, error = %err, "invalid regex, constraint dropped");
                        None
                    }
                })
            }
            "index" => props.alias_target = value.as_str().map(str::to_string),
            "clip" => props.clip = flag(key, value),
            "unique" => props.unique = flag(key, value),
            "readOnly" => props.read_only = flag(key, value),
            "invisible" => props.invisible = flag(key, value),
            _ => {}
        }
    }
    props
}

fn ignored(key: &str, value: &serde_json::Value) {
    warn!(property = key, value = %value, "ignoring malformed field property");
}

fn length(key: &str, value: &serde_json::Value) -> Option<usize> {
    let len = value.as_u64().map(|n| n as usize);
    if len.is_none() {
        ignored(key, value);
    }
    len
}

fn bound(key: &str, value: &serde_json::Value) -> Option<f64> {
    let n = value.as_f64();
    if n.is_none() {
        ignored(key, value);
    }
    n
}

fn flag(key: &str, value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        other => {
            ignored(key, other);
            false
        }
    }
}
