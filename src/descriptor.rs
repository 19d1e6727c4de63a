//! Canonical field descriptors
//!
//! A [`FieldDescriptor`] is the compiled rule set for one schema field: its
//! [`FieldType`], constraints, transforms and flags. Descriptors are built
//! once per schema and shared read-only by every record of that schema.

use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::normalize::{normalize, RawField};
use crate::schema::Schema;
use crate::value::Value;

/// General transform, applied to the raw value before type enforcement
pub type Transform = Rc<dyn Fn(Value, &Value, &FieldDescriptor) -> Value>;

pub type StringTransform = Rc<dyn Fn(String, &Value, &FieldDescriptor) -> String>;
pub type NumberTransform = Rc<dyn Fn(f64, &Value, &FieldDescriptor) -> f64>;
pub type BooleanTransform = Rc<dyn Fn(bool, &Value, &FieldDescriptor) -> bool>;
pub type DateTransform = Rc<dyn Fn(DateTime<Utc>, &Value, &FieldDescriptor) -> DateTime<Utc>>;

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
    /// Delegates to another field's storage and descriptor
    Alias,
    /// Accepts any value unchanged
    #[default]
    Any,
}

impl FieldType {
    /// Resolve a type name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "date" => Some(FieldType::Date),
            "array" => Some(FieldType::Array),
            "object" => Some(FieldType::Object),
            "alias" => Some(FieldType::Alias),
            "any" => Some(FieldType::Any),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Alias => "alias",
            FieldType::Any => "any",
        }
    }

    /// Types whose storage is allocated when a record is built
    pub fn is_structural(&self) -> bool {
        matches!(self, FieldType::Array | FieldType::Object)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value substituted when an unset field is read
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Producer(Rc<dyn Fn() -> Value>),
}

impl DefaultValue {
    /// Produce the raw default; producers run on every call
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Producer(produce) => produce(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Post-coercion transform; only the variant matching the field type runs
#[derive(Clone)]
pub enum PostTransform {
    String(StringTransform),
    Number(NumberTransform),
    Boolean(BooleanTransform),
    Date(DateTransform),
}

/// Canonical shape of one schema field
#[derive(Clone, Default)]
pub struct FieldDescriptor {
    /// Diagnostic label; set to the field name during normalization
    pub name: Option<String>,
    pub field_type: FieldType,
    pub default: Option<DefaultValue>,
    pub transform: Option<Transform>,
    pub post_transform: Option<PostTransform>,

    // String constraints
    pub enum_values: Option<Vec<String>>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Truncate to `max_length` instead of rejecting
    pub clip: bool,
    pub regex: Option<Regex>,

    // Number constraints
    pub min: Option<f64>,
    pub max: Option<f64>,

    /// Element rules for array fields; `None` means an untyped sequence
    pub element: Option<Rc<FieldDescriptor>>,
    /// Compiled sub-schema for object fields
    pub nested: Option<Schema>,
    /// Field an alias delegates to
    pub alias_target: Option<String>,

    pub unique: bool,
    pub read_only: bool,
    /// Left out of exports
    pub invisible: bool,
}

impl FieldDescriptor {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn any() -> Self {
        Self::new(FieldType::Any)
    }

    /// Untyped sequence
    pub fn array() -> Self {
        Self::new(FieldType::Array)
    }

    /// Sequence whose elements are coerced against `element`
    pub fn array_of(element: impl Into<RawField>) -> Self {
        Self {
            element: Some(Rc::new(normalize(element, None))),
            ..Self::new(FieldType::Array)
        }
    }

    /// Object field that accepts any structural value as-is
    pub fn object() -> Self {
        Self::new(FieldType::Object)
    }

    /// Object field backed by a nested record
    pub fn nested(schema: Schema) -> Self {
        Self {
            nested: Some(schema),
            ..Self::new(FieldType::Object)
        }
    }

    pub fn alias(target: impl Into<String>) -> Self {
        Self {
            alias_target: Some(target.into()),
            ..Self::new(FieldType::Alias)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_with(mut self, produce: impl Fn() -> Value + 'static) -> Self {
        self.default = Some(DefaultValue::Producer(Rc::new(produce)));
        self
    }

    pub fn transform(
        mut self,
        f: impl Fn(Value, &Value, &FieldDescriptor) -> Value + 'static,
    ) -> Self {
        self.transform = Some(Rc::new(f));
        self
    }

    pub fn string_transform(
        mut self,
        f: impl Fn(String, &Value, &FieldDescriptor) -> String + 'static,
    ) -> Self {
        self.post_transform = Some(PostTransform::String(Rc::new(f)));
        self
    }

    pub fn number_transform(
        mut self,
        f: impl Fn(f64, &Value, &FieldDescriptor) -> f64 + 'static,
    ) -> Self {
        self.post_transform = Some(PostTransform::Number(Rc::new(f)));
        self
    }

    pub fn boolean_transform(
        mut self,
        f: impl Fn(bool, &Value, &FieldDescriptor) -> bool + 'static,
    ) -> Self {
        self.post_transform = Some(PostTransform::Boolean(Rc::new(f)));
        self
    }

    pub fn date_transform(
        mut self,
        f: impl Fn(DateTime<Utc>, &Value, &FieldDescriptor) -> DateTime<Utc> + 'static,
    ) -> Self {
        self.post_transform = Some(PostTransform::Date(Rc::new(f)));
        self
    }

    /// Restrict a string field to an enumeration
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn clip(mut self) -> Self {
        self.clip = true;
        self
    }

    pub fn pattern(mut self, regex: Regex) -> Self {
        self.regex = Some(regex);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn invisible(mut self) -> Self {
        self.invisible = true;
        self
    }

    /// Name used in logs and error reports
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Fill every unset property from `other`; flags are merged.
    ///
    /// The type is left alone.
    pub(crate) fn inherit(&mut self, other: &FieldDescriptor) {
        fn fill<T: Clone>(slot: &mut Option<T>, from: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(from);
            }
        }

        fill(&mut self.name, &other.name);
        fill(&mut self.default, &other.default);
        fill(&mut self.transform, &other.transform);
        fill(&mut self.post_transform, &other.post_transform);
        fill(&mut self.enum_values, &other.enum_values);
        fill(&mut self.min_length, &other.min_length);
        fill(&mut self.max_length, &other.max_length);
        fill(&mut self.regex, &other.regex);
        fill(&mut self.min, &other.min);
        fill(&mut self.max, &other.max);
        fill(&mut self.element, &other.element);
        fill(&mut self.nested, &other.nested);
        fill(&mut self.alias_target, &other.alias_target);
        self.clip |= other.clip;
        self.unique |= other.unique;
        self.read_only |= other.read_only;
        self.invisible |= other.invisible;
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("default", &self.default)
            .field("transform", &self.transform.is_some())
            .field("post_transform", &self.post_transform.is_some())
            .field("enum_values", &self.enum_values)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("clip", &self.clip)
            .field("regex", &self.regex.as_ref().map(Regex::as_str))
            .field("min", &self.min)
            .field("max", &self.max)
            .field("element", &self.element)
            .field("nested", &self.nested.as_ref().map(Schema::field_names))
            .field("alias_target", &self.alias_target)
            .field("unique", &self.unique)
            .field("read_only", &self.read_only)
            .field("invisible", &self.invisible)
            .finish()
    }
}
