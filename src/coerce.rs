//! The coercion pipeline
//!
//! Every field write runs through [`coerce`]:
//!
//! 1. the descriptor's general `transform`, on the raw value
//! 2. a type-specific step: reject, convert, post-transform, validate
//!
//! The first failing check ends the pipeline with a [`SetterError`]; the
//! caller keeps the prior value. Containers are updated in place: an array
//! write refills the existing [`TypedSequence`] and an object write with a
//! nested schema repopulates the existing nested [`Record`].

use std::rc::Rc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::descriptor::{FieldDescriptor, FieldType, PostTransform};
use crate::error::SetterError;
use crate::record::Record;
use crate::sequence::TypedSequence;
use crate::value::{number_to_string, Value};

/// Epoch numbers with more digits than this are milliseconds, otherwise seconds
const EPOCH_SECONDS_DIGITS: usize = 10;

/// Largest representable time value, in milliseconds either side of the epoch
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

/// Coerce `value` for a field currently holding `prior`
pub fn coerce(
    value: Value,
    prior: &Value,
    descriptor: &Rc<FieldDescriptor>,
) -> Result<Value, SetterError> {
    coerce_in(value, prior, descriptor, None)
}

/// As [`coerce`], with the record that owns any sequence created on the way
pub(crate) fn coerce_in(
    value: Value,
    prior: &Value,
    descriptor: &Rc<FieldDescriptor>,
    owner: Option<&Record>,
) -> Result<Value, SetterError> {
    let value = match &descriptor.transform {
        Some(transform) => transform(value, prior, descriptor),
        None => value,
    };

    match descriptor.field_type {
        FieldType::String => coerce_string(value, prior, descriptor),
        FieldType::Number => coerce_number(value, prior, descriptor),
        FieldType::Boolean => Ok(coerce_boolean(value, prior, descriptor)),
        FieldType::Array => coerce_array(value, prior, descriptor, owner),
        FieldType::Object => coerce_object(value, prior, descriptor),
        FieldType::Date => coerce_date(value, prior, descriptor),
        FieldType::Alias | FieldType::Any => Ok(value),
    }
}

fn coerce_string(
    value: Value,
    prior: &Value,
    descriptor: &Rc<FieldDescriptor>,
) -> Result<Value, SetterError> {
    if value.is_nullish() {
        return Ok(value);
    }

    let Some(mut text) = value.scalar_text() else {
        return Err(SetterError::type_mismatch(
            format!("string field cannot hold a {} value", value.type_name()),
            value,
            prior,
            descriptor,
        ));
    };

    if let Some(PostTransform::String(transform)) = &descriptor.post_transform {
        text = transform(text, prior, descriptor);
    }

    if descriptor.clip {
        if let Some(max) = descriptor.max_length {
            if let Some((cut, _)) = text.char_indices().nth(max) {
                text.truncate(cut);
            }
        }
    }

    if let Some(allowed) = &descriptor.enum_values {
        if !allowed.iter().any(|a| *a == text) {
            return Err(SetterError::constraint(
                "string is not in the enum list",
                Value::String(text),
                prior,
                descriptor,
            ));
        }
    }

    let len = text.chars().count();
    if let Some(min) = descriptor.min_length {
        if len < min {
            return Err(SetterError::constraint(
                format!("string is shorter than minLength {min}"),
                Value::String(text),
                prior,
                descriptor,
            ));
        }
    }

    if let Some(max) = descriptor.max_length {
        if len > max {
            return Err(SetterError::constraint(
                format!("string is longer than maxLength {max}"),
                Value::String(text),
                prior,
                descriptor,
            ));
        }
    }

    if let Some(regex) = &descriptor.regex {
        if !regex.is_match(&text) {
            return Err(SetterError::constraint(
                format!("string does not match pattern {}", regex.as_str()),
                Value::String(text),
                prior,
                descriptor,
            ));
        }
    }

    Ok(Value::String(text))
}

fn coerce_number(
    value: Value,
    prior: &Value,
    descriptor: &Rc<FieldDescriptor>,
) -> Result<Value, SetterError> {
    let value = match value {
        Value::Bool(b) => Value::Number(if b { 1.0 } else { 0.0 }),
        other => other,
    };

    let Some(mut n) = value.numeric() else {
        return Err(SetterError::type_mismatch(
            format!("number field cannot hold a non-numeric {} value", value.type_name()),
            value,
            prior,
            descriptor,
        ));
    };

    if let Some(PostTransform::Number(transform)) = &descriptor.post_transform {
        n = transform(n, prior, descriptor);
    }

    if let Some(min) = descriptor.min {
        if n < min {
            return Err(SetterError::constraint(
                format!("number is below min {}", number_to_string(min)),
                Value::Number(n),
                prior,
                descriptor,
            ));
        }
    }

    if let Some(max) = descriptor.max {
        if n > max {
            return Err(SetterError::constraint(
                format!("number is above max {}", number_to_string(max)),
                Value::Number(n),
                prior,
                descriptor,
            ));
        }
    }

    Ok(Value::Number(n))
}

fn coerce_boolean(value: Value, prior: &Value, descriptor: &Rc<FieldDescriptor>) -> Value {
    if value.as_str() == Some("false") {
        return Value::Bool(false);
    }

    if let Some(n) = value.numeric() {
        return Value::Bool(n > 0.0);
    }

    let mut b = value.is_truthy();
    if let Some(PostTransform::Boolean(transform)) = &descriptor.post_transform {
        b = transform(b, prior, descriptor);
    }
    Value::Bool(b)
}

fn coerce_array(
    value: Value,
    prior: &Value,
    descriptor: &Rc<FieldDescriptor>,
    owner: Option<&Record>,
) -> Result<Value, SetterError> {
    // Materialize before touching the destination; the source may be the destination
    let Some(items) = value.elements() else {
        return Err(SetterError::type_mismatch(
            format!("array field cannot hold a {} value", value.type_name()),
            value,
            prior,
            descriptor,
        ));
    };

    let sequence = match prior {
        Value::Sequence(existing) => existing.clone(),
        _ => match owner {
            Some(record) => TypedSequence::owned(descriptor.clone(), record.downgrade()),
            None => TypedSequence::detached(descriptor.clone()),
        },
    };

    sequence.replace(items);
    Ok(Value::Sequence(sequence))
}

fn coerce_object(
    value: Value,
    prior: &Value,
    descriptor: &Rc<FieldDescriptor>,
) -> Result<Value, SetterError> {
    if !value.is_structural() && !matches!(value, Value::Date(_)) {
        return Err(SetterError::type_mismatch(
            format!("object field cannot hold a {} value", value.type_name()),
            value,
            prior,
            descriptor,
        ));
    }

    // Untyped objects hold a plain copy, never another record's live container
    let Some(schema) = &descriptor.nested else {
        return Ok(value.to_plain());
    };

    let entries = value.entries().unwrap_or_default();
    let record = match prior {
        Value::Record(existing) => {
            existing.clear();
            existing.clone()
        }
        _ => schema.create(),
    };

    for (key, field_value) in entries {
        record.set(&key, field_value);
    }
    Ok(Value::Record(record))
}

fn coerce_date(
    value: Value,
    prior: &Value,
    descriptor: &Rc<FieldDescriptor>,
) -> Result<Value, SetterError> {
    if !matches!(value, Value::Date(_) | Value::String(_) | Value::Number(_)) {
        return Err(SetterError::type_mismatch(
            format!("date field cannot hold a {} value", value.type_name()),
            value,
            prior,
            descriptor,
        ));
    }

    let parsed = match &value {
        Value::Date(date) => Some(*date),
        Value::String(text) => parse_date(text),
        Value::Number(n) => date_from_epoch(*n),
        _ => None,
    };

    let Some(mut date) = parsed else {
        return Err(SetterError::parse("could not parse date", value, prior, descriptor));
    };

    if let Some(PostTransform::Date(transform)) = &descriptor.post_transform {
        date = transform(date, prior, descriptor);
    }
    Ok(Value::Date(date))
}

/// Calendar date parsing; zone-less inputs are taken as UTC
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(text) {
        return Some(date.with_timezone(&Utc));
    }

    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NAIVE_DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Interpret an epoch number: milliseconds past ten digits, seconds otherwise
pub fn date_from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() {
        return None;
    }

    let digits = number_to_string(n).chars().filter(char::is_ascii_digit).count();
    let millis = (if digits > EPOCH_SECONDS_DIGITS { n } else { n * 1000.0 }).trunc();
    if millis.abs() > MAX_EPOCH_MILLIS {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}
