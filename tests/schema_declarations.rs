//! Declaration Tests
//!
//! Tests that every shorthand declaration form compiles to the expected
//! canonical descriptor, and that a fixture record casts end to end.

use familiar_records::{
    normalize, DefaultValue, FieldType, Schema, SchemaError, Value,
};
use serde_json::json;

fn profile_schema() -> Schema {
    Schema::from_json_str(include_str!("fixtures/profile.schema.json")).unwrap()
}

fn profile_input() -> serde_json::Value {
    serde_json::from_str(include_str!("fixtures/profile.input.json")).unwrap()
}

// =============================================================================
// Normalization Tests
// =============================================================================

#[test]
fn test_bare_type_names() {
    let schema = profile_schema();
    let name = schema.descriptor("name").unwrap();
    assert_eq!(name.field_type, FieldType::String);
    assert_eq!(name.name.as_deref(), Some("name"));
    assert_eq!(schema.descriptor("joined").unwrap().field_type, FieldType::Date);
}

#[test]
fn test_declared_objects_keep_properties() {
    let schema = profile_schema();

    let age = schema.descriptor("age").unwrap();
    assert_eq!(age.field_type, FieldType::Number);
    assert_eq!(age.min, Some(0.0));
    assert_eq!(age.max, Some(150.0));

    let status = schema.descriptor("status").unwrap();
    assert_eq!(
        status.enum_values,
        Some(vec!["active".to_string(), "inactive".to_string()])
    );
    assert!(matches!(
        &status.default,
        Some(DefaultValue::Literal(v)) if *v == Value::from("active")
    ));

    let code = schema.descriptor("code").unwrap();
    assert!(code.clip);
    assert_eq!(code.max_length, Some(3));

    assert!(schema.descriptor("slug").unwrap().regex.is_some());
}

#[test]
fn test_sequence_shorthands() {
    let schema = profile_schema();

    let tags = schema.descriptor("tags").unwrap();
    assert_eq!(tags.field_type, FieldType::Array);
    assert_eq!(tags.element.as_ref().unwrap().field_type, FieldType::String);

    let misc = schema.descriptor("misc").unwrap();
    assert_eq!(misc.field_type, FieldType::Array);
    assert!(misc.element.is_none());

    let labels = schema.descriptor("labels").unwrap();
    assert_eq!(labels.field_type, FieldType::Array);
    assert!(labels.unique);
    assert_eq!(labels.element.as_ref().unwrap().field_type, FieldType::String);
}

#[test]
fn test_nested_schema_maps() {
    let schema = profile_schema();

    let address = schema.descriptor("address").unwrap();
    assert_eq!(address.field_type, FieldType::Object);
    let nested = address.nested.as_ref().unwrap();
    assert_eq!(nested.field_names(), vec!["city", "geo"]);
    assert_eq!(nested.descriptor("geo").unwrap().field_type, FieldType::Object);

    let meta = schema.descriptor("meta").unwrap();
    assert_eq!(meta.field_type, FieldType::Object);
    assert!(meta.nested.is_none());
}

#[test]
fn test_permissive_fallbacks() {
    let schema = profile_schema();
    assert_eq!(schema.descriptor("anything").unwrap().field_type, FieldType::Any);
    assert_eq!(schema.descriptor("weird").unwrap().field_type, FieldType::Any);

    let nickname = schema.descriptor("nickname").unwrap();
    assert_eq!(nickname.field_type, FieldType::Alias);
    assert_eq!(nickname.alias_target.as_deref(), Some("name"));
}

#[test]
fn test_normalizing_canonical_descriptor_is_noop() {
    let schema = profile_schema();
    let age = (*schema.descriptor("age").unwrap()).clone();

    let again = normalize(age, Some("age"));
    assert_eq!(again.field_type, FieldType::Number);
    assert_eq!(again.min, Some(0.0));
    assert_eq!(again.max, Some(150.0));
    assert_eq!(again.name.as_deref(), Some("age"));
}

#[test]
fn test_invalid_regex_is_dropped() {
    let schema = Schema::from_json(&json!({"code": {"type": "string", "regex": "("}})).unwrap();
    let code = schema.descriptor("code").unwrap();
    assert_eq!(code.field_type, FieldType::String);
    assert!(code.regex.is_none());
}

#[test]
fn test_non_object_declaration_is_rejected() {
    match Schema::from_json(&json!(["string"])) {
        Err(SchemaError::InvalidDeclaration(message)) => assert!(message.contains("array")),
        other => panic!("Expected InvalidDeclaration, got {:?}", other),
    }

    assert!(matches!(
        Schema::from_json_str("{ not json"),
        Err(SchemaError::Json(_))
    ));
}

// =============================================================================
// End-to-end Casting Tests
// =============================================================================

#[test]
fn test_fixture_record_casts_cleanly() {
    let record = profile_schema().create_with(profile_input());
    assert!(!record.has_errors(), "unexpected errors: {:?}", record.errors());

    assert_eq!(
        record.to_json(),
        json!({
            "name": "Ada Lovelace",
            "nickname": "Ada Lovelace",
            "age": 36,
            "tags": ["math", "1843", "true"],
            "misc": [],
            "status": "active",
            "code": "ABC",
            "slug": "ada-lovelace",
            "address": { "city": "London", "geo": { "lat": 51.5, "lng": -0.12 } },
            "labels": ["analyst", "writer"],
            "joined": "1833-06-05T00:00:00.000Z",
            "meta": { "source": "import" }
        })
    );
}

#[test]
fn test_fixture_constraints_reject() {
    let record = profile_schema().create();
    record.set("slug", "Not A Slug");
    record.set("status", "archived");
    record.set("age", 200);
    record.set("joined", "someday");

    let kinds: Vec<_> = record.errors().iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["constraint_violation", "constraint_violation", "constraint_violation", "parse_error"]
    );
    assert_eq!(record.get("slug"), Value::Undefined);
    assert_eq!(record.get("status"), Value::from("active"));
    assert_eq!(record.get("age"), Value::Undefined);
}
