//! Familiar Records
//!
//! Schema-driven typecasting for loosely-typed data. A schema declares the
//! semantic type of each field; a [`Record`] built from it coerces every
//! write to that type, validates constraints, and records failures instead
//! of aborting the caller.
//!
//! ## Features
//!
//! - **Shorthand declarations**: bare type names, `{type, ...}` objects,
//!   `[Element]` sequences and nested schema maps all normalize to one
//!   canonical [`FieldDescriptor`]
//! - **Deterministic coercion**: string, number, boolean, date, array and
//!   object fields each follow a fixed transform → convert → validate order
//! - **Stable containers**: array and object fields are allocated up front
//!   and updated in place, so handles stay valid
//! - **Aliases**: fields that share another field's storage and rules
//! - **Strict or lenient**: undeclared writes are dropped, or admitted as
//!   `any` fields
//!
//! ## Flow
//!
//! ```text
//! record.set(name, value)
//!   ├── undeclared? ── strict ──> dropped
//!   │                └ lenient ─> schema gains an `any` field
//!   ├── binding (alias → target storage + descriptor)
//!   ├── read-only? ──> dropped
//!   └── coerce(value, prior, descriptor)
//!         ├── Ok(v)  ──> stored
//!         └── Err(e) ──> record.errors()
//! ```
//!
//! ## Example
//!
//! ```
//! use familiar_records::{ErrorKind, FieldDescriptor, Schema, Value};
//!
//! let schema = Schema::builder()
//!     .field("name", "string")
//!     .field("age", FieldDescriptor::number().min(0.0))
//!     .build();
//!
//! let person = schema.create();
//! person.set("age", "42");
//! person.set("age", -5);
//!
//! assert_eq!(person.get("age"), Value::from(42));
//! assert_eq!(person.errors()[0].kind, ErrorKind::ConstraintViolation);
//! ```

mod binding;
pub mod coerce;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod normalize;
pub mod record;
pub mod schema;
pub mod sequence;
pub mod value;

pub use coerce::coerce;
pub use config::RecordsConfig;
pub use descriptor::{DefaultValue, FieldDescriptor, FieldType, PostTransform, Transform};
pub use error::{ErrorKind, ErrorSink, Result, SchemaError, SetterError};
pub use normalize::{normalize, RawField};
pub use record::Record;
pub use schema::{Schema, SchemaBuilder, SchemaOptions};
pub use sequence::TypedSequence;
pub use value::{Map, Value};
