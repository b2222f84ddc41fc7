//! Shared tabular vocabulary for the datamesh privacy crates.
//!
//! Datasets arrive from an external record store as rows of named scalar
//! fields. This crate fixes that shape ([`Record`], [`Value`]), the identity
//! used to join rows across artifacts ([`EntityId`]), and the validation and
//! failure-reporting types every transformation returns.
//!
//! ```
//! use datamesh_records::{Record, Value};
//!
//! let record: Record = serde_json::from_str(r#"{"id": 1, "zip": "1000", "age": 25}"#).unwrap();
//! assert_eq!(record.get("age"), Some(&Value::Integer(25)));
//! assert_eq!(record.entity_id("id").unwrap().as_str(), "1");
//! ```

pub mod error;
pub mod record;
pub mod value;

pub use error::{ensure_distinct_columns, CellFailure, ErrorMode, FailureLog, ValidationError};
pub use record::{EntityId, Record};
pub use value::{format_number, Value};
