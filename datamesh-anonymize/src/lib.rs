//! Mondrian k-anonymity for tabular datasets.
//!
//! [`Anonymizer`] recursively splits the records over the declared
//! quasi-identifiers until no split leaves both halves with at least `k`
//! members, then rewrites every QI cell of a class with a shared
//! representation: numeric columns become `[min–max]`, categorical columns
//! `{a,b}`. [`QualityEvaluator`] reruns the anonymizer for several `k`
//! values and reports C_AVG for each, and [`Pseudonymizer`] swaps direct
//! identifiers for salted Argon2id hashes before release.
//!
//! ```
//! use datamesh_anonymize::{AnonymizeConfig, Anonymizer, QuasiIdentifier};
//! use datamesh_records::{Record, Value};
//!
//! let records: Vec<Record> = [(23, "10115"), (27, "10115"), (41, "10117"), (45, "10117")]
//!     .iter()
//!     .map(|(age, zip)| Record::new().with("age", *age).with("zip", *zip))
//!     .collect();
//! let qis = [QuasiIdentifier::numeric("age"), QuasiIdentifier::categorical("zip")];
//!
//! let output = Anonymizer::new(AnonymizeConfig::with_k(2))
//!     .anonymize(&records, &qis, None)
//!     .unwrap();
//! assert_eq!(output.records[0].get("age"), Some(&Value::text("[23–27]")));
//! assert_eq!(output.partitioning.normalized_average_class_size(), Some(1.0));
//! ```

pub mod config;
pub mod engine;
pub mod error;
mod generalize;
mod partition;
pub mod pseudonym;
pub mod qi;
pub mod quality;
mod table;

pub use config::{AnonymizeConfig, HashingConfig};
pub use engine::{AnonymizeWarning, AnonymizedDataset, Anonymizer, EquivalenceClass, Partitioning};
pub use error::{AnonymizeError, Result};
pub use pseudonym::{PseudonymizedDataset, Pseudonymizer};
pub use qi::{QiKind, QuasiIdentifier};
pub use quality::{normalized_average_class_size, KSweep, QualityEvaluator, QualityPoint};
