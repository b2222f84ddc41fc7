use std::time::Instant;

use datamesh_records::{
    ensure_distinct_columns, CellFailure, FailureLog, Record, ValidationError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AnonymizeConfig;
use crate::error::{AnonymizeError, Result};
use crate::generalize::generalize;
use crate::partition::Partitioner;
use crate::qi::QuasiIdentifier;
use crate::quality::normalized_average_class_size;
use crate::table::QiTable;

/// Non-fatal conditions the caller must see.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum AnonymizeWarning {
    /// Fewer records than `k`: the single class is under-sized.
    LowCardinality { records: usize, k: usize },
}

/// Members (input row indices, ascending) and the shared QI representation.
#[derive(Clone, Debug, PartialEq)]
pub struct EquivalenceClass {
    pub members: Vec<usize>,
    pub generalized: Record,
}

impl EquivalenceClass {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Outcome of one partitioning run.
#[derive(Clone, Debug, PartialEq)]
pub struct Partitioning {
    pub k: usize,
    /// Records that took part (lenient failures excluded).
    pub total_records: usize,
    pub classes: Vec<EquivalenceClass>,
    pub warnings: Vec<AnonymizeWarning>,
    pub failures: Vec<CellFailure<ValidationError>>,
}

impl Partitioning {
    /// C_AVG; `None` for an empty run.
    pub fn normalized_average_class_size(&self) -> Option<f64> {
        normalized_average_class_size(self.total_records, self.classes.len(), self.k)
    }

    pub fn smallest_class(&self) -> Option<usize> {
        self.classes.iter().map(EquivalenceClass::len).min()
    }

    pub fn is_k_anonymous(&self) -> bool {
        self.classes.iter().all(|class| class.len() >= self.k)
    }
}

/// Generalized records in input order plus the run report.
#[derive(Clone, Debug, PartialEq)]
pub struct AnonymizedDataset {
    pub records: Vec<Record>,
    pub partitioning: Partitioning,
}

/// Mondrian k-anonymizer.
#[derive(Clone, Debug, Default)]
pub struct Anonymizer {
    config: AnonymizeConfig,
}

impl Anonymizer {
    pub fn new(config: AnonymizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnonymizeConfig {
        &self.config
    }

    /// Replaces every QI cell with its class representation. `suppress`
    /// names an identifier column dropped from the output. Failures carry
    /// the entity read from the configured `id_column`, or from `suppress`
    /// when none is configured.
    pub fn anonymize(
        &self,
        records: &[Record],
        qis: &[QuasiIdentifier],
        suppress: Option<&str>,
    ) -> Result<AnonymizedDataset> {
        if let Some(column) = suppress {
            if qis.iter().any(|qi| qi.name == column) {
                return Err(AnonymizeError::Validation(ValidationError::ReservedColumn {
                    column: column.to_string(),
                    reason: "a quasi-identifier cannot be suppressed",
                }));
            }
        }
        let entity_column = self.config.id_column.as_deref().or(suppress);
        let partitioning = self.run(records, qis, entity_column)?;

        let mut rows: Vec<(usize, Record)> = Vec::with_capacity(partitioning.total_records);
        for class in &partitioning.classes {
            for &row in &class.members {
                let mut record = records[row].clone();
                for (column, value) in &class.generalized {
                    record.insert(column.clone(), value.clone());
                }
                if let Some(column) = suppress {
                    record.remove(column);
                }
                rows.push((row, record));
            }
        }
        rows.sort_by_key(|(row, _)| *row);

        Ok(AnonymizedDataset {
            records: rows.into_iter().map(|(_, record)| record).collect(),
            partitioning,
        })
    }

    /// Runs the partitioning alone; the records are not touched.
    pub fn partition(&self, records: &[Record], qis: &[QuasiIdentifier]) -> Result<Partitioning> {
        self.run(records, qis, self.config.id_column.as_deref())
    }

    fn run(
        &self,
        records: &[Record],
        qis: &[QuasiIdentifier],
        entity_column: Option<&str>,
    ) -> Result<Partitioning> {
        let k = self.config.k;
        if k == 0 {
            return Err(AnonymizeError::InvalidK { k });
        }
        ensure_distinct_columns(qis.iter().map(|qi| qi.name.as_str()))?;

        let started = Instant::now();
        let mut failures = FailureLog::new(self.config.error_mode);
        let table = QiTable::extract(records, qis, entity_column, &mut failures)?;
        debug!(rows = table.len(), dropped = failures.len(), "extracted quasi-identifiers");

        let (arena, terminals) = Partitioner::new(&table, k).run(self.config.parallel);
        let classes: Vec<EquivalenceClass> = terminals
            .iter()
            .map(|terminal| {
                let mut members: Vec<usize> = arena[terminal.range.clone()]
                    .iter()
                    .map(|&row| table.source_rows[row])
                    .collect();
                members.sort_unstable();
                EquivalenceClass {
                    members,
                    generalized: generalize(&table, qis, &terminal.bounds),
                }
            })
            .collect();

        let mut warnings = Vec::new();
        if table.len() > 0 && table.len() < k {
            warn!(records = table.len(), k, "fewer records than k; single under-sized class");
            warnings.push(AnonymizeWarning::LowCardinality {
                records: table.len(),
                k,
            });
        }

        let partitioning = Partitioning {
            k,
            total_records: table.len(),
            classes,
            warnings,
            failures: failures.into_failures(),
        };
        info!(
            k,
            records = partitioning.total_records,
            classes = partitioning.classes.len(),
            failures = partitioning.failures.len(),
            c_avg = ?partitioning.normalized_average_class_size(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "anonymization run complete"
        );
        Ok(partitioning)
    }
}

#[cfg(test)]
mod tests {
    use datamesh_records::{ErrorMode, Value};

    use super::*;

    fn people() -> Vec<Record> {
        [(25, "a"), (31, "a"), (47, "b"), (52, "b")]
            .iter()
            .enumerate()
            .map(|(idx, (age, zip))| {
                Record::new()
                    .with("id", idx as i64)
                    .with("age", *age)
                    .with("zip", *zip)
                    .with("diagnosis", "flu")
            })
            .collect()
    }

    fn qis() -> Vec<QuasiIdentifier> {
        vec![
            QuasiIdentifier::numeric("age"),
            QuasiIdentifier::categorical("zip"),
        ]
    }

    #[test]
    fn rejects_zero_k() {
        let err = Anonymizer::new(AnonymizeConfig::with_k(0))
            .partition(&people(), &qis())
            .unwrap_err();
        assert!(matches!(err, AnonymizeError::InvalidK { k: 0 }));
    }

    #[test]
    fn rejects_repeated_quasi_identifiers() {
        let qis = vec![QuasiIdentifier::numeric("age"), QuasiIdentifier::numeric("age")];
        let err = Anonymizer::default().partition(&people(), &qis).unwrap_err();
        assert!(matches!(
            err,
            AnonymizeError::Validation(ValidationError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn rejects_suppressing_a_quasi_identifier() {
        let err = Anonymizer::default()
            .anonymize(&people(), &qis(), Some("zip"))
            .unwrap_err();
        assert!(matches!(
            err,
            AnonymizeError::Validation(ValidationError::ReservedColumn { .. })
        ));
    }

    #[test]
    fn non_qi_columns_pass_through() {
        let output = Anonymizer::default().anonymize(&people(), &qis(), None).unwrap();
        assert_eq!(output.records.len(), 4);
        for (idx, record) in output.records.iter().enumerate() {
            assert_eq!(record.get("id"), Some(&Value::Integer(idx as i64)));
            assert_eq!(record.get("diagnosis"), Some(&Value::text("flu")));
        }
        assert_eq!(output.records[0].get("age"), Some(&Value::text("[25–31]")));
        assert_eq!(output.records[0].get("zip"), Some(&Value::text("a")));
        assert_eq!(output.records[3].get("age"), Some(&Value::text("[47–52]")));
    }

    #[test]
    fn empty_input_has_no_classes() {
        let run = Anonymizer::default().partition(&[], &qis()).unwrap();
        assert!(run.classes.is_empty());
        assert!(run.warnings.is_empty());
        assert_eq!(run.normalized_average_class_size(), None);
    }

    #[test]
    fn lenient_mode_reports_entities_of_dropped_rows() {
        let mut records = people();
        records[2].insert("age", Value::Null);
        let config = AnonymizeConfig {
            error_mode: ErrorMode::Lenient,
            ..AnonymizeConfig::with_k(1)
        };
        let output = Anonymizer::new(config)
            .anonymize(&records, &qis(), Some("id"))
            .unwrap();
        assert_eq!(output.records.len(), 3);
        assert!(output.records.iter().all(|record| !record.contains("id")));
        let failure = &output.partitioning.failures[0];
        assert_eq!(failure.row, 2);
        assert_eq!(failure.entity_id.as_ref().map(|id| id.as_str()), Some("2"));
    }

    #[test]
    fn configured_id_column_labels_failures_without_suppression() {
        let mut records = people();
        records[1].insert("zip", Value::Null);
        let config = AnonymizeConfig {
            error_mode: ErrorMode::Lenient,
            id_column: Some("id".into()),
            ..AnonymizeConfig::with_k(1)
        };
        let anonymizer = Anonymizer::new(config);

        let output = anonymizer.anonymize(&records, &qis(), None).unwrap();
        assert!(output.records.iter().all(|record| record.contains("id")));
        let failure = &output.partitioning.failures[0];
        assert_eq!(failure.row, 1);
        assert_eq!(failure.entity_id.as_ref().map(|id| id.as_str()), Some("1"));

        let run = anonymizer.partition(&records, &qis()).unwrap();
        assert_eq!(run.failures[0].entity_id.as_ref().map(|id| id.as_str()), Some("1"));
    }
}
