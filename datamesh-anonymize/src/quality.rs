//! Normalized average equivalence class size and the k sweep built on it.

use std::collections::BTreeMap;
use std::iter::FusedIterator;

use datamesh_records::Record;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AnonymizeConfig;
use crate::engine::Anonymizer;
use crate::error::Result;
use crate::qi::QuasiIdentifier;

/// C_AVG = total / (classes × k). 1.0 means every class has exactly k
/// members. Undefined when nothing was partitioned.
pub fn normalized_average_class_size(
    total_records: usize,
    classes: usize,
    k: usize,
) -> Option<f64> {
    if total_records == 0 || classes == 0 || k == 0 {
        return None;
    }
    Some(total_records as f64 / (classes as f64 * k as f64))
}

/// One k of a sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QualityPoint {
    pub k: usize,
    pub c_avg: Option<f64>,
    pub classes: usize,
    /// The run produced a class smaller than k.
    pub low_cardinality: bool,
}

/// Runs an independent anonymization per k over the same unmodified records.
#[derive(Clone, Debug, Default)]
pub struct QualityEvaluator {
    config: AnonymizeConfig,
}

impl QualityEvaluator {
    /// `config.k` is ignored; every sweep point sets its own.
    pub fn new(config: AnonymizeConfig) -> Self {
        Self { config }
    }

    /// Lazy sweep; nothing runs until the iterator is polled. Clone it (or
    /// call [`KSweep::restart`]) to run the sweep again.
    pub fn sweep_k<'a>(
        &'a self,
        records: &'a [Record],
        qis: &'a [QuasiIdentifier],
        k_values: &[usize],
    ) -> KSweep<'a> {
        KSweep {
            config: &self.config,
            records,
            qis,
            k_values: k_values.to_vec(),
            next: 0,
        }
    }

    /// Eager sweep keyed by k. Runs with no defined C_AVG are left out.
    pub fn sweep(
        &self,
        records: &[Record],
        qis: &[QuasiIdentifier],
        k_values: &[usize],
    ) -> Result<BTreeMap<usize, f64>> {
        let mut metrics = BTreeMap::new();
        for point in self.sweep_k(records, qis, k_values) {
            let point = point?;
            if let Some(c_avg) = point.c_avg {
                metrics.insert(point.k, c_avg);
            }
        }
        Ok(metrics)
    }
}

#[derive(Clone, Debug)]
pub struct KSweep<'a> {
    config: &'a AnonymizeConfig,
    records: &'a [Record],
    qis: &'a [QuasiIdentifier],
    k_values: Vec<usize>,
    next: usize,
}

impl KSweep<'_> {
    pub fn restart(&mut self) {
        self.next = 0;
    }

    pub fn k_values(&self) -> &[usize] {
        &self.k_values
    }
}

impl Iterator for KSweep<'_> {
    type Item = Result<QualityPoint>;

    fn next(&mut self) -> Option<Self::Item> {
        let k = *self.k_values.get(self.next)?;
        self.next += 1;

        let config = AnonymizeConfig {
            k,
            ..self.config.clone()
        };
        let point = Anonymizer::new(config)
            .partition(self.records, self.qis)
            .map(|run| QualityPoint {
                k,
                c_avg: run.normalized_average_class_size(),
                classes: run.classes.len(),
                low_cardinality: !run.warnings.is_empty(),
            });
        if let Ok(point) = &point {
            info!(k, c_avg = ?point.c_avg, classes = point.classes, "sweep point");
        }
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.k_values.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for KSweep<'_> {}

impl FusedIterator for KSweep<'_> {}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn c_avg_formula() {
        assert_relative_eq!(normalized_average_class_size(100, 10, 10).unwrap(), 1.0);
        assert_relative_eq!(normalized_average_class_size(100, 4, 20).unwrap(), 1.25);
        assert_eq!(normalized_average_class_size(0, 0, 5), None);
    }

    #[test]
    fn sweep_is_lazy_and_restartable() {
        let records: Vec<Record> = (0..12).map(|idx| Record::new().with("age", idx)).collect();
        let qis = [QuasiIdentifier::numeric("age")];
        let evaluator = QualityEvaluator::default();

        let mut sweep = evaluator.sweep_k(&records, &qis, &[2, 3]);
        assert_eq!(sweep.len(), 2);
        let first: Vec<QualityPoint> = sweep.by_ref().map(|point| point.unwrap()).collect();
        assert!(sweep.next().is_none());

        sweep.restart();
        let again: Vec<QualityPoint> = sweep.map(|point| point.unwrap()).collect();
        assert_eq!(first, again);
        assert_eq!(first[0].k, 2);
        assert_eq!(first[1].k, 3);
    }
}
