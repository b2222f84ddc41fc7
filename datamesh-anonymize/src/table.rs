//! Column-major copy of the quasi-identifier cells the partitioner works on.

use std::collections::BTreeMap;

use datamesh_records::{CellFailure, EntityId, FailureLog, Record, ValidationError, Value};
use tracing::warn;

use crate::qi::{QiKind, QuasiIdentifier};

#[derive(Clone, Debug)]
pub(crate) enum QiColumn {
    Numeric(Vec<f64>),
    /// `codes[i]` ranks row `i`'s value among `labels`, which are sorted.
    Categorical {
        codes: Vec<usize>,
        labels: Vec<String>,
        samples: Vec<Value>,
    },
}

impl QiColumn {
    /// Dataset-wide spread used to normalize partition spreads.
    pub(crate) fn global_width(&self) -> f64 {
        match self {
            QiColumn::Numeric(values) => {
                let (min, max) = min_max(values.iter().copied());
                max - min
            }
            QiColumn::Categorical { labels, .. } => labels.len() as f64,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct QiTable {
    /// Input row index for each table row.
    pub(crate) source_rows: Vec<usize>,
    pub(crate) columns: Vec<QiColumn>,
}

impl QiTable {
    /// Reads every declared QI cell. Rows with a missing, null or
    /// non-numeric cell go through `failures`.
    pub(crate) fn extract(
        records: &[Record],
        qis: &[QuasiIdentifier],
        entity_column: Option<&str>,
        failures: &mut FailureLog<ValidationError>,
    ) -> Result<Self, CellFailure<ValidationError>> {
        let mut source_rows = Vec::with_capacity(records.len());
        let mut numeric: Vec<Vec<f64>> = vec![Vec::new(); qis.len()];
        let mut categorical: Vec<Vec<Value>> = vec![Vec::new(); qis.len()];

        'rows: for (row, record) in records.iter().enumerate() {
            let mut cells = Vec::with_capacity(qis.len());
            for qi in qis {
                match read_cell(record, qi) {
                    Ok(cell) => cells.push(cell),
                    Err(error) => {
                        let entity = entity_column.and_then(|column| entity_of(record, column));
                        warn!(row, column = %qi.name, %error, "skipping quasi-identifier row");
                        failures.record(
                            CellFailure::row(row, error)
                                .entity(entity)
                                .column(qi.name.clone()),
                        )?;
                        continue 'rows;
                    }
                }
            }
            source_rows.push(row);
            for (idx, cell) in cells.into_iter().enumerate() {
                match cell {
                    Cell::Number(value) => numeric[idx].push(value),
                    Cell::Category(value) => categorical[idx].push(value),
                }
            }
        }

        let columns = qis
            .iter()
            .zip(numeric.into_iter().zip(categorical))
            .map(|(qi, (numbers, values))| match qi.kind {
                QiKind::Numeric => QiColumn::Numeric(numbers),
                QiKind::Categorical => encode_categories(values),
            })
            .collect();

        Ok(Self {
            source_rows,
            columns,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.source_rows.len()
    }
}

enum Cell {
    Number(f64),
    Category(Value),
}

fn read_cell(record: &Record, qi: &QuasiIdentifier) -> Result<Cell, ValidationError> {
    let value = record.require(&qi.name)?;
    if value.is_null() {
        return Err(ValidationError::NullValue {
            column: qi.name.clone(),
        });
    }
    match qi.kind {
        QiKind::Numeric => value
            .as_number()
            .map(Cell::Number)
            .ok_or_else(|| ValidationError::NotNumeric {
                column: qi.name.clone(),
                value: value.to_string(),
            }),
        QiKind::Categorical => Ok(Cell::Category(value.clone())),
    }
}

fn entity_of(record: &Record, column: &str) -> Option<EntityId> {
    record.entity_id(column).ok()
}

/// Ranks categories by their canonical text; the first value seen for a
/// label is kept as its sample.
fn encode_categories(values: Vec<Value>) -> QiColumn {
    let mut ranks: BTreeMap<String, Option<Value>> = BTreeMap::new();
    let texts: Vec<String> = values.iter().map(Value::to_string).collect();
    for (text, value) in texts.iter().zip(values) {
        ranks.entry(text.clone()).or_insert(Some(value));
    }
    let labels: Vec<String> = ranks.keys().cloned().collect();
    let samples = ranks.into_values().flatten().collect();
    let codes = texts
        .iter()
        .map(|text| labels.binary_search(text).unwrap_or_default())
        .collect();
    QiColumn::Categorical {
        codes,
        labels,
        samples,
    }
}

pub(crate) fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
        (min.min(value), max.max(value))
    })
}
