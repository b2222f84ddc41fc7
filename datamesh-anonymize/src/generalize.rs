use datamesh_records::{format_number, Record, Value};

use crate::partition::Bound;
use crate::qi::QuasiIdentifier;
use crate::table::{QiColumn, QiTable};

/// Shared representation of every QI column for one equivalence class.
pub(crate) fn generalize(table: &QiTable, qis: &[QuasiIdentifier], bounds: &[Bound]) -> Record {
    qis.iter()
        .zip(table.columns.iter().zip(bounds))
        .map(|(qi, (column, bound))| (qi.name.clone(), represent(column, bound)))
        .collect()
}

fn represent(column: &QiColumn, bound: &Bound) -> Value {
    match (column, bound) {
        (_, Bound::Numeric { min, max }) if min == max => number(*min),
        (_, Bound::Numeric { min, max }) => Value::Text(format!(
            "[{}\u{2013}{}]",
            format_number(*min),
            format_number(*max)
        )),
        (QiColumn::Categorical { samples, .. }, Bound::Categorical(codes)) if codes.len() == 1 => {
            samples[codes[0]].clone()
        }
        (QiColumn::Categorical { labels, .. }, Bound::Categorical(codes)) => {
            let members: Vec<&str> = codes.iter().map(|&code| labels[code].as_str()).collect();
            Value::Text(format!("{{{}}}", members.join(",")))
        }
        (QiColumn::Numeric(_), Bound::Categorical(_)) => Value::Null,
    }
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Value::Integer(value as i64)
    } else {
        Value::Float(value)
    }
}
