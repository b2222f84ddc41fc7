use std::fmt;

use serde::{Deserialize, Serialize};

/// Generalization operator family for a quasi-identifier column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QiKind {
    /// Generalized to an inclusive `[min–max]` range.
    Numeric,
    /// Generalized to the set of values present.
    Categorical,
}

/// A declared quasi-identifier. Declaration order breaks split ties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QuasiIdentifier {
    pub name: String,
    pub kind: QiKind,
}

impl QuasiIdentifier {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: QiKind::Numeric,
        }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: QiKind::Categorical,
        }
    }
}

impl fmt::Display for QuasiIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            QiKind::Numeric => "numeric",
            QiKind::Categorical => "categorical",
        };
        write!(f, "{}({kind})", self.name)
    }
}
