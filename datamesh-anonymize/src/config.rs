use datamesh_records::ErrorMode;
use serde::{Deserialize, Serialize};

const fn default_k() -> usize {
    2
}

/// Anonymization section.
///
/// # TOML
/// ```text
/// [anonymize]
/// k = 10
/// error-mode = "strict"
/// parallel = true
/// id-column = "id"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnonymizeConfig {
    /// Minimum equivalence class size.
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub error_mode: ErrorMode,
    /// Process sibling partitions on the rayon pool.
    #[serde(default)]
    pub parallel: bool,
    /// Column whose value labels dropped rows in the failure list. The
    /// suppressed column is used when unset.
    #[serde(default)]
    pub id_column: Option<String>,
}

impl Default for AnonymizeConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            error_mode: ErrorMode::default(),
            parallel: false,
            id_column: None,
        }
    }
}

impl AnonymizeConfig {
    pub fn with_k(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }
}

const fn default_time_cost() -> u32 {
    3
}

const fn default_memory_cost_kib() -> u32 {
    102_400
}

const fn default_parallelism() -> u32 {
    2
}

fn default_suffix() -> String {
    "_hashed".into()
}

/// Argon2id cost parameters for column pseudonymization.
///
/// # YAML
/// ```text
/// hashing:
///   time-cost: 3
///   memory-cost-kib: 102400
///   parallelism: 2
///   suffix: _hashed
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HashingConfig {
    /// Argon2 iterations.
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,
    /// Argon2 memory in KiB.
    #[serde(default = "default_memory_cost_kib")]
    pub memory_cost_kib: u32,
    /// Argon2 lanes.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    /// Appended to a column name to form its hashed column.
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default)]
    pub error_mode: ErrorMode,
    /// Hash rows on the rayon pool.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            time_cost: default_time_cost(),
            memory_cost_kib: default_memory_cost_kib(),
            parallelism: default_parallelism(),
            suffix: default_suffix(),
            error_mode: ErrorMode::default(),
            parallel: false,
        }
    }
}
