use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use datamesh_anonymize::{AnonymizeConfig, HashingConfig, QuasiIdentifier};
use datamesh_cellcrypt::CellCryptConfig;
use datamesh_records::{ensure_distinct_columns, ErrorMode};
use serde::Deserialize;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConfigFormat {
    Auto,
    Toml,
    Yaml,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format:?} config: {details}")]
    Parse {
        format: ConfigFormat,
        details: String,
    },
    #[error("configuration invalid: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetSection,
    #[serde(default)]
    pub cellcrypt: CellCryptConfig,
    #[serde(default)]
    pub anonymize: AnonymizeConfig,
    #[serde(default)]
    pub sweep: SweepSection,
    #[serde(default)]
    pub hashing: HashingConfig,
}

/// Column roles for the dataset the commands operate on. Command-line
/// flags override these.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DatasetSection {
    #[serde(default)]
    pub id_column: Option<String>,
    #[serde(default)]
    pub encrypt_columns: Vec<String>,
    #[serde(default)]
    pub hash_columns: Vec<String>,
    #[serde(default)]
    pub quasi_identifiers: Vec<QuasiIdentifier>,
    /// Identifier dropped from anonymized output.
    #[serde(default)]
    pub suppress: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SweepSection {
    #[serde(default = "default_k_values")]
    pub k_values: Vec<usize>,
}

fn default_k_values() -> Vec<usize> {
    vec![2, 10, 20, 40, 60, 80, 100]
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            k_values: default_k_values(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.anonymize.k == 0 {
            return Err(ConfigError::Validation(
                "anonymize k must be greater than zero".into(),
            ));
        }
        if self.sweep.k_values.iter().any(|&k| k == 0) {
            return Err(ConfigError::Validation(
                "sweep k-values must all be greater than zero".into(),
            ));
        }
        if self.hashing.suffix.is_empty() {
            return Err(ConfigError::Validation(
                "hashing suffix must not be empty".into(),
            ));
        }
        if !self.dataset.quasi_identifiers.is_empty() {
            ensure_distinct_columns(
                self.dataset
                    .quasi_identifiers
                    .iter()
                    .map(|qi| qi.name.as_str()),
            )
            .map_err(|err| ConfigError::Validation(format!("quasi-identifiers: {err}")))?;
        }
        Ok(())
    }

    pub fn sample() -> Self {
        Self {
            dataset: DatasetSection {
                id_column: Some("id".into()),
                encrypt_columns: vec!["ssn".into()],
                hash_columns: vec!["name".into()],
                quasi_identifiers: vec![
                    QuasiIdentifier::numeric("age"),
                    QuasiIdentifier::categorical("zip"),
                ],
                suppress: Some("id".into()),
            },
            cellcrypt: CellCryptConfig::sample(),
            anonymize: AnonymizeConfig {
                k: 10,
                error_mode: ErrorMode::Lenient,
                parallel: true,
                id_column: None,
            },
            sweep: SweepSection::default(),
            hashing: HashingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path, format: ConfigFormat) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = match resolve_format(path, format) {
        ConfigFormat::Yaml => serde_yaml::from_str(&contents).map_err(|err| ConfigError::Parse {
            format: ConfigFormat::Yaml,
            details: err.to_string(),
        }),
        _ => toml::from_str(&contents).map_err(|err| ConfigError::Parse {
            format: ConfigFormat::Toml,
            details: err.to_string(),
        }),
    }?;
    config.validate()?;
    Ok(config)
}

fn resolve_format(path: &Path, format: ConfigFormat) -> ConfigFormat {
    match format {
        ConfigFormat::Auto => match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        },
        _ => format,
    }
}
