use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use datamesh_cli::config::{load_config, Config, ConfigFormat};
use datamesh_cli::service::{DatameshService, RunReport};

#[derive(Debug, Parser)]
#[command(
    name = "datamesh",
    version,
    about = "Cell encryption, k-anonymity, and pseudonymization for JSON datasets"
)]
struct Cli {
    /// Path to configuration file (TOML or YAML). Defaults apply when absent.
    #[arg(long, default_value = "configs/datamesh.toml")]
    config: PathBuf,
    /// Explicit configuration format override.
    #[arg(long, value_enum, default_value_t = ConfigFormat::Auto)]
    config_format: ConfigFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Seal columns cell by cell into a cipher dataset and a key dataset.
    Encrypt {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        id_column: Option<String>,
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        #[arg(long)]
        cipher_out: PathBuf,
        #[arg(long)]
        keys_out: PathBuf,
    },
    /// Rejoin a cipher dataset with its key dataset.
    Decrypt {
        #[arg(long)]
        ciphertexts: PathBuf,
        #[arg(long)]
        keys: PathBuf,
        #[arg(long)]
        id_column: Option<String>,
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Generalize the configured quasi-identifiers to k-anonymity.
    Anonymize {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        k: Option<usize>,
        /// Identifier column to drop from the output.
        #[arg(long)]
        suppress: Option<String>,
    },
    /// Print C_AVG for each k.
    Sweep {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_delimiter = ',')]
        k_values: Vec<usize>,
    },
    /// Replace columns with salted Argon2id hashes.
    Hash {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        load_config(&cli.config, cli.config_format)?
    } else {
        tracing::debug!(path = %cli.config.display(), "config not found, using defaults");
        Config::default()
    };
    let service = DatameshService::new(config);

    match cli.command {
        Command::Encrypt {
            input,
            id_column,
            columns,
            cipher_out,
            keys_out,
        } => {
            let report =
                service.encrypt(&input, id_column.as_deref(), &columns, &cipher_out, &keys_out)?;
            summarize("encrypt", &report);
        }
        Command::Decrypt {
            ciphertexts,
            keys,
            id_column,
            columns,
            output,
        } => {
            let report =
                service.decrypt(&ciphertexts, &keys, id_column.as_deref(), &columns, &output)?;
            summarize("decrypt", &report);
        }
        Command::Anonymize {
            input,
            output,
            k,
            suppress,
        } => {
            let report = service.anonymize(&input, &output, k, suppress.as_deref())?;
            summarize("anonymize", &report.run);
            match report.c_avg {
                Some(c_avg) => println!(
                    "k={} classes={} c_avg={c_avg:.4}",
                    report.k, report.classes
                ),
                None => println!("k={} classes=0 c_avg=undefined", report.k),
            }
            for warning in &report.warnings {
                println!("warning: {warning:?}");
            }
        }
        Command::Sweep { input, k_values } => {
            for (k, c_avg) in service.sweep(&input, &k_values)? {
                println!("{k}\t{c_avg:.4}");
            }
        }
        Command::Hash {
            input,
            columns,
            output,
        } => {
            let report = service.hash(&input, &columns, &output)?;
            summarize("hash", &report);
        }
    }

    Ok(())
}

fn summarize(command: &str, report: &RunReport) {
    println!(
        "{command}: {} rows in, {} rows out, {} failed",
        report.rows_in, report.rows_out, report.failures
    );
}
