//! Record Cast CLI
//!
//! Casts JSON input through a schema declaration and prints the exported
//! records along with any rejected writes.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use familiar_records::config::OutputFormat;
use familiar_records::{Record, RecordsConfig, Schema, SchemaOptions};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "record-cast")]
#[command(about = "Cast JSON records through a schema declaration")]
struct Cli {
    /// Schema declaration (JSON object of fields)
    #[arg(short, long)]
    schema: PathBuf,

    /// Input record or array of records (reads stdin when omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Admit undeclared fields instead of dropping them
    #[arg(long)]
    lenient: bool,

    /// Print compact JSON
    #[arg(long)]
    compact: bool,

    /// Config file
    #[arg(short, long)]
    config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let config = match RecordsConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config) {
        Ok(clean) => {
            if !clean {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every record was cast without errors
fn run(cli: Cli, config: RecordsConfig) -> Result<bool> {
    let options = schema_options(&config, cli.lenient);
    let schema = load_schema(&cli.schema, options)?;
    info!(fields = schema.len(), strict = schema.is_strict(), "compiled schema");

    let input = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading input {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading stdin")?;
            buffer
        }
    };
    let input: serde_json::Value = serde_json::from_str(&input).context("parsing input")?;

    let report = cast(&schema, input, config.output.include_errors);
    let compact = cli.compact || config.output.format == OutputFormat::Compact;
    println!("{}", render(&report.output, compact)?);

    Ok(report.clean)
}

/// Configured schema options; `--lenient` wins over the config file
fn schema_options(config: &RecordsConfig, lenient: bool) -> SchemaOptions {
    let mut options = config.schema_options();
    if lenient {
        options.strict = false;
    }
    options
}

fn load_schema(path: &Path, options: SchemaOptions) -> Result<Schema> {
    let declaration = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema {}", path.display()))?;
    let declaration: serde_json::Value = serde_json::from_str(&declaration)
        .with_context(|| format!("parsing schema {}", path.display()))?;
    Ok(Schema::from_json_with(&declaration, options)?)
}

/// Exported records for one input document
struct CastReport {
    /// One report per record; an array exactly when the input was an array
    output: serde_json::Value,
    /// No record reported errors
    clean: bool,
}

fn cast(schema: &Schema, input: serde_json::Value, include_errors: bool) -> CastReport {
    let (batch, items) = match input {
        serde_json::Value::Array(items) => (true, items),
        single => (false, vec![single]),
    };

    let mut clean = true;
    let mut reports = Vec::with_capacity(items.len());
    for item in items {
        let record = Record::with_values(schema, item);
        clean &= !record.has_errors();

        if include_errors {
            let errors: Vec<_> = record.errors().iter().map(|e| e.to_json()).collect();
            reports.push(json!({ "record": record.to_json(), "errors": errors }));
        } else {
            reports.push(record.to_json());
        }
    }

    let output = if batch {
        serde_json::Value::Array(reports)
    } else {
        reports.pop().unwrap_or(serde_json::Value::Null)
    };
    CastReport { output, clean }
}

fn render(output: &serde_json::Value, compact: bool) -> Result<String> {
    Ok(if compact {
        serde_json::to_string(output)?
    } else {
        serde_json::to_string_pretty(output)?
    })
}
