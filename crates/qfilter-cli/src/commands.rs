//! Command-line arguments and command implementations.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use qfilter::{FieldIndex, FilterOptions, Predicate, Schema, SchemaSource, Validator};
use serde_json::Value;
use tracing::{debug, info};

/// Check, compile and evaluate filter trees against a schema.
#[derive(Parser, Debug)]
#[command(name = "qfilter")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Schema file (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Root model filters are written against
    #[arg(short, long)]
    pub model: String,

    /// Options file overriding the validation defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Reject XOR connectors
    #[arg(long)]
    pub no_xor: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the filterable field paths of the model
    Fields {
        /// Print the field tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a filter tree
    Check {
        /// Filter file; standard input when omitted or `-`
        filter: Option<PathBuf>,
    },

    /// Validate and compile a filter tree
    Compile {
        /// Filter file; standard input when omitted or `-`
        filter: Option<PathBuf>,

        /// Output form
        #[arg(short, long, value_enum, default_value = "expr")]
        format: Format,
    },

    /// Print the records a filter tree matches
    Eval {
        /// Filter file; standard input when omitted or `-`
        filter: Option<PathBuf>,

        /// JSON file holding an array of records
        #[arg(short, long)]
        records: PathBuf,

        /// Print only the number of matches
        #[arg(long)]
        count: bool,
    },
}

/// Output forms of `compile`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Infix expression
    Expr,
    /// One `lookup_key value` line per condition
    Keys,
    /// Canonical JSON filter tree
    Json,
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The filter tree was rejected by validation.
    Rejected,
}

/// Loaded schema and options for one invocation.
struct Context {
    index: FieldIndex,
    options: FilterOptions,
}

impl Context {
    fn load(cli: &Cli) -> Result<Self> {
        let schema = Schema::load(&cli.schema)?;
        if schema.model(&cli.model).is_none() {
            let known: Vec<_> = schema.model_names().collect();
            bail!(
                "model '{}' is not in {} (known: {})",
                cli.model,
                cli.schema.display(),
                known.join(", ")
            );
        }

        let mut options = match &cli.config {
            Some(path) => FilterOptions::load(path)?,
            None => FilterOptions::default(),
        };
        if cli.no_xor {
            options = options.supports_xor(false);
        }
        debug!(?options, "validation options");

        let index = FieldIndex::build(&schema, &cli.model);
        info!(model = %cli.model, fields = index.len(), "field index ready");
        Ok(Context { index, options })
    }

    fn validator(&self) -> Validator<'_> {
        Validator::new(&self.index).with_options(self.options)
    }
}

/// Runs the selected command, writing its output to `out`.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<Outcome> {
    let ctx = Context::load(cli)?;

    match &cli.command {
        Command::Fields { json } => {
            fields(&ctx.index, *json, out)?;
            Ok(Outcome::Success)
        }
        Command::Check { filter } => {
            let raw = read_filter(filter.as_deref())?;
            match ctx.validator().validate_value(&raw) {
                Ok(tree) => {
                    writeln!(out, "ok: {} condition(s)", tree.leaves().len())?;
                    Ok(Outcome::Success)
                }
                Err(err) => reject(&err, out),
            }
        }
        Command::Compile { filter, format } => {
            let raw = read_filter(filter.as_deref())?;
            match ctx.validator().compile_value(&raw) {
                Ok(predicate) => {
                    compile(&predicate, *format, out)?;
                    Ok(Outcome::Success)
                }
                Err(err) => reject(&err, out),
            }
        }
        Command::Eval {
            filter,
            records,
            count,
        } => {
            let raw = read_filter(filter.as_deref())?;
            let predicate = match ctx.validator().compile_value(&raw) {
                Ok(predicate) => predicate,
                Err(err) => return reject(&err, out),
            };
            let records = read_records(records)?;
            eval(&predicate, &records, *count, out)?;
            Ok(Outcome::Success)
        }
    }
}

fn reject(err: &qfilter::ValidationError, out: &mut dyn Write) -> Result<Outcome> {
    debug!(%err, "filter rejected");
    serde_json::to_writer_pretty(&mut *out, &err.to_body())?;
    writeln!(out)?;
    Ok(Outcome::Rejected)
}

fn fields(index: &FieldIndex, as_json: bool, out: &mut dyn Write) -> Result<()> {
    if as_json {
        serde_json::to_writer_pretty(&mut *out, &index.root().children)?;
        writeln!(out)?;
        return Ok(());
    }

    for node in index.iter() {
        let Some(descriptor) = &node.descriptor else {
            continue;
        };
        let mut line = format!("{}\t{}", node.lookup_path, descriptor.field_type);
        if let Some(related) = &descriptor.related_model {
            line.push_str(&format!(" -> {related}"));
        }
        writeln!(out, "{line}\t{}", descriptor.allowed_lookups().join(","))?;
    }
    Ok(())
}

fn compile(predicate: &Predicate, format: Format, out: &mut dyn Write) -> Result<()> {
    match format {
        Format::Expr => writeln!(out, "{predicate}")?,
        Format::Keys => {
            for condition in predicate.conditions() {
                writeln!(out, "{} {}", condition.lookup_key(), condition.value)?;
            }
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, &predicate.to_value())?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn eval(predicate: &Predicate, records: &[Value], count: bool, out: &mut dyn Write) -> Result<()> {
    let evaluator = predicate.evaluator();
    if count {
        writeln!(out, "{}", evaluator.count(records))?;
        return Ok(());
    }

    let matched = evaluator.filter(records);
    debug!(total = records.len(), matched = matched.len(), "evaluated records");
    serde_json::to_writer_pretty(&mut *out, &matched)?;
    writeln!(out)?;
    Ok(())
}

fn read_filter(path: Option<&Path>) -> Result<Value> {
    let text = match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read filter {}", path.display()))?,
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read filter from standard input")?;
            text
        }
    };
    serde_json::from_str(&text).context("filter is not valid JSON")
}

fn read_records(path: &Path) -> Result<Vec<Value>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read records {}", path.display()))?;
    let records: Value = serde_json::from_str(&text)
        .with_context(|| format!("records in {} are not valid JSON", path.display()))?;
    match records {
        Value::Array(records) => Ok(records),
        other => Ok(vec![other]),
    }
}
