//! qfilter CLI
//!
//! Checks, compiles and evaluates filter trees against a schema file.
//!
//! ## Usage
//!
//! ```bash
//! # List the filterable paths of a model
//! qfilter --schema library.yaml --model Book fields
//!
//! # Validate a filter (exit code 2 and an error body when rejected)
//! qfilter --schema library.yaml --model Book check filter.json
//!
//! # Show the compiled predicate as ORM lookup keys
//! qfilter --schema library.yaml --model Book compile filter.json --format keys
//!
//! # Keep the records that match
//! qfilter --schema library.yaml --model Book eval filter.json --records books.json
//! ```

mod commands;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::{Cli, Outcome};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let mut stdout = io::stdout().lock();
    match commands::run(&cli, &mut stdout)? {
        Outcome::Success => Ok(ExitCode::SUCCESS),
        Outcome::Rejected => Ok(ExitCode::from(2)),
    }
}
