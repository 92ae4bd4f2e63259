//! # DSFF Converter
//!
//! A command-line tool for building DSFF containers and converting them.
//!
//! ## Usage
//!
//! ```bash
//! # Import a CSV file into a container
//! dsff convert iris.csv iris.dsff
//!
//! # Export a container as ARFF
//! dsff convert iris.dsff iris.arff
//!
//! # Inspect a container
//! dsff info iris.dsff
//!
//! # List the formats a file could be
//! dsff detect unknown.bin
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
