use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dsff::Format;

mod config;
mod convert;
mod detect;
mod info;

/// DSFF - DataSet File Format converter
#[derive(Parser)]
#[command(name = "dsff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert to or from a DSFF container
    Convert {
        /// Source file or dataset folder
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Destination file or dataset folder
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Format of INPUT (guessed from the extension or the content when omitted)
        #[arg(long = "from", value_name = "FORMAT")]
        from: Option<Format>,

        /// Format of OUTPUT (guessed from the extension when omitted)
        #[arg(long = "to", value_name = "FORMAT")]
        to: Option<Format>,

        /// Load codec settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Name of the target (label) column
        #[arg(long)]
        target: Option<String>,

        /// Placeholder for missing values in text formats
        #[arg(long)]
        missing: Option<String>,
    },

    /// Display information about a DSFF container
    Info {
        /// Input DSFF file path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List the formats a file or folder could be read as
    Detect {
        /// File or folder to inspect
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Convert {
            input,
            output,
            from,
            to,
            config,
            target,
            missing,
        } => convert::run(input, output, from, to, config, target, missing),
        Commands::Info { file } => info::run(file),
        Commands::Detect { file } => detect::run(file),
    }
}
