//! Callgrind Index CLI
//!
//! Preprocesses Callgrind profiler traces into compact binary indexes
//! and answers per-function queries against them.

use anyhow::Result;
use callgrind_index::commands::{
    execute_headers, execute_preprocess, execute_query, HeadersArgs, PreprocessArgs, QueryArgs,
};
use callgrind_index::utils::config::{CostFormat, DEFAULT_PROXY_FUNCTIONS};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

/// Callgrind Index - profile trace preprocessing and querying
#[derive(Parser, Debug)]
#[command(name = "callgrind-index")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Preprocess a Callgrind trace into a binary index
    Preprocess {
        /// Path to the Callgrind trace file
        #[arg(short, long)]
        input: PathBuf,

        /// Path of the index file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Proxy function name (repeatable; defaults to the common
        /// call_user_func family)
        #[arg(long = "proxy")]
        proxy_functions: Vec<String>,

        /// External preprocessor executable to try before parsing in
        /// process
        #[arg(long)]
        external_bin: Option<PathBuf>,
    },

    /// Query function statistics from a binary index
    Query {
        /// Path to the index file
        #[arg(short, long)]
        index: PathBuf,

        /// Function index to inspect (omit to list all functions)
        #[arg(short, long)]
        function: Option<u32>,

        /// Cost rendering
        #[arg(long, value_enum, default_value_t = CostFormat::Percent)]
        format: CostFormat,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Write JSON report to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print trace headers stored in a binary index
    Headers {
        /// Path to the index file
        #[arg(short, long)]
        index: PathBuf,

        /// Header name (omit to print the standard set)
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Preprocess {
            input,
            output,
            proxy_functions,
            external_bin,
        } => {
            let proxy_functions = if proxy_functions.is_empty() {
                DEFAULT_PROXY_FUNCTIONS
                    .iter()
                    .map(|name| name.to_string())
                    .collect()
            } else {
                proxy_functions
            };
            execute_preprocess(PreprocessArgs {
                input,
                output,
                proxy_functions,
                external_bin,
            })
        }

        Commands::Query {
            index,
            function,
            format,
            json,
            output,
        } => execute_query(QueryArgs {
            index,
            function,
            format,
            json,
            output,
        }),

        Commands::Headers { index, name } => execute_headers(HeadersArgs { index, name }),
    }
}
