//! Preprocess command implementation.
//!
//! The preprocess command:
//! 1. Builds the run configuration from CLI arguments
//! 2. Delegates to the external preprocessor when one is configured
//! 3. Otherwise streams the trace and aggregates it in process
//! 4. Writes the binary index

use crate::preprocessor::Preprocessor;
use crate::utils::config::PreprocessConfig;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the preprocess command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct PreprocessArgs {
    /// Path to the Callgrind trace to read
    pub input: PathBuf,

    /// Path of the binary index to write
    pub output: PathBuf,

    /// Function names treated as transparent proxies
    pub proxy_functions: Vec<String>,

    /// Optional external preprocessor executable
    pub external_bin: Option<PathBuf>,
}

/// Execute the preprocess command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Trace open or parse failures
/// * Index write failures
pub fn execute_preprocess(args: PreprocessArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Preprocessing trace: {}", args.input.display());
    debug!("Proxy functions: {:?}", args.proxy_functions);

    let config = PreprocessConfig {
        proxy_functions: args.proxy_functions.into_iter().collect(),
        external_bin: args.external_bin,
    };

    let preprocessor = Preprocessor::new(config);
    preprocessor
        .process(&args.input, &args.output)
        .context("Failed to preprocess trace")?;

    info!(
        "Index written to {} in {:.2?}",
        args.output.display(),
        start_time.elapsed()
    );
    Ok(())
}
