//! Query and headers command implementations.
//!
//! The query command:
//! 1. Opens the binary index
//! 2. Reads one function (with its edges) or every function
//! 3. Prints a text summary, or writes a JSON report
//!
//! The headers command prints trace headers by name.

use crate::index::reader::{CallInfo, FunctionInfo, IndexReader};
use crate::utils::config::CostFormat;
use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// Current JSON report schema version
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Arguments for the query command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// Path to the binary index
    pub index: PathBuf,

    /// Function index to inspect; None lists every function
    pub function: Option<u32>,

    /// Cost rendering for the report
    pub format: CostFormat,

    /// Emit a JSON report instead of text
    pub json: bool,

    /// Write the JSON report here instead of stdout
    pub output: Option<PathBuf>,
}

/// Arguments for the headers command
#[derive(Debug, Clone)]
pub struct HeadersArgs {
    /// Path to the binary index
    pub index: PathBuf,

    /// Header to print; None prints the standard set
    pub name: Option<String>,
}

/// Top-level JSON report written by the query command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionReport {
    /// Schema version for compatibility checking
    pub schema_version: String,

    /// Index file the report was generated from
    pub index_file: String,

    /// Cost format used for all rendered costs
    pub cost_format: CostFormat,

    /// One entry per reported function
    pub functions: Vec<FunctionEntry>,

    /// Timestamp when the report was generated
    pub generated_at: String,
}

/// One function in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEntry {
    /// Index of the function in the trace
    pub index: u32,

    #[serde(flatten)]
    pub info: FunctionInfo,

    /// Inbound edges, present when a single function was queried
    #[serde(skip_serializing_if = "Option::is_none")]
    pub called_from: Option<Vec<CallInfo>>,

    /// Outbound edges, present when a single function was queried
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_calls: Option<Vec<CallInfo>>,
}

/// Execute the query command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Index open or read failures
/// * Out-of-range function index
/// * Report write failures
pub fn execute_query(args: QueryArgs) -> Result<()> {
    info!("Querying index: {}", args.index.display());

    let mut reader =
        IndexReader::open(&args.index, args.format).context("Failed to open index")?;
    debug!("Index holds {} functions", reader.function_count());

    let entries = match args.function {
        Some(index) => vec![read_function(&mut reader, index, true)?],
        None => {
            let mut entries = Vec::with_capacity(reader.function_count() as usize);
            for index in 0..reader.function_count() {
                entries.push(read_function(&mut reader, index, false)?);
            }
            entries
        }
    };

    let report = FunctionReport {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        index_file: args.index.display().to_string(),
        cost_format: args.format,
        functions: entries,
        generated_at: Utc::now().to_rfc3339(),
    };

    if args.json {
        write_report(&report, args.output.as_deref())?;
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Execute the headers command
///
/// **Public** - main entry point called from main.rs
pub fn execute_headers(args: HeadersArgs) -> Result<()> {
    let mut reader =
        IndexReader::open(&args.index, CostFormat::Usec).context("Failed to open index")?;

    match args.name {
        Some(name) => {
            let value = reader
                .get_header(&name)
                .with_context(|| format!("Failed to read header '{}'", name))?;
            println!("{}", value);
        }
        None => {
            for name in ["cmd", "creator", "runs", "summary"] {
                let value = reader
                    .get_header(name)
                    .with_context(|| format!("Failed to read header '{}'", name))?;
                println!("{}: {}", name.bold(), value);
            }
        }
    }
    Ok(())
}

/// Read one function entry, with its edges when `with_edges` is set
fn read_function(
    reader: &mut IndexReader,
    index: u32,
    with_edges: bool,
) -> Result<FunctionEntry> {
    let info = reader
        .function_info(index, None)
        .with_context(|| format!("Failed to read function {}", index))?;

    let (called_from, sub_calls) = if with_edges {
        let mut called_from = Vec::with_capacity(info.called_from_count as usize);
        for edge in 0..info.called_from_count {
            called_from.push(reader.called_from_info(index, edge, None)?);
        }
        let mut sub_calls = Vec::with_capacity(info.sub_call_count as usize);
        for edge in 0..info.sub_call_count {
            sub_calls.push(reader.sub_call_info(index, edge, None)?);
        }
        (Some(called_from), Some(sub_calls))
    } else {
        (None, None)
    };

    Ok(FunctionEntry {
        index,
        info,
        called_from,
        sub_calls,
    })
}

/// Write the JSON report to a file or stdout
fn write_report(report: &FunctionReport, output: Option<&std::path::Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create report file {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), report)
                .context("Failed to serialize report")?;
            info!("Report written to {}", path.display());
        }
        None => {
            let rendered =
                serde_json::to_string_pretty(report).context("Failed to serialize report")?;
            println!("{}", rendered);
        }
    }
    Ok(())
}

/// Print the report as a readable text table
fn print_report(report: &FunctionReport) {
    println!(
        "{} ({} costs)",
        report.index_file.bold(),
        report.cost_format
    );

    for entry in &report.functions {
        let info = &entry.info;
        println!(
            "{:>4}  {}  {}",
            entry.index,
            info.function_name.cyan().bold(),
            format!("{}:{}", info.filename, info.line).dimmed()
        );
        println!(
            "      invocations {}  self {}  inclusive {}",
            info.invocation_count,
            info.summed_self_cost.green(),
            info.summed_inclusive_cost.yellow()
        );

        if let Some(called_from) = &entry.called_from {
            for edge in called_from {
                println!(
                    "      {} fn {} at line {}  calls {}  cost {}",
                    "from".blue(),
                    edge.function,
                    edge.line,
                    edge.call_count,
                    edge.summed_call_cost
                );
            }
        }
        if let Some(sub_calls) = &entry.sub_calls {
            for edge in sub_calls {
                println!(
                    "      {} fn {} at line {}  calls {}  cost {}",
                    "into".magenta(),
                    edge.function,
                    edge.line,
                    edge.call_count,
                    edge.summed_call_cost
                );
            }
        }
    }
}
