//! Configuration and constants for the trace engine.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Version of the binary index format we produce and accept
pub const INDEX_VERSION: u32 = 7;

/// Function name that marks the trace entry point
pub const ENTRY_POINT: &str = "{main}";

/// Functions treated as transparent call proxies unless overridden
pub const DEFAULT_PROXY_FUNCTIONS: &[&str] = &["call_user_func", "call_user_func_array"];

/// How raw integer costs are rendered by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CostFormat {
    /// Percentage of the trace's summary time, two decimal places
    Percent,
    /// Milliseconds, rounded half away from zero
    Msec,
    /// Microseconds, the raw cost unchanged
    Usec,
}

impl fmt::Display for CostFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostFormat::Percent => write!(f, "percent"),
            CostFormat::Msec => write!(f, "msec"),
            CostFormat::Usec => write!(f, "usec"),
        }
    }
}

/// Configuration for a preprocessing run
///
/// **Public** - built from CLI arguments, consumed by the preprocessor
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Function names treated as transparent proxies
    pub proxy_functions: BTreeSet<String>,

    /// Optional external preprocessor executable to try first
    pub external_bin: Option<PathBuf>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            proxy_functions: DEFAULT_PROXY_FUNCTIONS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            external_bin: None,
        }
    }
}

impl PreprocessConfig {
    /// Create a config with the default proxy set and no external binary
    pub fn new() -> Self {
        Self::default()
    }
}
