//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while parsing a Callgrind trace
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot open trace file '{path}': {source}")]
    OpenInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error reading trace at line {line}: {source}")]
    ReadLine {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected end of trace, expected {0}")]
    UnexpectedEof(&'static str),

    #[error("expected fn= after fl= at line {line}, found: {content}")]
    MissingFunctionLine { line: usize, content: String },

    #[error("malformed cost line at line {line}: {content}")]
    MalformedCostLine { line: usize, content: String },

    #[error("cfn= call record outside any function block at line {0}")]
    CallOutsideFunction(usize),

    #[error("call to proxy function '{0}' with no pending forwarded call")]
    EmptyProxyQueue(String),
}

/// Errors that can occur while writing the binary index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("cannot create index file '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write index: {0}")]
    Write(#[from] std::io::Error),

    #[error("value in function '{function}' overflows the 32-bit index field: {value}")]
    CostOverflow { function: String, value: u64 },
}

/// Errors that can occur while reading the binary index
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("cannot open index file '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read index: {0}")]
    Read(#[from] std::io::Error),

    #[error("unsupported index version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("function index {index} out of range (function count {count})")]
    FunctionOutOfRange { index: u32, count: u32 },

    #[error("edge index {index} out of range (edge count {count})")]
    EdgeOutOfRange { index: u32, count: u32 },

    #[error("invalid UTF-8 in index string: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),
}

/// Errors surfaced by the whole preprocess pipeline (parse plus write)
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Index(#[from] IndexError),
}
