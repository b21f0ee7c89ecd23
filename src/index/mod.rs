//! The binary index format: writer, reader, and cost formatting.
//!
//! All on-disk numbers are little-endian 32-bit words. File layout:
//!
//! - version: u32 = 7
//! - headersPos: u32 (patched after the records are written)
//! - functionCount: u32 = N
//! - functionOffset[0..N): N u32 (patched after the records are written)
//! - per-function records, contiguous, in index order
//! - headers block: raw header lines, each ending in \n, until EOF
//!
//! Per-function record at functionOffset[i]:
//!
//! - line, summedSelfCost, summedInclusiveCost, invocationCount: 4 u32
//! - calledFromCount = M, subCallCount = K: 2 u32
//! - calledFrom[0..M): (callerIndex, line, callCount, summedCallCost) each
//! - subCalls[0..K): (calleeIndex, line, callCount, summedCallCost) each
//! - filename, functionName: newline-terminated byte strings

pub mod cost;
pub mod reader;
pub mod writer;

// Re-export main types
pub use cost::format_cost;
pub use reader::{CallInfo, FunctionInfo, IndexReader};
pub use writer::write_index;

/// Width of one on-disk word in bytes
pub(crate) const WORD: u64 = 4;

/// Words in the fixed part of a function record (line, self, inclusive,
/// invocations, calledFromCount, subCallCount)
pub(crate) const RECORD_HEADER_WORDS: u64 = 6;

/// Words per stored call edge
pub(crate) const EDGE_WORDS: u64 = 4;
