//! Line shapes of the Callgrind text format.
//!
//! The format is line oriented. The shapes the engine cares about:
//! - `fl=<file>` starts a function-invocation block
//! - `fn=<name>` names the invoked function (follows `fl=`)
//! - `cfn=<name>` starts a sub-call record
//! - `calls=<...>` filler line between `cfn=` and its cost line
//! - `<line> <cost>` integer cost line
//! - `<key>: <value>` trace header
//!
//! Anything else is ignored; Callgrind is extensible.

/// Prefix of a function-invocation block
pub const FILE_PREFIX: &str = "fl=";

/// Prefix of the function-name line inside an invocation block
pub const FUNCTION_PREFIX: &str = "fn=";

/// Prefix of a sub-call record
pub const CALL_PREFIX: &str = "cfn=";

/// Separator of header lines (`key: value`)
pub const HEADER_SEPARATOR: &str = ": ";

/// Parse a `<line> <cost>` pair
///
/// Extra event columns after the first two fields are ignored, the
/// same way the `summary` header keeps only its first field.
pub fn parse_cost_line(line: &str) -> Option<(u32, u64)> {
    let mut fields = line.split_whitespace();
    let lnr = fields.next()?.parse().ok()?;
    let cost = fields.next()?.parse().ok()?;
    Some((lnr, cost))
}

/// True if the line has the `key: value` header shape
pub fn is_header_line(line: &str) -> bool {
    line.contains(HEADER_SEPARATOR)
}

/// Split a header line into key and value
pub fn split_header(line: &str) -> Option<(&str, &str)> {
    line.split_once(HEADER_SEPARATOR)
}

/// Extract the time component of a `summary` header value
///
/// Only the first whitespace-delimited field is a time; later fields
/// (memory, for instance) are ignored.
pub fn summary_time(value: &str) -> u64 {
    value
        .split_whitespace()
        .next()
        .and_then(|field| field.parse().ok())
        .unwrap_or(0)
}
