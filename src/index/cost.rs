//! Rendering of raw integer costs.
//!
//! Raw costs are microseconds. They can be served unchanged, rounded
//! to milliseconds, or expressed as a percentage of the trace's
//! `summary` time.

use crate::utils::config::CostFormat;

/// Format a raw cost
///
/// `summary` is the trace's total time; it is only consulted for
/// percentages. A zero summary renders as "0.00" instead of dividing.
pub fn format_cost(cost: u32, format: CostFormat, summary: u64) -> String {
    match format {
        CostFormat::Percent => {
            if summary == 0 {
                "0.00".to_string()
            } else {
                format!("{:.2}", cost as f64 * 100.0 / summary as f64)
            }
        }
        // Round half away from zero; costs are unsigned so adding half
        // the divisor does exactly that
        CostFormat::Msec => ((u64::from(cost) + 500) / 1000).to_string(),
        CostFormat::Usec => cost.to_string(),
    }
}
