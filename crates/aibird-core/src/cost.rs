//! Usage cost shown next to completion replies.

/// `(tokens / 1000) * cost_per_1k`, fixed-point with 5 decimals.
pub fn format_cost(total_tokens: u64, cost_per_1k: f64) -> String {
    let cost = (total_tokens as f64 / 1000.0) * cost_per_1k;
    format!("{cost:.5}")
}
