//! Sentinel codes standing in for non-measurement outcomes.
//!
//! Every cell in a result table is either a non-negative scalar or one of
//! these reserved negative codes. The codes participate in arithmetic merges,
//! so two tables holding the same code must decode back to that code after a
//! cell-wise sum.

/// Cell has not been executed yet.
pub const NOT_RUN: f64 = -1.0;
/// The engine hit its memory limit.
pub const MEMORY_LIMIT: f64 = -2.0;
/// The engine hit its time limit.
pub const TIME_LIMIT: f64 = -3.0;
/// The engine failed for an unclassified reason.
pub const UNKNOWN: f64 = -4.0;
/// No query file existed for this shape on this graph.
pub const NOT_APPLICABLE: f64 = -5.0;

/// True for any sentinel-coded cell.
pub fn is_error(value: f64) -> bool {
    value < 0.0
}

/// Decode the cell-wise sum of two tables holding equal sentinels back to the
/// single sentinel. `-2 + -2 = -4` must report "memory limit", not "unknown".
/// Positive sums and odd sentinel pairs pass through unchanged.
pub fn decode_sum(value: f64) -> f64 {
    if value == -2.0 {
        -1.0
    } else if value == -4.0 {
        -2.0
    } else if value == -6.0 {
        -3.0
    } else if value == -8.0 {
        -4.0
    } else if value == -10.0 {
        -5.0
    } else {
        value
    }
}

/// Short human-readable description, used when rendering tables to text.
pub fn describe(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        return Some("did not run");
    }
    if value == NOT_RUN || value == NOT_APPLICABLE {
        return Some("did not run");
    }
    if value == MEMORY_LIMIT {
        return Some("mem");
    }
    if value == TIME_LIMIT {
        return Some("time");
    }
    if value == UNKNOWN {
        return Some("unknown error");
    }
    None
}
