// ========================================================================================
//
//                        REFERENCE TABLE CONSTRUCTION PIPELINE
//
// ========================================================================================
//
// Turns raw census extracts into the persisted conditional probability tables the
// inference engine reads. Every stage is a pure transform from one owned table to
// a new one; only `builder` touches the file system.

pub mod apportion;
pub mod builder;
pub mod extract;
pub mod suppression;

/// Decimal digits kept in percentage-derived probability tables.
pub const PROBABILITY_DIGITS: i32 = 4;

/// Rounds half away from zero to `digits` decimal places.
#[inline]
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}
