//! Small helpers.

/// Lot counts below this magnitude are treated as zero.
pub const LOT_EPSILON: f64 = 0.0001;

/// First whitespace-separated token: "RELIANCE IS Equity" -> "RELIANCE".
pub fn base_symbol(sym: &str) -> Option<&str> {
    sym.split_whitespace().next()
}

/// Finite and strictly positive.
pub fn valid_price(p: f64) -> bool {
    p.is_finite() && p > 0.0
}
