//! Number formatting.

/// Format a number for display and for editable cell input.
///
/// Uses the shortest representation that parses back to the same `f64`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else {
        format!("{}", n)
    }
}

/// Literal text that parses back to exactly `n`.
///
/// Infinities use an overflowing exponent (`1e999`). NaN has no literal
/// form and yields `None`.
pub fn number_literal(n: f64) -> Option<String> {
    if n.is_nan() {
        None
    } else if n.is_infinite() {
        let text = if n > 0.0 { "1e999" } else { "-1e999" };
        Some(text.to_string())
    } else {
        Some(format!("{}", n))
    }
}

/// Format a number for text concatenation: fixed notation with `precision`
/// fractional digits (`5` with precision 6 is `5.000000`).
pub fn number_to_text(n: f64, precision: usize) -> String {
    if n.is_nan() || n.is_infinite() {
        return format_number(n);
    }
    format!("{:.*}", precision, n)
}
