/// Round to one decimal place, ties away from zero.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Render a value with exactly one digit after the decimal point.
///
/// Applies [`round_to_tenth`] first so the display rule is the same for
/// min, mean and max, and never prints `-0.0`.
pub fn format_tenth(value: f64) -> String {
    let rounded = round_to_tenth(value);
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.1}", rounded)
}
