/// Percentage of `numerator` over `denominator`, defined as 0 when the
/// denominator is exactly zero. Negative denominators divide normally.
pub fn ratio_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

/// Formats an amount as whole currency units with thousands separators,
/// e.g. `1234567.4` -> `$1,234,567` and `-50.0` -> `-$50`.
pub fn format_currency(value: f64) -> String {
    let rounded = value.round();
    let grouped = group_thousands(&format!("{:.0}", rounded.abs()));

    if rounded < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, value)
}

pub fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);

    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}
