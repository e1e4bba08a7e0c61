//! Number, currency and column formatting for the text report.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Format a number with thousands separators and a fixed number of decimals.
///
/// # Examples
///
/// ```
/// use insights_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(48210.0, 0), "48,210");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let fixed = format!("{:.prec$}", value.abs(), prec = decimals as usize);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = group_thousands(int_part);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }

    // "-0.00" reads badly; only keep the sign when something non-zero survived.
    if value < 0.0 && out.bytes().any(|b| (b'1'..=b'9').contains(&b)) {
        format!("-{}", out)
    } else {
        out
    }
}

/// Format an integer count with thousands separators.
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Format a USD amount with two decimals and thousands separators.
///
/// # Examples
///
/// ```
/// use insights_core::formatting::format_currency;
///
/// assert_eq!(format_currency(12500.0), "$12,500.00");
/// assert_eq!(format_currency(-40.0), "-$40.00");
/// ```
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${}", format_number(amount.abs(), 2))
    } else {
        format!("${}", format_number(amount, 2))
    }
}

/// Format a percentage value (already scaled to 0–100) with one decimal.
pub fn format_percent(value: f64) -> String {
    format!("{}%", format_number(value, 1))
}

/// Format a number of hours as a compact duration.
///
/// * under one hour → `"45m"`
/// * whole hours → `"3h"`
/// * otherwise → `"3h 45m"`
///
/// # Examples
///
/// ```
/// use insights_core::formatting::format_hours;
///
/// assert_eq!(format_hours(0.75), "45m");
/// assert_eq!(format_hours(3.0), "3h");
/// assert_eq!(format_hours(3.75), "3h 45m");
/// ```
pub fn format_hours(hours: f64) -> String {
    let total_mins = (hours * 60.0).round().max(0.0) as u64;
    let (h, m) = (total_mins / 60, total_mins % 60);
    match (h, m) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", format_count(h)),
        (h, m) => format!("{}h {}m", format_count(h), m),
    }
}

// ── Column layout ─────────────────────────────────────────────────────────────

/// Shorten `s` to at most `width` display columns, ending with `…` when cut.
pub fn truncate_to_width(s: &str, width: usize) -> String {
    if UnicodeWidthStr::width(s) <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    let len = s.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── format_number ────────────────────────────────────────────────────────

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_grouping() {
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(1_000.0, 0), "1,000");
        assert_eq!(format_number(12_345_678.9, 1), "12,345,678.9");
    }

    #[test]
    fn test_format_number_negative_zero_drops_sign() {
        assert_eq!(format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    // ── format_currency / format_percent ─────────────────────────────────────

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(1_234.5), "$1,234.50");
        assert_eq!(format_currency(-9.99), "-$9.99");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(42.26), "42.3%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(1_250.0), "1,250.0%");
    }

    // ── format_hours ─────────────────────────────────────────────────────────

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(0.0), "0m");
        assert_eq!(format_hours(0.5), "30m");
        assert_eq!(format_hours(2.0), "2h");
        assert_eq!(format_hours(1.5), "1h 30m");
        assert_eq!(format_hours(1_500.0), "1,500h");
    }

    // ── column layout ────────────────────────────────────────────────────────

    #[test]
    fn test_truncate_long_cell() {
        assert_eq!(truncate_to_width("alice@example.com", 8), "alice@e…");
        assert_eq!(truncate_to_width("alice", 8), "alice");
    }

    #[test]
    fn test_wide_characters_count_as_two_cells() {
        // Each CJK character occupies two terminal columns.
        assert_eq!(truncate_to_width("日本", 4), "日本");
        assert_eq!(truncate_to_width("日本語", 4), "日…");
    }
}
