use rust_decimal::Decimal;
use std::str::FromStr;

/// Normalises a locale-formatted price into a comparable value.
///
/// Everything except digits, `,` and `.` is stripped. The rightmost separator
/// is the decimal separator when one or two digits follow it; any other
/// separator is a thousands separator and is dropped. Returns `None` for
/// empty input or input without digits. Never panics.
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let kept: Vec<char> = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !kept.iter().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let decimal_pos = kept
        .iter()
        .rposition(|c| *c == ',' || *c == '.')
        .filter(|pos| (1..=2).contains(&(kept.len() - pos - 1)));

    let mut normalized = String::with_capacity(kept.len() + 1);
    for (i, c) in kept.iter().enumerate() {
        if c.is_ascii_digit() {
            normalized.push(*c);
        } else if Some(i) == decimal_pos {
            if normalized.is_empty() {
                normalized.push('0');
            }
            normalized.push('.');
        }
    }

    Decimal::from_str(&normalized).ok()
}
