//! Locale-tolerant number parsing.
//!
//! Reports arrive with `1,234.5`, `1.234,5`, `1'234`, `5,6` and friends.
//! The last separator wins as decimal mark when both `.` and `,` appear;
//! a lone comma followed by exactly three digits is a thousands separator.

/// Regex fragment matching a number token as it appears in report text.
/// Always ends on a digit, so trailing sentence punctuation is not captured.
/// Space-grouped thousands (`12 345`) need exact three-digit groups.
pub const NUMBER_PATTERN: &str = r"[-+]?\d{1,3}(?:[ \u{00A0}\u{202F}']\d{3})+(?:[.,]\d+)?\b|[-+]?\d[\d.,'\u{00A0}\u{202F}]*\d|[-+]?\d";

/// Parse a number written with any common locale convention.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\'' | '\u{00A0}' | '\u{202F}' | '_'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    let canonical = match (dots, commas) {
        (0, 0) => cleaned,
        (_, 0) => {
            if dots == 1 {
                cleaned
            } else {
                strip_grouping(&cleaned, '.')?
            }
        }
        (0, _) => {
            if commas == 1 && is_thousands_group(&cleaned, ',') {
                cleaned.replace(',', "")
            } else if commas == 1 {
                cleaned.replace(',', ".")
            } else {
                strip_grouping(&cleaned, ',')?
            }
        }
        _ => {
            let last_dot = cleaned.rfind('.')?;
            let last_comma = cleaned.rfind(',')?;
            if last_dot > last_comma {
                cleaned.replace(',', "")
            } else {
                cleaned.replace('.', "").replace(',', ".")
            }
        }
    };

    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `1,234` style: one separator, three digits after it, non-zero integer part.
fn is_thousands_group(s: &str, sep: char) -> bool {
    let Some((int_part, frac)) = s.split_once(sep) else {
        return false;
    };
    let int_digits = int_part.trim_start_matches(['-', '+']);
    frac.len() == 3
        && frac.chars().all(|c| c.is_ascii_digit())
        && !int_digits.is_empty()
        && int_digits != "0"
}

/// Remove repeated grouping separators, checking each group has three digits.
fn strip_grouping(s: &str, sep: char) -> Option<String> {
    let mut parts = s.split(sep);
    let head = parts.next()?;
    let mut out = head.to_string();
    for group in parts {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}
