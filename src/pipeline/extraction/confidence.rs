/// Triage thresholds used when configuration does not override them.
pub mod thresholds {
    /// At or above: value is accepted without asking the user.
    pub const HIGH: f64 = 0.95;

    /// At or above (and below HIGH): value is kept but the user confirms it.
    /// Below: a required field counts as missing.
    pub const MEDIUM: f64 = 0.90;
}

/// Static base confidence of each extraction strategy.
pub mod rule_confidence {
    /// `Label: value` at line start or after a field separator.
    pub const EXACT_LABEL: f64 = 0.97;

    /// Table row whose first cell is a synonym.
    pub const TABLE_ROW: f64 = 0.93;

    /// Synonym followed by a value within a short window.
    pub const PROXIMITY: f64 = 0.80;

    /// Recognized unit that cannot be converted to the field's unit.
    pub const UNIT_MISMATCH: f64 = 0.0;

    /// Value typed in by the user during completion.
    pub const USER_INPUT: f64 = 1.0;
}

/// Clamp into `[0, 1]`. NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Mean confidence over resolved fields; 0 when nothing was resolved.
pub fn overall_confidence<I>(confidences: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = confidences
        .into_iter()
        .fold((0.0, 0usize), |(s, n), c| (s + c, n + 1));
    if count == 0 {
        return 0.0;
    }
    clamp_confidence(sum / count as f64)
}
