use crate::schema::FieldSchema;

/// Unit tokens the extractor recognizes next to a value (normalized form).
/// A word after a number that is not in this list is not treated as a unit.
const KNOWN_UNITS: &[&str] = &[
    "mg/dl", "mmol/l", "mmol/mol", "umol/l", "pmol/l", "nmol/l", "meq/l",
    "g/dl", "g/l", "mg/l", "ng/ml", "pg/ml", "ug/l", "u/l",
    "uu/ml", "uiu/ml", "mu/l", "miu/l",
    "mmhg", "kpa",
    "bpm", "beats/min",
    "years", "year", "yrs", "yr", "y", "yo",
    "kg", "kgs", "lb", "lbs", "cm", "m", "mm", "in", "inches",
    "kg/m2", "kg/m^2", "kg/m²",
    "%",
];

/// Lowercase, no spaces, micro sign folded to `u`.
pub fn normalize_unit(token: &str) -> String {
    token
        .trim()
        .trim_end_matches(['.', ',', ';', ')'])
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            'µ' | 'μ' => 'u',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

/// Units that are also ordinary words or abbreviations ("in March", "54 M").
/// They only count as units for fields that list a conversion for them.
const WORD_UNITS: &[&str] = &["in", "m", "y"];

pub fn is_known_unit(token: &str) -> bool {
    let normalized = normalize_unit(token);
    KNOWN_UNITS.contains(&normalized.as_str())
}

/// Whether `token` reads as a unit next to a value of `field`.
pub fn is_unit_for(token: &str, field: &FieldSchema) -> bool {
    let normalized = normalize_unit(token);
    if !KNOWN_UNITS.contains(&normalized.as_str()) {
        return false;
    }
    !WORD_UNITS.contains(&normalized.as_str())
        || field.unit.as_deref().map(normalize_unit).as_deref() == Some(normalized.as_str())
        || field.unit_conversions.iter().any(|c| c.unit == normalized)
}

/// Outcome of bringing a raw value into the field's canonical unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitResolution {
    /// No unit next to the value, or one the extractor does not know.
    Assumed(f64),
    /// Recognized unit converted to canonical.
    Converted { value: f64, unit: String },
    /// Recognized unit with no conversion for this field.
    Unconvertible { unit: String },
}

/// Convert `value` written in `unit_token` to the field's canonical unit.
pub fn resolve_unit(value: f64, unit_token: Option<&str>, field: &FieldSchema) -> UnitResolution {
    let Some(token) = unit_token.filter(|t| is_unit_for(t, field)) else {
        return UnitResolution::Assumed(value);
    };
    let unit = normalize_unit(token);

    let canonical = field.unit.as_deref().map(normalize_unit);
    if canonical.as_deref() == Some(unit.as_str()) {
        return UnitResolution::Converted { value, unit };
    }

    match field.unit_conversions.iter().find(|c| c.unit == unit) {
        Some(conversion) => UnitResolution::Converted {
            value: value * conversion.factor,
            unit,
        },
        None => UnitResolution::Unconvertible { unit },
    }
}
