use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::SchemaError;
use crate::pipeline::extraction::numeric::parse_locale_number;
use crate::pipeline::extraction::units::normalize_unit;

/// Prediction task. Each task owns one field table in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Heart,
    Diabetes,
    /// No risk model: every parsed lab is returned, no score is produced.
    General,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::Heart, Task::Diabetes, Task::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heart => "heart",
            Self::Diabetes => "diabetes",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = SchemaError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Task::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| SchemaError::UnknownTask(s.trim().to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Numeric,
    Categorical,
    Boolean,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Boolean => "boolean",
        }
    }
}

/// Closed numeric interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Boundaries are inside the range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn halfwidth(&self) -> f64 {
        (self.max - self.min) / 2.0
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Multiply a value expressed in `unit` by `factor` to get the canonical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub unit: String,
    pub factor: f64,
}

/// One allowed value of a categorical field: the model code plus the
/// words a report may use for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOption {
    pub code: String,
    pub labels: Vec<String>,
}

/// A parsed feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Numeric(f64),
    Categorical(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Numeric(_) => DataType::Numeric,
            Self::Categorical(_) => DataType::Categorical,
            Self::Boolean(_) => DataType::Boolean,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Categorical(code) => f.write_str(code),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Field definition as written in a schema table or override file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub reference_range: Option<ValueRange>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub plausible_range: Option<ValueRange>,
    #[serde(default)]
    pub unit_conversions: Vec<UnitConversion>,
    #[serde(default)]
    pub categories: Vec<CategoryOption>,
}

/// Canonical definition of one feature of one task.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSchema {
    pub name: String,
    pub task: Task,
    pub data_type: DataType,
    pub unit: Option<String>,
    /// Lowercase, deduplicated; position is part of the extraction rule id.
    pub synonyms: Vec<String>,
    pub reference_range: Option<ValueRange>,
    pub required: bool,
    pub plausible_range: Option<ValueRange>,
    pub unit_conversions: Vec<UnitConversion>,
    pub categories: Vec<CategoryOption>,
}

impl FieldSchema {
    pub fn from_definition(task: Task, def: FieldDefinition) -> Result<Self, SchemaError> {
        let name = def.name.trim().to_string();
        if name.is_empty() {
            return Err(SchemaError::InvalidField {
                task,
                field: def.name,
                reason: "empty field name".into(),
            });
        }

        for (label, range) in [
            ("reference_range", &def.reference_range),
            ("plausible_range", &def.plausible_range),
        ] {
            if let Some(r) = range {
                if !r.is_valid() {
                    return Err(SchemaError::InvalidField {
                        task,
                        field: name,
                        reason: format!("{label} [{}, {}] is not a valid interval", r.min, r.max),
                    });
                }
            }
        }

        if def.data_type == DataType::Categorical && def.categories.is_empty() {
            return Err(SchemaError::InvalidField {
                task,
                field: name,
                reason: "categorical field without categories".into(),
            });
        }

        let mut synonyms: Vec<String> = Vec::new();
        for s in std::iter::once(&name).chain(def.synonyms.iter()) {
            let s = collapse_spaces(&s.to_lowercase());
            if !s.is_empty() && !synonyms.contains(&s) {
                synonyms.push(s);
            }
        }
        // Field name itself is the last-resort synonym, not the first.
        synonyms.rotate_left(1);

        let unit_conversions = def
            .unit_conversions
            .into_iter()
            .map(|c| UnitConversion {
                unit: normalize_unit(&c.unit),
                factor: c.factor,
            })
            .collect();

        let categories = def
            .categories
            .into_iter()
            .map(|c| CategoryOption {
                code: c.code.trim().to_string(),
                labels: c.labels.iter().map(|l| collapse_spaces(&l.to_lowercase())).collect(),
            })
            .collect();

        Ok(Self {
            name,
            task,
            data_type: def.data_type,
            unit: def.unit,
            synonyms,
            reference_range: def.reference_range,
            required: def.required,
            plausible_range: def.plausible_range,
            unit_conversions,
            categories,
        })
    }

    /// Map a category code or label to the category code.
    pub fn category_for(&self, text: &str) -> Option<&str> {
        let wanted = collapse_spaces(&text.trim().to_lowercase());
        self.categories
            .iter()
            .find(|c| c.code.to_lowercase() == wanted || c.labels.iter().any(|l| *l == wanted))
            .map(|c| c.code.as_str())
    }

    /// Coerce a user-supplied JSON value to this field's data type.
    /// Arrays use their first element; `null` means "no value" (`Some(None)`).
    /// `None` when the value cannot be read as this field's type.
    pub fn coerce_json(&self, value: &serde_json::Value) -> Option<Option<FieldValue>> {
        use serde_json::Value;

        let value = match value {
            Value::Array(items) => match items.first() {
                Some(v) => v,
                None => return Some(None),
            },
            other => other,
        };

        if value.is_null() {
            return Some(None);
        }

        let coerced = match (self.data_type, value) {
            (DataType::Numeric, Value::Number(n)) => n.as_f64().map(FieldValue::Numeric),
            (DataType::Numeric, Value::String(s)) => {
                parse_locale_number(s.trim()).map(FieldValue::Numeric)
            }
            (DataType::Categorical, Value::String(s)) => {
                self.category_for(s).map(|c| FieldValue::Categorical(c.to_string()))
            }
            (DataType::Categorical, Value::Number(n)) => self
                .category_for(&n.to_string())
                .map(|c| FieldValue::Categorical(c.to_string())),
            (DataType::Boolean, Value::Bool(b)) => Some(FieldValue::Boolean(*b)),
            (DataType::Boolean, Value::Number(n)) => match n.as_f64() {
                Some(v) if v == 1.0 => Some(FieldValue::Boolean(true)),
                Some(v) if v == 0.0 => Some(FieldValue::Boolean(false)),
                _ => None,
            },
            (DataType::Boolean, Value::String(s)) => parse_boolean_token(s).map(FieldValue::Boolean),
            _ => None,
        };

        coerced.map(Some)
    }
}

/// Boolean vocabulary shared by extraction and user input coercion.
pub const BOOLEAN_TOKENS: &[(&str, bool)] = &[
    ("yes", true),
    ("y", true),
    ("true", true),
    ("positive", true),
    ("pos", true),
    ("present", true),
    ("1", true),
    ("no", false),
    ("n", false),
    ("false", false),
    ("negative", false),
    ("neg", false),
    ("absent", false),
    ("none", false),
    ("0", false),
];

pub fn parse_boolean_token(token: &str) -> Option<bool> {
    let wanted = token.trim().to_lowercase();
    BOOLEAN_TOKENS
        .iter()
        .find(|(word, _)| *word == wanted)
        .map(|(_, value)| *value)
}

pub(crate) fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
