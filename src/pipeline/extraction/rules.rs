use std::fmt;

use serde::Serialize;

use super::confidence::rule_confidence;

/// Extraction strategies. Closed set; each carries a static confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ExactLabel,
    TableRow,
    Proximity,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactLabel => "exact_label",
            Self::TableRow => "table_row",
            Self::Proximity => "proximity",
        }
    }

    pub fn base_confidence(&self) -> f64 {
        match self {
            Self::ExactLabel => rule_confidence::EXACT_LABEL,
            Self::TableRow => rule_confidence::TABLE_ROW,
            Self::Proximity => rule_confidence::PROXIMITY,
        }
    }
}

/// Stable rule identifier: `<strategy>:<field>:<synonym-index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleId<'a> {
    pub strategy: Strategy,
    pub field: &'a str,
    pub synonym_index: usize,
}

impl fmt::Display for RuleId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.strategy.as_str(), self.field, self.synonym_index)
    }
}

/// Rule id attached to values supplied by the user.
pub const USER_INPUT_RULE_ID: &str = "user_input";
