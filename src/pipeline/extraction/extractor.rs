//! Rule-based field extraction.
//!
//! Every synonym of every field gets three rules (exact label, table row,
//! proximity). Patterns are compiled once per registry and shared.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::confidence::{clamp_confidence, rule_confidence};
use super::numeric::{parse_locale_number, NUMBER_PATTERN};
use super::rules::{RuleId, Strategy};
use super::sanitize::normalize_report_text;
use super::table_detect::split_cells;
use super::types::{CandidateObservation, SourceSpan};
use super::units::{is_known_unit, is_unit_for, resolve_unit, UnitResolution};
use super::ExtractionError;
use crate::schema::{
    collapse_spaces, DataType, FieldSchema, FieldValue, SchemaError, SchemaRegistry, Task,
    BOOLEAN_TOKENS,
};

/// How far past a synonym (in characters) a proximity rule looks for a value.
pub const PROXIMITY_WINDOW: usize = 40;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NUMBER_PATTERN).expect("valid regex"));

/// Unit-looking token right after a number.
static UNIT_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*([A-Za-zµμ%][A-Za-z0-9µμ/%²^]*)").expect("valid regex")
});

/// `Cholesterol (mmol/L)` in a table label cell.
static LABEL_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<label>.*?)[ \t]*\((?P<unit>[^)]{1,20})\)$").expect("valid regex")
});

struct SynonymRule {
    index: usize,
    synonym: String,
    exact: Regex,
    proximity: Regex,
    /// Longer synonyms (any field of the task) that contain this one.
    shadowed_by: Vec<String>,
}

struct FieldRules {
    field: FieldSchema,
    synonyms: Vec<SynonymRule>,
}

/// Value located inside a text segment, offsets relative to the segment.
struct Located {
    start: usize,
    end: usize,
    value: FieldValue,
    unit: Option<String>,
    unit_mismatch: bool,
}

/// Compiled extraction rules for every task of a registry.
pub struct FieldExtractor {
    tasks: HashMap<Task, Vec<FieldRules>>,
}

impl FieldExtractor {
    pub fn new(registry: &SchemaRegistry) -> Result<Self, ExtractionError> {
        let mut tasks = HashMap::new();
        for schema in registry.tasks() {
            let mut compiled = Vec::with_capacity(schema.len());
            for field in schema.fields() {
                let mut synonyms = Vec::with_capacity(field.synonyms.len());
                for (index, synonym) in field.synonyms.iter().enumerate() {
                    let shadowed_by = schema
                        .fields()
                        .flat_map(|other| other.synonyms.iter())
                        .filter(|longer| longer.len() > synonym.len() && longer.contains(synonym.as_str()))
                        .cloned()
                        .collect();
                    synonyms.push(SynonymRule {
                        index,
                        synonym: synonym.clone(),
                        exact: compile(&field.name, &exact_label_pattern(synonym))?,
                        proximity: compile(&field.name, &proximity_pattern(synonym))?,
                        shadowed_by,
                    });
                }
                compiled.push(FieldRules {
                    field: field.clone(),
                    synonyms,
                });
            }
            tasks.insert(schema.task, compiled);
        }
        Ok(Self { tasks })
    }

    /// Normalize `raw_text` and extract candidates for `task`.
    /// Spans refer to the normalized text.
    pub fn extract(&self, raw_text: &str, task: Task) -> Vec<CandidateObservation> {
        let text = normalize_report_text(raw_text);
        self.extract_normalized(&text, task)
    }

    /// Same as [`extract`](Self::extract) with a task id string.
    pub fn extract_for(
        &self,
        raw_text: &str,
        task_id: &str,
    ) -> Result<Vec<CandidateObservation>, SchemaError> {
        let task: Task = task_id.parse()?;
        Ok(self.extract(raw_text, task))
    }

    /// Extract from text that already went through [`normalize_report_text`].
    pub fn extract_normalized(&self, text: &str, task: Task) -> Vec<CandidateObservation> {
        let Some(fields) = self.tasks.get(&task) else {
            return Vec::new();
        };
        if text.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for rules in fields {
            for rule in &rules.synonyms {
                exact_label_matches(text, &rules.field, rule, &mut candidates);
                proximity_matches(text, &rules.field, rule, &mut candidates);
            }
        }
        table_row_matches(text, fields, &mut candidates);

        // Document order; stable so rule order breaks ties at one position.
        candidates.sort_by_key(|c| c.source_span.start);

        tracing::debug!(
            task = %task,
            text_length = text.len(),
            candidate_count = candidates.len(),
            "Field extraction complete"
        );
        candidates
    }
}

// ── patterns ────────────────────────────────────────────────

fn compile(field: &str, pattern: &str) -> Result<Regex, ExtractionError> {
    Regex::new(pattern).map_err(|source| ExtractionError::Pattern {
        field: field.to_string(),
        source,
    })
}

/// Synonym words, escaped, joined by flexible horizontal whitespace.
fn synonym_pattern(synonym: &str) -> String {
    synonym
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"[ \t]+")
}

fn exact_label_pattern(synonym: &str) -> String {
    format!(
        r"(?im)(?:^|[;|\t]|,[ \t]*|[ ]{{2,}})[ \t*•-]*{}(?:[ \t]*\((?P<label_unit>[^)\n]{{1,20}})\))?[ \t]*[:=][ \t]*(?P<value>[^;|\t\n]*)",
        synonym_pattern(synonym)
    )
}

fn proximity_pattern(synonym: &str) -> String {
    let starts_word = synonym.chars().next().is_some_and(|c| c.is_alphanumeric());
    let ends_word = synonym.chars().last().is_some_and(|c| c.is_alphanumeric());
    format!(
        "(?i){}{}{}",
        if starts_word { r"\b" } else { "" },
        synonym_pattern(synonym),
        if ends_word { r"\b" } else { "" },
    )
}

// ── strategies ──────────────────────────────────────────────

fn exact_label_matches(
    text: &str,
    field: &FieldSchema,
    rule: &SynonymRule,
    out: &mut Vec<CandidateObservation>,
) {
    for caps in rule.exact.captures_iter(text) {
        let Some(value) = caps.name("value") else {
            continue;
        };
        let label_unit = caps.name("label_unit").map(|m| m.as_str().trim());
        if let Some(found) = locate_value(field, value.as_str(), label_unit, None) {
            out.push(candidate(text, field, rule, Strategy::ExactLabel, value.start(), found));
        }
    }
}

fn table_row_matches(text: &str, fields: &[FieldRules], out: &mut Vec<CandidateObservation>) {
    let mut line_start = 0;
    for line in text.split('\n') {
        if let Some(cells) = split_cells(line) {
            let (label, label_unit) = split_label_unit(cells[0].text);
            let value_cell = cells[1];
            let unit_hint = cells
                .get(2)
                .map(|c| c.text)
                .filter(|t| is_known_unit(t))
                .or(label_unit);

            for rules in fields {
                for rule in rules.synonyms.iter().filter(|r| r.synonym == label) {
                    if let Some(found) = locate_value(&rules.field, value_cell.text, unit_hint, None) {
                        let offset = line_start + value_cell.offset;
                        out.push(candidate(text, &rules.field, rule, Strategy::TableRow, offset, found));
                    }
                }
            }
        }
        line_start += line.len() + 1;
    }
}

fn proximity_matches(
    text: &str,
    field: &FieldSchema,
    rule: &SynonymRule,
    out: &mut Vec<CandidateObservation>,
) {
    for m in rule.proximity.find_iter(text) {
        if is_shadowed(text, m.start(), &rule.synonym, &rule.shadowed_by) {
            continue;
        }
        let rest = &text[m.end()..];
        let segment_end = rest.find(['\n', ';', '|', '\t']).unwrap_or(rest.len());
        let segment = &rest[..segment_end];
        if let Some(found) = locate_value(field, segment, None, Some(PROXIMITY_WINDOW)) {
            out.push(candidate(text, field, rule, Strategy::Proximity, m.end(), found));
        }
    }
}

/// A synonym occurrence inside a longer synonym belongs to the longer one
/// (`HDL cholesterol` is not `cholesterol`).
fn is_shadowed(text: &str, start: usize, synonym: &str, longer: &[String]) -> bool {
    longer.iter().any(|other| {
        other.match_indices(synonym).any(|(k, _)| {
            start
                .checked_sub(k)
                .and_then(|s| text.get(s..s + other.len()))
                .is_some_and(|t| t.eq_ignore_ascii_case(other))
        })
    })
}

fn split_label_unit(cell: &str) -> (String, Option<&str>) {
    let cell = cell.trim().trim_end_matches([':', '=']).trim_end();
    match LABEL_UNIT_RE.captures(cell) {
        Some(caps) => {
            let label = caps.name("label").map_or("", |m| m.as_str());
            let unit = caps.name("unit").map(|m| m.as_str().trim());
            (collapse_spaces(&label.to_lowercase()), unit)
        }
        None => (collapse_spaces(&cell.to_lowercase()), None),
    }
}

// ── value parsing ───────────────────────────────────────────

/// Find the field's value in `segment`. With `window`, the value must start
/// within that many characters of the segment start.
fn locate_value(
    field: &FieldSchema,
    segment: &str,
    unit_hint: Option<&str>,
    window: Option<usize>,
) -> Option<Located> {
    let within = |pos: usize| window.map_or(true, |w| segment[..pos].chars().count() <= w);

    match field.data_type {
        DataType::Numeric => {
            let m = NUMBER_RE.find(segment)?;
            if !within(m.start()) {
                return None;
            }
            let number = parse_locale_number(m.as_str())?;
            let trailing = UNIT_TOKEN_RE
                .captures(&segment[m.end()..])
                .and_then(|c| c.get(1))
                .map(|u| u.as_str())
                .filter(|u| is_unit_for(u, field));

            let (value, unit, unit_mismatch) =
                match resolve_unit(number, trailing.or(unit_hint), field) {
                    UnitResolution::Assumed(v) | UnitResolution::Converted { value: v, .. } => {
                        (v, field.unit.clone(), false)
                    }
                    UnitResolution::Unconvertible { unit } => (number, Some(unit), true),
                };

            Some(Located {
                start: m.start(),
                end: m.end(),
                value: FieldValue::Numeric(value),
                unit,
                unit_mismatch,
            })
        }
        DataType::Categorical => {
            let options = field.categories.iter().flat_map(|c| {
                std::iter::once((c.code.to_lowercase(), c.code.as_str()))
                    .chain(c.labels.iter().map(move |l| (l.clone(), c.code.as_str())))
            });
            let (start, len, code) = earliest_word(segment, options)?;
            within(start).then(|| Located {
                start,
                end: start + len,
                value: FieldValue::Categorical(code.to_string()),
                unit: None,
                unit_mismatch: false,
            })
        }
        DataType::Boolean => {
            let options = BOOLEAN_TOKENS.iter().map(|(w, b)| (w.to_string(), *b));
            let (start, len, value) = earliest_word(segment, options)?;
            within(start).then(|| Located {
                start,
                end: start + len,
                value: FieldValue::Boolean(value),
                unit: None,
                unit_mismatch: false,
            })
        }
    }
}

/// Earliest whole-word occurrence of any option; longest wins at one position.
fn earliest_word<T, I>(segment: &str, options: I) -> Option<(usize, usize, T)>
where
    I: IntoIterator<Item = (String, T)>,
{
    let haystack = segment.to_ascii_lowercase();
    let mut best: Option<(usize, usize, T)> = None;

    for (word, value) in options {
        if word.is_empty() {
            continue;
        }
        let hit = haystack
            .match_indices(word.as_str())
            .map(|(pos, _)| pos)
            .find(|&pos| is_word_at(&haystack, pos, word.len()));
        if let Some(pos) = hit {
            let better = match &best {
                None => true,
                Some((p, l, _)) => pos < *p || (pos == *p && word.len() > *l),
            };
            if better {
                best = Some((pos, word.len(), value));
            }
        }
    }
    best
}

fn is_word_at(haystack: &str, pos: usize, len: usize) -> bool {
    let before = haystack[..pos].chars().next_back();
    let after = haystack[pos + len..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

fn candidate(
    text: &str,
    field: &FieldSchema,
    rule: &SynonymRule,
    strategy: Strategy,
    segment_offset: usize,
    found: Located,
) -> CandidateObservation {
    let start = segment_offset + found.start;
    let end = segment_offset + found.end;
    let confidence = if found.unit_mismatch {
        rule_confidence::UNIT_MISMATCH
    } else {
        strategy.base_confidence()
    };
    let rule_id = RuleId {
        strategy,
        field: &field.name,
        synonym_index: rule.index,
    };

    CandidateObservation {
        field_name: field.name.clone(),
        raw_value: text[start..end].to_string(),
        parsed_value: found.value,
        unit: found.unit,
        confidence: clamp_confidence(confidence),
        source_span: SourceSpan::locate(text, start, end),
        extraction_rule_id: rule_id.to_string(),
    }
}
