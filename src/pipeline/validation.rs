//! Range validation of resolved values.
//! Reference ranges flag clinically abnormal values; plausible ranges catch
//! values no patient can have, which usually means an extraction error.

use std::collections::BTreeSet;

use super::reconcile::ResolvedMap;
use crate::schema::TaskSchema;

/// Fields whose numeric value lies strictly outside the reference range.
/// Boundaries are inside. Categorical, boolean and range-less fields are
/// never flagged.
pub fn validate(resolved: &ResolvedMap, schema: &TaskSchema) -> BTreeSet<String> {
    resolved
        .values()
        .filter_map(|r| {
            let field = schema.get(&r.field_name)?;
            let range = field.reference_range?;
            let value = r.value.as_f64()?;
            (!range.contains(value)).then(|| r.field_name.clone())
        })
        .collect()
}

/// One warning per numeric value outside its plausible range.
/// Warnings never change triage.
pub fn plausibility_warnings(resolved: &ResolvedMap, schema: &TaskSchema) -> Vec<String> {
    let mut warnings = Vec::new();

    for field in schema.fields() {
        let Some(resolved_field) = resolved.get(&field.name) else {
            continue;
        };
        let (Some(range), Some(value)) = (field.plausible_range, resolved_field.value.as_f64())
        else {
            continue;
        };
        if !range.contains(value) {
            warnings.push(format!(
                "Implausible {} value {value} (expected {}-{}{}); check the source report",
                field.name,
                range.min,
                range.max,
                field.unit.as_deref().map(|u| format!(" {u}")).unwrap_or_default(),
            ));
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(
            task = %schema.task,
            warning_count = warnings.len(),
            "Implausible extracted values"
        );
    }

    warnings
}
