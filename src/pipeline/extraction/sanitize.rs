/// Normalize report text before extraction.
/// Drops NUL and control characters (tabs and newlines survive), unifies line
/// endings, trims each line and removes blank lines. Interior spacing is kept
/// because column alignment carries table structure.
pub fn normalize_report_text(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n'))
        .collect::<String>()
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
