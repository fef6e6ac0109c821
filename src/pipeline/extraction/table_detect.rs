/// One cell of a table row: byte offset within the line plus trimmed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell<'a> {
    pub offset: usize,
    pub text: &'a str,
}

/// Heuristic: a line looks tabular if it has columns separated by tabs,
/// pipes, or multi-space gaps.
///
/// Patterns detected:
/// - Tab-separated: "Cholesterol\t260\tmg/dL"
/// - Pipe-separated: "| Glucose | 5.6 | mmol/L |"
/// - Multi-space aligned: "Potassium    4.2    mmol/L"
pub fn is_tabular_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.len() < 3 {
        return false;
    }

    if trimmed.contains('\t') {
        return true;
    }

    if trimmed.trim_matches('|').contains('|') {
        return true;
    }

    count_multi_space_gaps(trimmed) >= 1
}

/// Count runs of 2+ consecutive spaces that separate non-empty text segments.
fn count_multi_space_gaps(text: &str) -> usize {
    let mut count = 0;
    let mut in_gap = false;
    let mut gap_len = 0;

    for ch in text.trim().chars() {
        if ch == ' ' {
            gap_len += 1;
            if gap_len >= 2 && !in_gap {
                in_gap = true;
                count += 1;
            }
        } else {
            in_gap = false;
            gap_len = 0;
        }
    }

    count
}

/// Split a tabular line into non-empty cells.
/// Returns `None` when the line is not tabular or has fewer than two cells.
pub fn split_cells(line: &str) -> Option<Vec<Cell<'_>>> {
    if !is_tabular_line(line) {
        return None;
    }

    let bytes = line.as_bytes();
    let mut cells = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let sep_len = match bytes[i] {
            b'\t' | b'|' => 1,
            b' ' if bytes.get(i + 1) == Some(&b' ') => {
                bytes[i..].iter().take_while(|&&b| b == b' ').count()
            }
            _ => 0,
        };
        if sep_len == 0 {
            i += 1;
            continue;
        }
        push_cell(line, start, i, &mut cells);
        i += sep_len;
        start = i;
    }
    push_cell(line, start, line.len(), &mut cells);

    (cells.len() >= 2).then_some(cells)
}

fn push_cell<'a>(line: &'a str, start: usize, end: usize, cells: &mut Vec<Cell<'a>>) {
    let raw = &line[start..end];
    let text = raw.trim();
    if text.is_empty() {
        return;
    }
    let lead = raw.len() - raw.trim_start().len();
    cells.push(Cell {
        offset: start + lead,
        text,
    });
}
