//! Cutting a bar range out of a tune.
//!
//! Bars are counted the way a player counts them: every non-empty stretch
//! between barlines, across lines, with repeat signs and ending numbers
//! stripped. The section keeps the tune's header fields, renumbered `X:1`,
//! and carries the key in force at its first bar.

use super::types::BarRange;
use crate::error::EtudeError;
use crate::parser::{is_field_line, split_header};

/// A standalone tune holding only the selected bars
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub notation: String,
    /// The bars actually taken; the end is clamped to the tune's length
    pub bars: BarRange,
}

struct Bar<'a> {
    notes: &'a str,
    key: &'a str,
}

fn strip_ending_number(fragment: &str) -> &str {
    let rest = match fragment.strip_prefix('[') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => fragment,
    };
    if !rest.starts_with(|c: char| c.is_ascii_digit()) {
        return fragment;
    }
    rest.trim_start_matches(|c: char| c.is_ascii_digit() || c == ',' || c == '-')
        .trim()
}

fn split_bars<'a>(body: &'a str, header_key: &'a str) -> Vec<Bar<'a>> {
    let mut bars = Vec::new();
    let mut key = header_key;

    for raw_line in body.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        if is_field_line(line) {
            if let Some(value) = line.strip_prefix("K:") {
                key = value.trim();
            }
            continue;
        }

        let line = line.split_once('%').map_or(line, |(notes, _)| notes);
        for fragment in line.split('|') {
            let trimmed = fragment.trim_matches(|c: char| c.is_whitespace() || c == ':');
            let notes = strip_ending_number(trimmed);
            if notes.is_empty() || notes == "]" || notes == "[" {
                continue;
            }
            bars.push(Bar { notes, key });
        }
    }

    bars
}

/// Extract bars `start..=end` (counted from 1) as a tune of their own.
///
/// # Example
/// ```
/// use etude::weak_drill::extract_section;
///
/// let tune = "X:7\nT:Study\nM:4/4\nL:1/4\nK:G\nG A B c | d e f g | g f e d |]";
/// let section = extract_section(tune, 2, 3).unwrap();
/// assert_eq!(section.notation, "X:1\nT:Study\nM:4/4\nL:1/4\nK:G\nd e f g | g f e d |");
/// ```
pub fn extract_section(source: &str, start: u32, end: u32) -> Result<Section, EtudeError> {
    if start == 0 || end < start {
        return Err(EtudeError::BarRange(format!(
            "bars {}-{} do not form a range",
            start, end
        )));
    }

    let split = split_header(source);
    let Some(header_key) = split
        .fields
        .iter()
        .rev()
        .find(|(letter, _)| *letter == 'K')
        .map(|&(_, value)| value)
    else {
        return Err(EtudeError::HeaderError("missing K: field".to_string()));
    };

    let bars = split_bars(split.body, header_key);
    let first = start as usize - 1;
    if first >= bars.len() {
        return Err(EtudeError::BarRange(format!(
            "bars {}-{} but the tune has {}",
            start,
            end,
            bars.len()
        )));
    }
    let last = (end as usize).min(bars.len());
    let selected = &bars[first..last];

    let mut lines = vec!["X:1".to_string()];
    lines.extend(
        split
            .fields
            .iter()
            .filter(|(letter, _)| !matches!(*letter, 'X' | 'K'))
            .map(|(letter, value)| format!("{}:{}", letter, value)),
    );
    lines.push(format!("K:{}", selected[0].key));

    let mut key = selected[0].key;
    let measures: Vec<String> = selected
        .iter()
        .map(|bar| {
            if bar.key == key {
                bar.notes.to_string()
            } else {
                key = bar.key;
                format!("[K:{}] {}", key, bar.notes)
            }
        })
        .collect();

    Ok(Section {
        notation: format!("{}\n{} |", lines.join("\n"), measures.join(" | ")),
        bars: BarRange {
            start,
            end: last as u32,
        },
    })
}
