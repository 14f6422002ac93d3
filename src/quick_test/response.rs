//! Parsing model completions into quick tests.
//!
//! Two stages, each testable on its own:
//! 1. [`extract_json_candidate`] finds the JSON object in the completion: a
//!    ```json fence first, then an untagged fence, else the first well-formed
//!    `{...}` in the text.
//! 2. [`parse_quick_test_response`] deserializes it leniently and checks the
//!    fields a usable quick test needs.

use super::types::{QuickTestProblem, QuickTestResult, TargetBars};
use crate::aggregate::{AggregatedWeakSpot, WeakSpotDifficulty};
use crate::config::GeneratorConfig;
use crate::error::EtudeError;
use serde::Deserialize;

fn response_error(message: impl Into<String>) -> EtudeError {
    EtudeError::ResponseError(message.into())
}

/// The first complete JSON object (matching braces) at the start of `s`
pub fn find_json_object(s: &str) -> Result<&str, EtudeError> {
    if !s.starts_with('{') {
        return Err(response_error("no JSON object found"));
    }

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&s[..=i]);
                }
            }
            _ => {}
        }
    }

    Err(response_error("unterminated JSON object"))
}

/// A fenced code block: its info string ("json", "abc" or empty) and body
struct Fence<'a> {
    info: &'a str,
    body: &'a str,
}

/// Every closed fenced code block, in order
fn fenced_blocks(content: &str) -> Vec<Fence<'_>> {
    let mut fences = Vec::new();
    let mut rest = content;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let Some(line_end) = after_fence.find('\n') else {
            break;
        };
        let body = &after_fence[line_end + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        fences.push(Fence {
            info: after_fence[..line_end].trim(),
            body: body[..close].trim(),
        });
        rest = &body[close + 3..];
    }
    fences
}

/// Locate the JSON object in a completion.
///
/// Fences tagged `json` are tried first, then untagged fences. Without a
/// usable fence the whole text is scanned for the first well-formed object,
/// so notation examples or prose around the answer are skipped.
pub fn extract_json_candidate(content: &str) -> Result<&str, EtudeError> {
    let fences = fenced_blocks(content);
    let tagged = fences.iter().filter(|f| f.info.eq_ignore_ascii_case("json"));
    let untagged = fences.iter().filter(|f| f.info.is_empty());
    for fence in tagged.chain(untagged) {
        if let Some(start) = fence.body.find('{') {
            return find_json_object(&fence.body[start..]);
        }
    }

    let text = content.trim();
    let mut last_error = response_error("no JSON object found");
    for (start, _) in text.match_indices('{') {
        match find_json_object(&text[start..]) {
            Ok(candidate) if serde_json::from_str::<serde_json::Value>(candidate).is_ok() => {
                return Ok(candidate);
            }
            Ok(_) => {}
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawQuickTest {
    title: Option<String>,
    description: Option<String>,
    problems: Option<Vec<RawProblem>>,
    estimated_time: Option<f64>,
    total_bars: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawProblem {
    problem_number: Option<u32>,
    title: Option<String>,
    instruction: Option<String>,
    #[serde(alias = "abc")]
    notation: Option<String>,
    target_bars: Option<TargetBars>,
    difficulty: Option<String>,
    estimated_time: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn positive(value: Option<f64>) -> Option<u32> {
    value.filter(|v| *v > 0.0).map(|v| v.round() as u32)
}

fn parse_difficulty(value: &str) -> Option<WeakSpotDifficulty> {
    match value.trim().to_ascii_lowercase().as_str() {
        "high" => Some(WeakSpotDifficulty::High),
        "medium" => Some(WeakSpotDifficulty::Medium),
        "low" => Some(WeakSpotDifficulty::Low),
        _ => None,
    }
}

fn build_problem(
    index: usize,
    raw: RawProblem,
    spots: &[AggregatedWeakSpot],
    config: &GeneratorConfig,
) -> Result<QuickTestProblem, EtudeError> {
    let missing = |field: &str| response_error(format!("problem {} is missing {}", index + 1, field));

    let problem_number = raw
        .problem_number
        .filter(|n| *n > 0)
        .ok_or_else(|| missing("problemNumber"))?;
    let title = non_empty(raw.title).ok_or_else(|| missing("title"))?;
    let instruction = non_empty(raw.instruction).ok_or_else(|| missing("instruction"))?;
    let notation = non_empty(raw.notation).ok_or_else(|| missing("notation"))?;
    let target_bars = raw.target_bars.ok_or_else(|| missing("targetBars"))?;

    // Fall back to the difficulty of the weak spot the problem targets
    let difficulty = raw
        .difficulty
        .as_deref()
        .and_then(parse_difficulty)
        .or_else(|| {
            spots
                .iter()
                .find(|s| s.start_bar == target_bars.start_bar && s.end_bar == target_bars.end_bar)
                .map(|s| s.difficulty)
        })
        .unwrap_or(WeakSpotDifficulty::Medium);

    Ok(QuickTestProblem {
        problem_number,
        title,
        instruction,
        notation,
        target_bars,
        difficulty,
        estimated_time: positive(raw.estimated_time).unwrap_or(config.default_problem_seconds),
    })
}

/// Parse a completion into a quick test. Every problem must carry a number,
/// title, instruction, notation and target bars; one bad problem rejects the
/// whole response.
pub fn parse_quick_test_response(
    content: &str,
    spots: &[AggregatedWeakSpot],
    config: &GeneratorConfig,
) -> Result<QuickTestResult, EtudeError> {
    let candidate = extract_json_candidate(content)?;
    let raw: RawQuickTest = serde_json::from_str(candidate)
        .map_err(|e| response_error(format!("malformed JSON: {}", e)))?;

    let title = non_empty(raw.title).ok_or_else(|| response_error("missing title"))?;
    let raw_problems = raw
        .problems
        .ok_or_else(|| response_error("missing problems list"))?;
    if raw_problems.is_empty() {
        return Err(response_error("problems list is empty"));
    }

    let problems = raw_problems
        .into_iter()
        .enumerate()
        .map(|(i, p)| build_problem(i, p, spots, config))
        .collect::<Result<Vec<_>, _>>()?;

    let total_bars = positive(raw.total_bars)
        .unwrap_or(problems.len() as u32 * config.bars_per_problem);

    Ok(QuickTestResult {
        title,
        description: raw.description.unwrap_or_default(),
        estimated_time: positive(raw.estimated_time).unwrap_or(config.default_estimated_minutes),
        total_bars,
        problems,
    })
}
