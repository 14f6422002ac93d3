//! Prompt construction for quick test generation

use super::types::QuickTestParams;
use crate::aggregate::AggregatedWeakSpot;

pub fn system_prompt(instrument: &str) -> String {
    format!(
        "You are an expert music educator specializing in {}. You create focused practice \
         exercises that target specific technical challenges. Your exercises are pedagogically \
         sound, progressively challenging, and designed to be completed in 5 minutes.",
        instrument
    )
}

fn describe_spot(index: usize, spot: &AggregatedWeakSpot) -> String {
    format!(
        "{}. Bars {}-{} (Difficulty: {}, {} students struggling, avg {:.1} loops)",
        index + 1,
        spot.start_bar,
        spot.end_bar,
        spot.difficulty,
        spot.affected_student_count,
        spot.avg_loop_count
    )
}

/// User prompt listing the selected weak spots and the response contract
pub fn build_quick_test_prompt(
    params: &QuickTestParams,
    spots: &[AggregatedWeakSpot],
    bars_per_problem: u32,
) -> String {
    let spots_description = spots
        .iter()
        .enumerate()
        .map(|(i, spot)| describe_spot(i, spot))
        .collect::<Vec<_>>()
        .join("\n");
    let instrument = &params.instrument;
    let tempo = params.target_tempo;
    let example_total = spots.len() as u32 * bars_per_problem;

    format!(
        r#"Create a 5-minute quick test for students learning "{title}" on {instrument}.

**Weak spots identified in class:**
{spots_description}

**Requirements:**
- Generate {count} practice problems, one for each weak spot
- Each problem should be exactly {bars} bars long
- Target tempo: {tempo} BPM
- Difficulty level: {difficulty}
- Problems should progressively build on each other
- Use ABC notation format
- Focus on the specific technical challenges in each weak spot

**For each problem, provide:**
1. Problem number (1, 2, 3, etc.)
2. Title (e.g., "Arpeggio Practice")
3. Instruction (1-2 sentences explaining what to focus on)
4. ABC notation ({bars} bars, proper ABC format with headers)
5. Target bars (same as the weak spot bars)
6. Estimated time in seconds (60-90 seconds per problem)

**ABC Format Requirements:**
- Must include: X:, T:, M:, L:, Q:, K: headers
- Must be exactly {bars} bars
- Must be playable on {instrument}
- Tempo should be around {tempo} BPM

**Response Format:**
Return a JSON object with this structure:
```json
{{
  "title": "Quick Test: {title}",
  "description": "5-minute practice focusing on class weak spots",
  "problems": [
    {{
      "problemNumber": 1,
      "title": "Problem title",
      "instruction": "What to focus on",
      "notation": "X:1\nT:...\n",
      "targetBars": {{ "startBar": 1, "endBar": {bars} }},
      "difficulty": "high",
      "estimatedTime": 75
    }}
  ],
  "estimatedTime": 5,
  "totalBars": {example_total}
}}
```"#,
        title = params.material_title,
        instrument = instrument,
        spots_description = spots_description,
        count = spots.len(),
        bars = bars_per_problem,
        tempo = tempo,
        difficulty = params.difficulty,
        example_total = example_total,
    )
}
