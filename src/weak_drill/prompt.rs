//! Prompt construction for weak-spot drills

use super::section::Section;
use super::types::WeakDrillParams;
use crate::analysis::NotationStatistics;

pub fn system_prompt(instrument: &str) -> String {
    format!(
        "You are an expert music educator specializing in {}. You create targeted practice \
         variations that help students master difficult passages through progressive \
         difficulty adjustment. Your variations maintain musical coherence while adjusting \
         technical demands.",
        instrument
    )
}

/// User prompt: the looped passage, how the student is doing on it, and the
/// three variations to write
pub fn build_weak_drill_prompt(
    params: &WeakDrillParams,
    section: &Section,
    stats: &NotationStatistics,
) -> String {
    let tempo = params.current_tempo;
    let difficulty = stats.difficulty_level;

    format!(
        r#"A student is struggling with bars {bars} from "{title}" on {instrument}.

**Original section:**
```abc
{notation}
```

**Current performance:**
- Tempo achieved: {tempo} BPM
- Target tempo: {target:.0} BPM
- Difficulty: {difficulty}
- Average leap: {leap:.1} semitones
- Note density: {density:.1} notes per bar

**Create 3 variations of this passage:**
1. SAME - the same difficulty ({difficulty}), rewritten to isolate the hardest moments
2. EASIER - one level easier ({easier}): simplify rhythms or leaps, lower the tempo by 10-20 BPM
3. HARDER - one level harder ({harder}): add technical demands, raise the tempo by 10-20 BPM

**Requirements:**
- Each variation must be exactly {bar_count} bars, the same length as the original
- Must include: X:, T:, M:, L:, Q:, K: headers
- Must be playable on {instrument}
- Keep the musical character of the original

**Response Format:**
Return a JSON object with this structure:
```json
{{
  "drills": {{
    "same": {{
      "title": "Focused Repetition",
      "description": "What this variation trains",
      "notation": "X:1\nT:...\n",
      "difficulty": "{difficulty}",
      "targetTempo": {tempo},
      "estimatedTime": 120,
      "focusPoints": ["First focus", "Second focus"]
    }},
    "easier": {{ "...": "same fields", "targetTempo": {easier_tempo}, "estimatedTime": 90 }},
    "harder": {{ "...": "same fields", "targetTempo": {harder_tempo}, "estimatedTime": 150 }}
  }}
}}
```"#,
        bars = section.bars,
        title = params.material_title,
        instrument = params.instrument,
        notation = section.notation,
        tempo = tempo,
        target = stats.tempo_qpm,
        difficulty = difficulty,
        easier = difficulty.easier(),
        harder = difficulty.harder(),
        leap = stats.leap_mean,
        density = stats.notes_per_measure,
        bar_count = section.bars.len(),
        easier_tempo = tempo.saturating_sub(20).max(60),
        harder_tempo = tempo.saturating_add(20),
    )
}
