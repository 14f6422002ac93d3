use super::*;
use crate::analysis::DifficultyLevel;
use crate::config::GeneratorConfig;
use crate::error::EtudeError;
use crate::services::LexicalValidator;
use crate::testing::{capture_logs, FakeModel, ScriptedValidator};

const SOURCE: &str = "X:4\nT:Gavotte\nM:4/4\nL:1/4\nQ:1/4=96\nK:G\nG A B c | d e d c | B A G A | B2 G2 |\nc B A G | A B c d | e d c B | G4 |]";
const GOOD_DRILL: &str = "X:1\\nT:Drill\\nM:4/4\\nL:1/4\\nQ:1/4=80\\nK:G\\nd e d c | B A G A |";
const WIDE_DRILL: &str = "X:1\\nT:Leaps\\nM:4/4\\nL:1/4\\nK:C\\nC,, c' C,, c' | ^C,, _c' ^C,, _c' |";

fn params(start: u32, end: u32) -> WeakDrillParams {
    WeakDrillParams {
        source_notation: SOURCE.to_string(),
        loop_start_bar: start,
        loop_end_bar: end,
        instrument: "violin".to_string(),
        current_tempo: 80,
        material_title: "Gavotte".to_string(),
    }
}

fn variation(title: &str, notation: &str) -> String {
    format!(
        r#"{{"title": "{}", "description": "Loop it slowly", "notation": "{}", "focusPoints": ["Even quarters"]}}"#,
        title, notation
    )
}

fn completion(same: &str, easier: &str, harder: &str) -> String {
    format!(
        "Here are the drills:\n```json\n{{\"drills\": {{\"same\": {}, \"easier\": {}, \"harder\": {}}}}}\n```",
        variation("Same", same),
        variation("Easier", easier),
        variation("Harder", harder)
    )
}

#[test]
fn test_generate_success() {
    let model = FakeModel::answering(completion(GOOD_DRILL, GOOD_DRILL, GOOD_DRILL));
    let generator = WeakDrillGenerator::new(&model, &LexicalValidator, GeneratorConfig::default());

    let result = generator.generate(&params(2, 3)).unwrap();
    assert_eq!(model.calls.get(), 1);
    assert_eq!(result.title, "Weak Spot Drill: Bars 2-3");
    assert_eq!(result.original_section.bars, BarRange { start: 2, end: 3 });
    assert!(result
        .original_section
        .notation
        .ends_with("K:G\nd e d c | B A G A |"));
    assert_eq!(result.original_section.analysis.measure_count, 2);
    assert_eq!(
        result.original_section.difficulty,
        result.original_section.analysis.difficulty_level
    );
    assert_eq!(result.drills.same.title, "Same");
    assert_eq!(result.drills.easier.target_tempo, 60);
    assert_eq!(result.drills.harder.target_tempo, 100);
    assert_eq!(result.drills.harder.focus_points, vec!["Even quarters".to_string()]);
}

#[test]
fn test_request_carries_section_and_budget() {
    let config = GeneratorConfig {
        temperature: 0.4,
        drill_max_tokens: 1800,
        ..GeneratorConfig::default()
    };
    let model = FakeModel::answering(completion(GOOD_DRILL, GOOD_DRILL, GOOD_DRILL));
    let generator = WeakDrillGenerator::new(&model, &LexicalValidator, config);
    generator.generate(&params(5, 6)).unwrap();

    let request = model.request();
    assert_eq!(request.temperature, 0.4);
    assert_eq!(request.max_tokens, 1800);
    assert!(request.system_prompt.contains("specializing in violin"));
    assert!(request.user_prompt.contains("bars 5-6 from \"Gavotte\""));
    assert!(request.user_prompt.contains("c B A G | A B c d |"));
    assert!(request.user_prompt.contains("Tempo achieved: 80 BPM"));
}

#[test]
fn test_harder_variation_rejected() {
    let broken = GOOD_DRILL.replace("T:Drill", "T:BROKEN");
    let model = FakeModel::answering(completion(GOOD_DRILL, GOOD_DRILL, &broken));
    let validator = ScriptedValidator::rejecting("BROKEN");
    let generator = WeakDrillGenerator::new(&model, &validator, GeneratorConfig::default());

    match generator.try_generate(&params(2, 3)) {
        Err(EtudeError::SyntaxError { problem, message }) => {
            assert_eq!(problem, 3);
            assert_eq!(message, "unexpected token");
        }
        other => panic!("Expected SyntaxError, got {:?}", other),
    }
    assert_eq!(validator.calls.get(), 3);

    let (result, logs) = capture_logs(|| generator.generate(&params(2, 3)));
    assert!(result.is_none());
    assert!(logs.contains("variation=harder"));
}

#[test]
fn test_first_invalid_variation_stops_validation() {
    let broken = GOOD_DRILL.replace("T:Drill", "T:BROKEN");
    let model = FakeModel::answering(completion(&broken, GOOD_DRILL, GOOD_DRILL));
    let validator = ScriptedValidator::rejecting("BROKEN");
    let generator = WeakDrillGenerator::new(&model, &validator, GeneratorConfig::default());

    assert!(matches!(
        generator.try_generate(&params(2, 3)),
        Err(EtudeError::SyntaxError { problem: 1, .. })
    ));
    assert_eq!(validator.calls.get(), 1);
}

#[test]
fn test_bad_section_skips_model() {
    let model = FakeModel::answering(completion(GOOD_DRILL, GOOD_DRILL, GOOD_DRILL));
    let validator = ScriptedValidator::accepting();
    let generator = WeakDrillGenerator::new(&model, &validator, GeneratorConfig::default());

    assert!(matches!(
        generator.try_generate(&params(12, 14)),
        Err(EtudeError::BarRange(_))
    ));
    assert!(generator.generate(&params(4, 2)).is_none());

    let mut no_key = params(1, 2);
    no_key.source_notation = "X:1\nT:Keyless\nC D E F | G A B c |".to_string();
    assert!(matches!(
        generator.try_generate(&no_key),
        Err(EtudeError::HeaderError(_))
    ));

    assert_eq!(model.calls.get(), 0);
    assert_eq!(validator.calls.get(), 0);
}

#[test]
fn test_malformed_response() {
    for content in [
        "I'd suggest slowing down.",
        "{\"drills\": {\"same\": {\"title\": \"Only one\", \"notation\": \"X:1\\nK:C\\nC |\"}}}",
        "```json\n{\"drills\": {\n```",
        "",
    ] {
        let model = FakeModel::answering(content);
        let generator =
            WeakDrillGenerator::new(&model, &LexicalValidator, GeneratorConfig::default());
        assert!(generator.generate(&params(2, 3)).is_none());
        assert_eq!(model.calls.get(), 1);
    }
}

#[test]
fn test_model_failure() {
    let model = FakeModel::failing("timeout");
    let generator = WeakDrillGenerator::new(&model, &LexicalValidator, GeneratorConfig::default());
    match generator.try_generate(&params(2, 3)) {
        Err(EtudeError::LanguageModel(message)) => assert_eq!(message, "timeout"),
        other => panic!("Expected LanguageModel error, got {:?}", other),
    }
}

#[test]
fn test_low_quality_variation_is_kept() {
    let model = FakeModel::answering(completion(GOOD_DRILL, GOOD_DRILL, WIDE_DRILL));
    let generator = WeakDrillGenerator::new(&model, &LexicalValidator, GeneratorConfig::default());

    let (result, logs) = capture_logs(|| generator.generate(&params(2, 3)));
    let result = result.unwrap();
    assert!(result.drills.harder.notation.contains("c'"));
    assert!(logs.contains("drill variation below soft quality threshold"));
    assert!(logs.contains("variation=harder"));
    assert!(logs.contains("weak-spot drill generated"));
}

#[test]
fn test_result_serializes_camel_case() {
    let model = FakeModel::answering(completion(GOOD_DRILL, GOOD_DRILL, GOOD_DRILL));
    let generator = WeakDrillGenerator::new(&model, &LexicalValidator, GeneratorConfig::default());
    let result = generator.generate(&params(1, 2)).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["originalSection"]["bars"]["start"], 1);
    assert_eq!(json["drills"]["easier"]["estimatedTime"], 90);
    assert_eq!(json["drills"]["same"]["difficulty"], result.drills.same.difficulty.as_str());
}

#[test]
fn test_difficulty_defaults_follow_section() {
    let model = FakeModel::answering(completion(GOOD_DRILL, GOOD_DRILL, GOOD_DRILL));
    let generator = WeakDrillGenerator::new(&model, &LexicalValidator, GeneratorConfig::default());
    let result = generator.generate(&params(2, 3)).unwrap();

    let level: DifficultyLevel = result.original_section.difficulty;
    assert_eq!(result.drills.same.difficulty, level);
    assert_eq!(result.drills.easier.difficulty, level.easier());
    assert_eq!(result.drills.harder.difficulty, level.harder());
}
