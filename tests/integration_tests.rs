//! Integration tests for the etude engine
//!
//! Drives the public API end to end: telemetry store to aggregation, quick
//! test and weak-spot drill generation with fake ports, and re-analysis
//! through the quality gate.

use etude::quick_test::QuickTestParams;
use etude::services::LexicalValidator;
use etude::telemetry::{LoopEvent, MaterialTelemetry, PracticeRecord};
use etude::weak_drill::{WeakDrillGenerator, WeakDrillParams};
use etude::{
    analyze, check_quality_gate, passes_quality_gate, score_and_gate, CompletionRequest,
    DifficultyLevel, EngineConfig, EtudeError, InMemoryTelemetry, LanguageModel,
    NotationValidator, QualityStatus, QuickTestGenerator, WeakSpotAggregator, WeakSpotDifficulty,
    QUALITY_THRESHOLD,
};
use std::cell::Cell;

const GOOD_TUNE: &str = "X:1\nT:Warm-up\nM:4/4\nL:1/4\nQ:1/4=100\nK:C\nC D E F | G A G F | C D E F | E D C D |";

struct CountingModel {
    completion: String,
    calls: Cell<usize>,
}

impl CountingModel {
    fn new(completion: impl Into<String>) -> Self {
        Self {
            completion: completion.into(),
            calls: Cell::new(0),
        }
    }
}

impl LanguageModel for CountingModel {
    fn complete(&self, _request: &CompletionRequest) -> Result<String, EtudeError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.completion.clone())
    }
}

/// Fails the n-th validation (1-based), accepts everything else
struct FailNth {
    n: usize,
    seen: Cell<usize>,
}

impl NotationValidator for FailNth {
    fn validate(&self, _notation: &str) -> Result<(), String> {
        self.seen.set(self.seen.get() + 1);
        if self.seen.get() == self.n {
            Err("bar 3 has too many beats".to_string())
        } else {
            Ok(())
        }
    }
}

fn loop_event(start_bar: u32, end_bar: u32, loop_count: u32) -> LoopEvent {
    LoopEvent {
        start_bar,
        end_bar,
        loop_count,
        last_practiced_at: "2024-03-01T10:00:00Z".to_string(),
    }
}

fn record(student: &str, events: Vec<LoopEvent>) -> PracticeRecord {
    PracticeRecord {
        student_id: student.to_string(),
        instrument: Some("piano".to_string()),
        target_tempo: Some(96),
        weak_spots: Some(events),
    }
}

fn class_store() -> InMemoryTelemetry {
    InMemoryTelemetry::new().with_material(MaterialTelemetry {
        material_id: "minuet".to_string(),
        title: "Minuet in G".to_string(),
        class_ids: vec![],
        records: vec![
            record("s1", vec![loop_event(1, 4, 5), loop_event(9, 12, 6)]),
            record("s2", vec![loop_event(1, 4, 3), loop_event(9, 12, 6)]),
            record("s3", vec![loop_event(13, 16, 1)]),
            record("s4", vec![loop_event(17, 20, 1)]),
        ],
    })
}

fn tune_json(notation: &str) -> String {
    notation.replace('\n', "\\n")
}

fn problem(number: u32, start_bar: u32, end_bar: u32) -> String {
    format!(
        r#"{{"problemNumber": {}, "title": "Drill {}", "instruction": "Keep it even.", "notation": "{}", "targetBars": {{"startBar": {}, "endBar": {}}}}}"#,
        number,
        number,
        tune_json(GOOD_TUNE),
        start_bar,
        end_bar
    )
}

fn completion(problems: &[String]) -> String {
    format!(
        "Sure! Here it is:\n```json\n{{\"title\": \"Quick Test: Minuet in G\", \"description\": \"Class weak spots\", \"problems\": [{}]}}\n```",
        problems.join(",\n")
    )
}

#[test]
fn test_aggregate_class_from_store() {
    let store = class_store();
    let class_ids: Vec<String> = ["s1", "s2", "s3", "s4"].iter().map(|s| s.to_string()).collect();
    let aggregation = WeakSpotAggregator::default()
        .aggregate_class(&store, "minuet", &class_ids)
        .unwrap();

    assert_eq!(aggregation.material_title, "Minuet in G");
    assert_eq!(aggregation.total_students, 4);
    assert_eq!(aggregation.students_with_metrics, 4);
    assert_eq!(aggregation.instrument, "piano");
    assert_eq!(aggregation.target_tempo, 96);

    // (9,12): 2 of 4 students, 6 loops each
    let first = &aggregation.top_weak_spots[0];
    assert_eq!((first.start_bar, first.end_bar), (9, 12));
    assert_eq!(first.difficulty, WeakSpotDifficulty::High);

    // (1,4): loops 5 and 3 from 2 of 4 students
    let second = &aggregation.top_weak_spots[1];
    assert_eq!((second.start_bar, second.end_bar), (1, 4));
    assert_eq!(second.total_loop_count, 8);
    assert_eq!(second.affected_student_count, 2);
    assert_eq!(second.avg_loop_count, 4.0);
    assert_eq!(second.difficulty, WeakSpotDifficulty::Medium);
}

#[test]
fn test_aggregate_class_failures() {
    let store = class_store();
    let aggregator = WeakSpotAggregator::default();
    assert!(aggregator.aggregate_class(&store, "minuet", &[]).is_none());
    assert!(aggregator
        .aggregate_class(&store, "unknown", &["s1".to_string()])
        .is_none());
    assert!(aggregator
        .aggregate_class(&store, "minuet", &["nobody".to_string()])
        .is_none());
}

#[test]
fn test_telemetry_fixture_json() {
    let json = r#"{
        "materialId": "gavotte",
        "title": "Gavotte",
        "records": [
            {"studentId": "a", "instrument": "violin", "targetTempo": 80,
             "weakSpots": [{"startBar": 5, "endBar": 8, "loopCount": 7}]},
            {"studentId": "b", "weakSpots": null}
        ]
    }"#;
    let store = InMemoryTelemetry::from_json(json).unwrap();
    let material = &store.materials()[0];
    let aggregation = WeakSpotAggregator::default()
        .aggregate_class(&store, &material.material_id, &material.cohort())
        .unwrap();
    assert_eq!(aggregation.total_students, 2);
    assert_eq!(aggregation.students_with_metrics, 1);
    assert_eq!(aggregation.instrument, "violin");
    assert_eq!(aggregation.target_tempo, 80);
}

#[test]
fn test_full_pipeline() {
    let store = class_store();
    let material = &store.materials()[0];
    let aggregation = WeakSpotAggregator::default()
        .aggregate_class(&store, "minuet", &material.cohort())
        .unwrap();
    let params = QuickTestParams::from_aggregation(&aggregation, DifficultyLevel::Beginner, 2);

    let model = CountingModel::new(completion(&[problem(1, 9, 12), problem(2, 1, 4)]));
    let config = EngineConfig::default();
    let generator = QuickTestGenerator::new(&model, &LexicalValidator, config.generator.clone());
    let result = generator.generate(&params).unwrap();

    assert_eq!(model.calls.get(), 1);
    assert_eq!(result.problems.len(), 2);
    assert_eq!(result.problems[0].difficulty, WeakSpotDifficulty::High);
    assert_eq!(result.problems[1].difficulty, WeakSpotDifficulty::Medium);
    assert_eq!(result.total_bars, 16);
    assert_eq!(result.estimated_time, 5);

    // Accepted notation clears the publication gate
    for problem in &result.problems {
        let gate = check_quality_gate(&problem.notation, &aggregation.instrument, config.quality.threshold);
        assert_eq!(gate.status, QualityStatus::Approved);
    }

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["problems"][0]["targetBars"]["startBar"].is_number());
    assert_eq!(json["problems"][0]["difficulty"], "high");
    assert_eq!(json["totalBars"], 16);
}

#[test]
fn test_empty_weak_spots_make_no_model_call() {
    let model = CountingModel::new(completion(&[problem(1, 1, 4)]));
    let generator = QuickTestGenerator::new(&model, &LexicalValidator, Default::default());
    let params = QuickTestParams {
        material_title: "Minuet in G".to_string(),
        instrument: "piano".to_string(),
        target_tempo: 100,
        weak_spots: vec![],
        difficulty: DifficultyLevel::Beginner,
        sections_count: 3,
    };
    assert!(generator.generate(&params).is_none());
    assert_eq!(model.calls.get(), 0);
}

#[test]
fn test_second_problem_failure_aborts_batch() {
    let store = class_store();
    let aggregation = WeakSpotAggregator::default()
        .aggregate_class(&store, "minuet", &store.materials()[0].cohort())
        .unwrap();
    let params = QuickTestParams::from_aggregation(&aggregation, DifficultyLevel::Beginner, 3);

    let model = CountingModel::new(completion(&[
        problem(1, 9, 12),
        problem(2, 1, 4),
        problem(3, 13, 16),
    ]));
    let validator = FailNth {
        n: 2,
        seen: Cell::new(0),
    };
    let generator = QuickTestGenerator::new(&model, &validator, Default::default());

    match generator.try_generate(&params) {
        Err(EtudeError::SyntaxError { problem, .. }) => assert_eq!(problem, 2),
        other => panic!("Expected SyntaxError, got {:?}", other),
    }
    assert_eq!(validator.seen.get(), 2);
}

#[test]
fn test_reanalysis_is_idempotent_and_bounded() {
    let first = analyze(GOOD_TUNE, "piano").unwrap();
    let second = analyze(GOOD_TUNE, "piano").unwrap();
    assert_eq!(first, second);
    for score in [first.playability_score, first.learning_value_score] {
        assert!((0.0..=10.0).contains(&score));
    }

    let (stats, passes) = score_and_gate(GOOD_TUNE, "piano", QUALITY_THRESHOLD).unwrap();
    assert_eq!(stats, first);
    assert!(passes);
}

#[test]
fn test_gate_thresholds() {
    let mut stats = analyze(GOOD_TUNE, "piano").unwrap();

    stats.learning_value_score = 7.5;
    assert!(passes_quality_gate(&stats, QUALITY_THRESHOLD));

    stats.learning_value_score = 5.5;
    assert!(passes_quality_gate(&stats, 5.0));
    assert!(passes_quality_gate(&stats, 5.5));
    assert!(!passes_quality_gate(&stats, 6.0));
}

#[test]
fn test_gate_on_lesson_content() {
    let content = format!("Practice this slowly.\n\n```abc\n{}\n```\n", GOOD_TUNE);
    let result = check_quality_gate(&content, "piano", QUALITY_THRESHOLD);
    assert_eq!(result.status, QualityStatus::Approved);
    assert!(result.can_publish);

    let result = check_quality_gate("Just words here.", "piano", QUALITY_THRESHOLD);
    assert_eq!(result.status, QualityStatus::Pending);
    assert!(!result.can_publish);
}

#[test]
fn test_config_drives_pipeline() {
    let config = EngineConfig::from_yaml_str(
        "aggregation:\n  top-n: 1\ngenerator:\n  bars-per-problem: 4\n",
    )
    .unwrap();
    let store = class_store();
    let aggregation = WeakSpotAggregator::new(config.aggregation.clone())
        .aggregate_class(&store, "minuet", &store.materials()[0].cohort())
        .unwrap();
    assert_eq!(aggregation.top_weak_spots.len(), 1);

    let params = QuickTestParams::from_aggregation(&aggregation, DifficultyLevel::Beginner, 3);
    let model = CountingModel::new(completion(&[problem(1, 9, 12)]));
    let generator = QuickTestGenerator::new(&model, &LexicalValidator, config.generator);
    let result = generator.generate(&params).unwrap();
    assert_eq!(result.total_bars, 4);
}

const PIECE: &str = "X:2\nT:Etude\nM:4/4\nL:1/4\nQ:1/4=100\nK:C\nC D E F | G A G F |\nE F G A | G F E D | C4 |]";

fn drill_completion() -> String {
    let variation = |title: &str| {
        format!(
            r#"{{"title": "{}", "notation": "X:1\nT:{}\nM:4/4\nL:1/4\nQ:1/4=90\nK:C\nE F G A | G F E D |"}}"#,
            title, title
        )
    };
    format!(
        "{{\"drills\": {{\"same\": {}, \"easier\": {}, \"harder\": {}}}}}",
        variation("Same"),
        variation("Easier"),
        variation("Harder")
    )
}

fn drill_params() -> WeakDrillParams {
    WeakDrillParams {
        source_notation: PIECE.to_string(),
        loop_start_bar: 3,
        loop_end_bar: 4,
        instrument: "piano".to_string(),
        current_tempo: 84,
        material_title: "Etude".to_string(),
    }
}

#[test]
fn test_weak_drill_end_to_end() {
    let model = CountingModel::new(drill_completion());
    let config = EngineConfig::default();
    let generator = WeakDrillGenerator::new(&model, &LexicalValidator, config.generator.clone());

    let result = generator.generate(&drill_params()).unwrap();
    assert_eq!(model.calls.get(), 1);
    assert_eq!(result.title, "Weak Spot Drill: Bars 3-4");
    assert_eq!(
        result.original_section.notation,
        "X:1\nT:Etude\nM:4/4\nL:1/4\nQ:1/4=100\nK:C\nE F G A | G F E D |"
    );
    assert_eq!(result.drills.same.target_tempo, 84);
    assert_eq!(result.drills.easier.target_tempo, 64);
    assert_eq!(result.drills.harder.target_tempo, 104);

    // The section is itself a tune the analyzer reads the same way
    let section_stats = analyze(&result.original_section.notation, "piano").unwrap();
    assert_eq!(section_stats, result.original_section.analysis);
    assert_eq!(section_stats.tempo_qpm, 100.0);
}

#[test]
fn test_weak_drill_rejects_on_second_variation() {
    let model = CountingModel::new(drill_completion());
    let validator = FailNth {
        n: 2,
        seen: Cell::new(0),
    };
    let generator = WeakDrillGenerator::new(&model, &validator, EngineConfig::default().generator);

    match generator.try_generate(&drill_params()) {
        Err(EtudeError::SyntaxError { problem, .. }) => assert_eq!(problem, 2),
        other => panic!("Expected SyntaxError, got {:?}", other),
    }
    assert_eq!(validator.seen.get(), 2);
}
