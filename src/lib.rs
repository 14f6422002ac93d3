pub mod aggregate;
pub mod analysis;
pub mod ast;
pub mod config;
pub mod error;
pub mod instrument;
pub mod lexer;
pub mod parser;
pub mod quality;
pub mod quick_test;
pub mod report;
pub mod scoring;
pub mod services;
pub mod telemetry;
pub mod weak_drill;

#[cfg(test)]
mod testing;

pub use aggregate::{
    normalize_to_eight_bar_sections, AggregatedWeakSpot, PracticeSection, WeakSpotAggregator,
    WeakSpotDifficulty, WeakSpotsAggregation,
};
pub use analysis::{
    analyze, analyze_with_target, estimate_difficulty, try_analyze, DifficultyLevel,
    NotationStatistics,
};
pub use ast::*;
pub use config::{AggregationConfig, EngineConfig, GeneratorConfig, QualityConfig};
pub use error::*;
pub use parser::{parse, parse_lenient};
pub use quality::{
    check_quality_gate, passes_quality_gate, QualityGateResult, QualityStatus, QUALITY_THRESHOLD,
};
pub use quick_test::{QuickTestGenerator, QuickTestParams, QuickTestResult};
pub use report::{explain_analysis, explain_quality_score, suggest_improvements};
pub use scoring::{learning_value_score, playability_score};
pub use services::{CompletionRequest, LanguageModel, NotationValidator};
pub use telemetry::{InMemoryTelemetry, TelemetryStore};
pub use weak_drill::{WeakDrillGenerator, WeakDrillParams, WeakDrillResult};

/// Analyze a tune and decide whether it clears the quality gate.
/// Returns `None` when the notation cannot be analyzed.
pub fn score_and_gate(
    text: &str,
    instrument: &str,
    threshold: f64,
) -> Option<(NotationStatistics, bool)> {
    let stats = analyze(text, instrument)?;
    let passes = passes_quality_gate(&stats, threshold);
    Some((stats, passes))
}
