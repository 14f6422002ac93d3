//! # Weak Drill Module
//!
//! Turn one student's looped passage into three practice variations: the
//! same difficulty, one level easier and one level harder.
//!
//! ## Pipeline
//! 1. **Cut** - extract the looped bars as a standalone tune
//! 2. **Analyze** - statistics for the section seed the prompt and defaults
//! 3. **Complete** - exactly one call to the [`LanguageModel`](crate::services::LanguageModel)
//! 4. **Parse** - find the JSON object; all three variations are required
//! 5. **Validate** - every variation through the
//!    [`NotationValidator`](crate::services::NotationValidator); one failure
//!    rejects the drill
//! 6. **Score** - low learning value is logged, not rejected
//!
//! ## Sub-modules
//! - `types` - WeakDrillParams, DrillVariation, DrillSet, WeakDrillResult
//! - `section` - Bar-range extraction
//! - `prompt` - System and user prompt text
//! - `response` - Structural parsing with per-variation defaults
//! - `generator` - The pipeline itself
//!
//! ## Example
//! ```rust
//! use etude::services::{LexicalValidator, ReplayModel};
//! use etude::weak_drill::{WeakDrillGenerator, WeakDrillParams};
//! use etude::GeneratorConfig;
//!
//! let model = ReplayModel::new("{}");
//! let generator = WeakDrillGenerator::new(&model, &LexicalValidator, GeneratorConfig::default());
//! let params = WeakDrillParams {
//!     source_notation: "X:1\nK:C\nC D E F | G A B c |".to_string(),
//!     loop_start_bar: 5,
//!     loop_end_bar: 8,
//!     instrument: "piano".to_string(),
//!     current_tempo: 80,
//!     material_title: "Scale".to_string(),
//! };
//!
//! // The tune has two bars: no result and no model call
//! assert!(generator.generate(&params).is_none());
//! assert_eq!(model.calls(), 0);
//! ```

mod generator;
mod prompt;
mod response;
mod section;
mod types;

#[cfg(test)]
mod tests;

pub use generator::WeakDrillGenerator;
pub use prompt::{build_weak_drill_prompt, system_prompt};
pub use response::parse_weak_drill_response;
pub use section::{extract_section, Section};
pub use types::{
    BarRange, DrillKind, DrillSet, DrillVariation, OriginalSection, WeakDrillParams,
    WeakDrillResult,
};
