//! # Quick Test Module
//!
//! Generate a five-minute practice test aimed at the spots a class struggles with.
//!
//! ## Pipeline
//! 1. **Select** - the first `sections_count` ranked weak spots
//! 2. **Prompt** - describe each spot and the exact response shape
//! 3. **Complete** - exactly one call to the [`LanguageModel`](crate::services::LanguageModel)
//! 4. **Parse** - find the JSON object, then check every required field
//! 5. **Validate** - every problem's notation through the
//!    [`NotationValidator`](crate::services::NotationValidator); one failure
//!    rejects the whole test
//! 6. **Score** - analyze each problem; low scores are logged, not rejected
//!
//! ## Sub-modules
//! - `types` - QuickTestParams, QuickTestProblem, QuickTestResult
//! - `prompt` - System and user prompt text
//! - `response` - JSON extraction and structural parsing
//! - `generator` - The pipeline itself
//!
//! ## Example
//! ```rust
//! use etude::quick_test::{QuickTestGenerator, QuickTestParams};
//! use etude::services::{LexicalValidator, ReplayModel};
//! use etude::{DifficultyLevel, GeneratorConfig};
//!
//! let model = ReplayModel::new("{}");
//! let generator = QuickTestGenerator::new(&model, &LexicalValidator, GeneratorConfig::default());
//! let params = QuickTestParams {
//!     material_title: "Minuet in G".to_string(),
//!     instrument: "piano".to_string(),
//!     target_tempo: 100,
//!     weak_spots: vec![],
//!     difficulty: DifficultyLevel::Beginner,
//!     sections_count: 3,
//! };
//!
//! // Nothing to practice: no result and no model call
//! assert!(generator.generate(&params).is_none());
//! assert_eq!(model.calls(), 0);
//! ```

mod generator;
mod prompt;
mod response;
mod types;


pub use generator::QuickTestGenerator;
pub use prompt::{build_quick_test_prompt, system_prompt};
pub use response::{extract_json_candidate, find_json_object, parse_quick_test_response};
pub use types::{QuickTestParams, QuickTestProblem, QuickTestResult, TargetBars};
