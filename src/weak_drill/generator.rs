//! The drill pipeline: cut the section, prompt, one completion, parse,
//! validate every variation, score.

use super::prompt::{build_weak_drill_prompt, system_prompt};
use super::response::parse_weak_drill_response;
use super::section::extract_section;
use super::types::{OriginalSection, WeakDrillParams, WeakDrillResult};
use crate::analysis::{analyze_with_target, try_analyze};
use crate::config::GeneratorConfig;
use crate::error::EtudeError;
use crate::services::{CompletionRequest, LanguageModel, NotationValidator};
use tracing::{debug, error, info, warn};

pub struct WeakDrillGenerator<'a, M: LanguageModel + ?Sized, V: NotationValidator + ?Sized> {
    model: &'a M,
    validator: &'a V,
    config: GeneratorConfig,
}

impl<'a, M: LanguageModel + ?Sized, V: NotationValidator + ?Sized> WeakDrillGenerator<'a, M, V> {
    pub fn new(model: &'a M, validator: &'a V, config: GeneratorConfig) -> Self {
        Self {
            model,
            validator,
            config,
        }
    }

    /// Run the pipeline, reporting why it failed.
    ///
    /// A bar range the tune does not hold, or a section that cannot be
    /// analyzed, fails before the model is called.
    pub fn try_generate(&self, params: &WeakDrillParams) -> Result<WeakDrillResult, EtudeError> {
        let section = extract_section(
            &params.source_notation,
            params.loop_start_bar,
            params.loop_end_bar,
        )?;
        let stats = try_analyze(&section.notation, &params.instrument, None)?;

        let request = CompletionRequest {
            system_prompt: system_prompt(&params.instrument),
            user_prompt: build_weak_drill_prompt(params, &section, &stats),
            temperature: self.config.temperature,
            max_tokens: self.config.drill_max_tokens,
        };
        debug!(bars = %section.bars, "requesting weak-spot drill");

        let completion = self.model.complete(&request)?;
        if completion.trim().is_empty() {
            return Err(EtudeError::ResponseError("empty completion".to_string()));
        }

        let drills =
            parse_weak_drill_response(&completion, stats.difficulty_level, params.current_tempo)?;

        for (kind, variation) in drills.iter() {
            if let Err(message) = self.validator.validate(&variation.notation) {
                warn!(variation = %kind, %message, "drill variation failed validation");
                return Err(EtudeError::SyntaxError {
                    problem: kind.number(),
                    message,
                });
            }
        }

        for (kind, variation) in drills.iter() {
            let Some(variation_stats) =
                analyze_with_target(&variation.notation, &params.instrument, variation.difficulty)
            else {
                continue;
            };
            if variation_stats.learning_value_score < self.config.soft_quality_threshold {
                warn!(
                    variation = %kind,
                    score = variation_stats.learning_value_score,
                    threshold = self.config.soft_quality_threshold,
                    "drill variation below soft quality threshold"
                );
            }
        }

        info!(
            material = %params.material_title,
            bars = %section.bars,
            "weak-spot drill generated"
        );
        Ok(WeakDrillResult {
            title: format!("Weak Spot Drill: Bars {}", section.bars),
            original_section: OriginalSection {
                notation: section.notation,
                bars: section.bars,
                difficulty: stats.difficulty_level,
                analysis: stats,
            },
            drills,
        })
    }

    /// Run the pipeline; failures are logged and yield `None`.
    pub fn generate(&self, params: &WeakDrillParams) -> Option<WeakDrillResult> {
        match self.try_generate(params) {
            Ok(result) => Some(result),
            Err(EtudeError::SyntaxError { problem, message }) => {
                error!(variation = problem, %message, "generated drill failed validation");
                None
            }
            Err(e) => {
                error!(error = %e, "weak-spot drill generation failed");
                None
            }
        }
    }
}
