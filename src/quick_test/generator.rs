//! The generation pipeline: prompt, one completion, parse, validate, score.

use super::prompt::{build_quick_test_prompt, system_prompt};
use super::response::parse_quick_test_response;
use super::types::{QuickTestParams, QuickTestResult};
use crate::analysis::analyze_with_target;
use crate::config::GeneratorConfig;
use crate::error::EtudeError;
use crate::services::{CompletionRequest, LanguageModel, NotationValidator};
use tracing::{debug, error, info, warn};

pub struct QuickTestGenerator<'a, M: LanguageModel + ?Sized, V: NotationValidator + ?Sized> {
    model: &'a M,
    validator: &'a V,
    config: GeneratorConfig,
}

impl<'a, M: LanguageModel + ?Sized, V: NotationValidator + ?Sized> QuickTestGenerator<'a, M, V> {
    pub fn new(model: &'a M, validator: &'a V, config: GeneratorConfig) -> Self {
        Self {
            model,
            validator,
            config,
        }
    }

    /// Run the pipeline, reporting why it failed.
    ///
    /// `Ok(None)` means there was nothing to generate for (no weak spots);
    /// the model is not called in that case.
    pub fn try_generate(
        &self,
        params: &QuickTestParams,
    ) -> Result<Option<QuickTestResult>, EtudeError> {
        if params.weak_spots.is_empty() {
            warn!(material = %params.material_title, "no weak spots to generate a quick test for");
            return Ok(None);
        }

        let spots = params.selected_spots();
        let request = CompletionRequest {
            system_prompt: system_prompt(&params.instrument),
            user_prompt: build_quick_test_prompt(params, spots, self.config.bars_per_problem),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        debug!(spots = spots.len(), "requesting quick test");

        let completion = self.model.complete(&request)?;
        if completion.trim().is_empty() {
            return Err(EtudeError::ResponseError("empty completion".to_string()));
        }

        let result = parse_quick_test_response(&completion, spots, &self.config)?;

        for problem in &result.problems {
            self.validator
                .validate(&problem.notation)
                .map_err(|message| EtudeError::SyntaxError {
                    problem: problem.problem_number,
                    message,
                })?;
        }

        for problem in &result.problems {
            let Some(stats) =
                analyze_with_target(&problem.notation, &params.instrument, params.difficulty)
            else {
                continue;
            };
            if stats.learning_value_score < self.config.soft_quality_threshold {
                warn!(
                    problem = problem.problem_number,
                    score = stats.learning_value_score,
                    threshold = self.config.soft_quality_threshold,
                    "problem below soft quality threshold"
                );
            }
        }

        info!(
            material = %params.material_title,
            problems = result.problems.len(),
            "quick test generated"
        );
        Ok(Some(result))
    }

    /// Run the pipeline; failures are logged and yield `None`.
    pub fn generate(&self, params: &QuickTestParams) -> Option<QuickTestResult> {
        match self.try_generate(params) {
            Ok(result) => result,
            Err(EtudeError::SyntaxError { problem, message }) => {
                error!(problem, %message, "generated notation failed validation");
                None
            }
            Err(e) => {
                error!(error = %e, "quick test generation failed");
                None
            }
        }
    }
}
