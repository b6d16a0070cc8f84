use tracing::{info, warn};

use crate::llm_providers::SamplingParams;
use crate::llm_service::LLMService;
use crate::log_pipeline_stage;
use crate::models::GradingResult;
use crate::normalize::normalize_grade;

pub const NO_ANSWER_FEEDBACK: &str = "No answer provided.";
pub const GRADING_UNAVAILABLE: &str = "Grading unavailable";

fn unavailable(reason: &str) -> GradingResult {
    GradingResult {
        score: 0,
        feedback: format!("{}: {}. Please try again later.", GRADING_UNAVAILABLE, reason),
    }
}

impl LLMService {
    /// Score a free-text answer to a scenario from 0 to 100. Never fails: upstream problems
    /// produce a zero score with explanatory feedback.
    pub async fn grade_arena_answer(
        &self,
        scenario: &str,
        answer: &str,
        ideal_response: Option<&str>,
    ) -> GradingResult {
        if answer.trim().is_empty() {
            return GradingResult {
                score: 0,
                feedback: NO_ANSWER_FEEDBACK.to_string(),
            };
        }
        log_pipeline_stage!("grader", "grading arena answer");

        let reference = match ideal_response.map(str::trim).filter(|s| !s.is_empty()) {
            Some(ideal) => format!("\nReference answer (for your eyes only):\n{}\n", ideal),
            None => String::new(),
        };
        let prompt = format!(
            r#"You are grading a student's answer to an application scenario.

Scenario:
{scenario}
{reference}
Student answer:
{answer}

Score the answer from 0 to 100 for correctness, depth and practical application, and give short,
constructive feedback addressed to the student.

Return STRICTLY as a JSON object: {{"score": 0-100, "feedback": "..."}}"#,
            scenario = scenario,
            reference = reference,
            answer = answer,
        );
        let sampling = SamplingParams {
            temperature: Some(0.2),
            ..SamplingParams::default()
        };

        match self.request_json("grade_answer", &prompt, Some(sampling)).await {
            Ok(Some(value)) => match normalize_grade(&value) {
                Some(result) => {
                    info!(score = result.score, "Answer graded");
                    result
                }
                None => {
                    warn!("Grading response had no usable score");
                    unavailable("the grader returned an unreadable result")
                }
            },
            Ok(None) => unavailable("the AI service is busy"),
            Err(e) => {
                warn!(error = %e, "Grading failed");
                unavailable(&e.to_string())
            }
        }
    }
}
