use tracing::{info, warn};

use crate::llm_service::LLMService;
use crate::log_pipeline_stage;
use crate::models::{ContentBundle, TopicDescriptor};
use crate::normalize::normalize_bundle;

pub const MIN_CARDS_PER_TOPIC: usize = 2;
pub const MAX_CARDS_PER_TOPIC: usize = 10;

/// Two flashcards per complexity point, kept within the per-topic bounds.
pub fn cards_for_complexity(complexity: u8) -> usize {
    (usize::from(complexity) * 2).clamp(MIN_CARDS_PER_TOPIC, MAX_CARDS_PER_TOPIC)
}

impl LLMService {
    /// Mine flashcards, one quiz item and one scenario for a topic. `None` means the topic is
    /// skipped.
    pub async fn mine_topic(&self, topic: &TopicDescriptor) -> Option<ContentBundle> {
        log_pipeline_stage!("miner", topic = topic.topic, "digging into topic");

        let card_count = cards_for_complexity(topic.complexity);
        let prompt = format!(
            r#"You are an educational AI.
Topic: {topic}
Context: {context}

Generate exactly:
1. {card_count} Flashcards (question, answer).
2. 1 Multiple-Choice Quiz Question (question, 4 options, correct_answer).
3. 1 Application Scenario (scenario, ideal_response).

Return STRICTLY as a JSON object with keys: "flashcards", "quiz", "arena".
IMPORTANT: The "options" for the quiz must be a simple LIST of strings, NOT a dictionary with keys "A", "B", etc.
The "correct_answer" must repeat the text of the correct option exactly.
Example Options: ["Paris", "London", "Berlin", "Madrid"]"#,
            topic = topic.topic,
            context = topic.context,
            card_count = card_count,
        );

        let value = match self.request_json("mine_topic", &prompt, None).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                log_pipeline_stage!(
                    skip,
                    "miner",
                    topic = topic.topic,
                    reason = "no result after retries"
                );
                return None;
            }
            Err(e) => {
                log_pipeline_stage!(skip, "miner", topic = topic.topic, reason = e);
                return None;
            }
        };

        let Some(mut bundle) = normalize_bundle(&value, &topic.topic) else {
            log_pipeline_stage!(
                skip,
                "miner",
                topic = topic.topic,
                reason = "no usable content in response"
            );
            return None;
        };

        if bundle.flashcards.len() > card_count {
            bundle.flashcards.truncate(card_count);
        } else if bundle.flashcards.len() < card_count {
            warn!(
                topic = %topic.topic,
                requested = card_count,
                received = bundle.flashcards.len(),
                "Model returned fewer flashcards than requested"
            );
        }

        info!(
            topic = %topic.topic,
            flashcards = bundle.flashcards.len(),
            has_quiz = bundle.quiz.is_some(),
            has_arena = bundle.arena.is_some(),
            "Topic mined"
        );
        Some(bundle)
    }
}
