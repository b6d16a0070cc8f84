use futures_util::{StreamExt, stream};
use serde_json::Value;
use tracing::{info, warn};

use crate::llm_providers::SamplingParams;
use crate::llm_service::LLMService;
use crate::log_pipeline_stage;
use crate::models::{ArenaItemMeta, ArenaSessionItem, SessionParams};
use crate::normalize::{IDEAL_KEYS, SCENARIO_KEYS, pick_text};

/// Framings cycled through a session so consecutive items differ in kind, not just wording.
pub const VARIANTS: &[&str] = &["foundational", "applied", "diagnostic", "comparative", "what-if"];

pub const UNAVAILABLE_PREFIX: &str = "[Unavailable] ";

/// A freshly generated session before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSession {
    pub seed: u64,
    pub items: Vec<ArenaSessionItem>,
}

/// Topic and variant assignment for every slot of a session.
pub fn plan_session(
    seed: u64,
    fallback_topic: &str,
    topics: &[String],
    count: usize,
) -> Vec<ArenaItemMeta> {
    (0..count)
        .map(|i| ArenaItemMeta {
            variant: VARIANTS[(seed.wrapping_add(i as u64) % VARIANTS.len() as u64) as usize]
                .to_string(),
            seed: seed.wrapping_add(i as u64),
            topic: if topics.is_empty() {
                fallback_topic.to_string()
            } else {
                topics[i % topics.len()].clone()
            },
        })
        .collect()
}

impl LLMService {
    /// Generate exactly `params.num_questions` scenarios. Items that fail are replaced by labeled
    /// placeholders, so the length of the result never depends on the upstream.
    pub async fn generate_arena_session(
        &self,
        title: &str,
        topics: &[String],
        params: &SessionParams,
    ) -> GeneratedSession {
        let seed = params.random_seed.unwrap_or_else(rand::random::<u64>);
        log_pipeline_stage!("arena", count = params.num_questions, "generating session");

        let plan = plan_session(seed, title, topics, params.num_questions);
        let items: Vec<ArenaSessionItem> = stream::iter(plan)
            .map(|meta| self.generate_arena_item(title, meta, params))
            .buffered(self.settings.arena_concurrency.max(1))
            .collect()
            .await;

        let placeholders = items
            .iter()
            .filter(|item| item.question_text.starts_with(UNAVAILABLE_PREFIX))
            .count();
        info!(
            seed,
            items = items.len(),
            placeholders,
            "Arena session generated"
        );

        GeneratedSession { seed, items }
    }

    async fn generate_arena_item(
        &self,
        title: &str,
        meta: ArenaItemMeta,
        params: &SessionParams,
    ) -> ArenaSessionItem {
        let prompt = format!(
            r#"You are designing an application exercise for the study set "{title}".
Focus topic: {topic}
Scenario style: {variant}
Variation seed: {seed}

Write ONE realistic, open-ended scenario that requires applying {topic} to solve a problem,
written in the {variant} style. Avoid generic textbook phrasing; use the seed to pick concrete
names, numbers and settings so that different seeds give different scenarios.

Return STRICTLY as a JSON object: {{"scenario": "...", "ideal_response": "..."}}"#,
            title = title,
            topic = meta.topic,
            variant = meta.variant,
            seed = meta.seed,
        );
        let sampling = SamplingParams {
            temperature: Some(params.temperature),
            top_p: Some(params.top_p),
            seed: Some(meta.seed),
        };

        let failure = match self.request_json("arena_item", &prompt, Some(sampling)).await {
            Ok(Some(value)) => match parse_item(&value) {
                Some((question_text, ideal_response)) => {
                    return ArenaSessionItem {
                        question_text,
                        ideal_response,
                        meta,
                    };
                }
                None => "response had no scenario".to_string(),
            },
            Ok(None) => "no result after retries".to_string(),
            Err(e) => e.to_string(),
        };

        warn!(
            topic = %meta.topic,
            variant = %meta.variant,
            seed = meta.seed,
            reason = %failure,
            "Arena item replaced by placeholder"
        );
        placeholder_item(meta)
    }
}

fn parse_item(value: &Value) -> Option<(String, String)> {
    let obj = match value {
        Value::Array(items) => items.first()?.as_object()?,
        other => other.as_object()?,
    };
    let question = pick_text(obj, SCENARIO_KEYS)?;
    let ideal = pick_text(obj, IDEAL_KEYS).unwrap_or_default();
    Some((question, ideal))
}

fn placeholder_item(meta: ArenaItemMeta) -> ArenaSessionItem {
    ArenaSessionItem {
        question_text: format!(
            "{}A {} scenario on {} could not be generated. Describe how you would apply {} to a real problem.",
            UNAVAILABLE_PREFIX, meta.variant, meta.topic, meta.topic
        ),
        ideal_response: String::new(),
        meta,
    }
}
