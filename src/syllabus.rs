use tracing::{error, info, warn};

use crate::llm_service::{LLMService, char_prefix};
use crate::log_pipeline_stage;
use crate::models::TopicDescriptor;
use crate::normalize::normalize_syllabus;

/// Marks topics that were substituted because no model could be reached.
pub const OFFLINE_TOPIC_PREFIX: &str = "[Offline] ";

const PLACEHOLDER_TOPICS: &[(&str, u8)] =
    &[("Overview", 1), ("Key Concepts", 2), ("Applications", 2)];

impl LLMService {
    /// Segment a document into at most `max_topics` topics.
    ///
    /// An empty result is the caller's signal that the run cannot continue.
    pub async fn generate_syllabus(&self, text: &str) -> Vec<TopicDescriptor> {
        log_pipeline_stage!("architect", "analyzing document structure");

        let excerpt = char_prefix(text, self.settings.document_prefix_chars);
        let prompt = format!(
            r#"Analyze the following academic text. Break it down into distinct, key sub-topics.
For each topic, assign a complexity score from 1 (introductory) to 5 (advanced).

Return the result STRICTLY as a JSON list of objects.
Format: [{{"topic": "Topic Name", "complexity": 3, "context": "Brief summary"}}]

Text Context (first {} characters):
{}"#,
            self.settings.document_prefix_chars, excerpt
        );

        match self.request_json("generate_syllabus", &prompt, None).await {
            Ok(Some(value)) => {
                let topics = normalize_syllabus(&value, self.settings.max_topics);
                info!(
                    topic_count = topics.len(),
                    topics = ?topics.iter().map(|t| t.topic.as_str()).collect::<Vec<_>>(),
                    "Syllabus generated"
                );
                topics
            }
            Ok(None) => {
                warn!("Syllabus generation gave up after repeated transient failures");
                Vec::new()
            }
            Err(e) if e.is_model_unavailable() && self.settings.offline_fallback => {
                warn!(error = %e, "Model unavailable, substituting placeholder syllabus");
                placeholder_syllabus(excerpt, self.settings.max_topics)
            }
            Err(e) => {
                error!(error = %e, "Error in syllabus generation");
                Vec::new()
            }
        }
    }
}

fn placeholder_syllabus(excerpt: &str, max_topics: usize) -> Vec<TopicDescriptor> {
    let context = char_prefix(excerpt.trim(), 200).to_string();
    PLACEHOLDER_TOPICS
        .iter()
        .take(max_topics)
        .map(|(name, complexity)| TopicDescriptor {
            topic: format!("{}{}", OFFLINE_TOPIC_PREFIX, name),
            complexity: *complexity,
            context: context.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_syllabus_is_prefixed_and_bounded() {
        let topics = placeholder_syllabus("Photosynthesis converts light.", 2);
        assert_eq!(topics.len(), 2);
        assert!(topics.iter().all(|t| t.topic.starts_with(OFFLINE_TOPIC_PREFIX)));
        assert_eq!(topics[0].context, "Photosynthesis converts light.");
    }
}
