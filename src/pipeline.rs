use chrono::Utc;
use futures_util::{StreamExt, stream};
use std::pin::pin;
use std::time::Instant;
use tracing::{info, warn};

use crate::database::Database;
use crate::errors::PipelineError;
use crate::llm_service::LLMService;
use crate::models::{GenerationReport, StudySet, TopicDescriptor};
use crate::{log_performance, log_pipeline_stage};

/// Whole-document run: syllabus, then per-topic mining with bounded concurrency, then storage.
///
/// Only an empty document or an empty syllabus fails the run. A topic whose mining fails is
/// skipped and counted in the report.
pub struct ContentPipeline<'a> {
    db: &'a Database,
    llm: &'a LLMService,
}

impl<'a> ContentPipeline<'a> {
    pub fn new(db: &'a Database, llm: &'a LLMService) -> Self {
        Self { db, llm }
    }

    pub async fn run(&self, title: &str, text: &str) -> Result<GenerationReport, PipelineError> {
        let started = Instant::now();
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyDocument);
        }

        let syllabus = self.llm.generate_syllabus(text).await;
        if syllabus.is_empty() {
            return Err(PipelineError::EmptySyllabus);
        }
        log_pipeline_stage!("architect", count = syllabus.len(), "syllabus ready");

        let study_set = self.db.create_study_set(title).await?;
        let study_set_id = study_set.id;

        let report = match self.mine_and_store(&syllabus, study_set).await {
            Ok(report) => report,
            Err(e) => {
                // No half-built study sets: drop whatever was stored so far.
                if let Err(cleanup) = self.db.delete_study_set(study_set_id).await {
                    warn!(
                        study_set_id = %study_set_id,
                        error = %cleanup,
                        "Could not remove partially stored study set"
                    );
                }
                return Err(PipelineError::Storage(e));
            }
        };

        info!(
            study_set_id = %report.study_set.id,
            title = %report.study_set.title,
            topics_planned = report.topics_planned,
            topics_mined = report.topics_mined,
            topics_skipped = report.topics_skipped,
            cards_created = report.cards_created,
            "Study set generated"
        );
        log_performance!(
            "generate_study_set",
            duration_ms = started.elapsed().as_millis() as u64
        );

        Ok(report)
    }

    async fn mine_and_store(
        &self,
        syllabus: &[TopicDescriptor],
        mut study_set: StudySet,
    ) -> anyhow::Result<GenerationReport> {
        let concurrency = self.llm.settings().topic_concurrency.max(1);
        let mut mined = pin!(
            stream::iter(syllabus)
                .map(|topic| async move { (topic, self.llm.mine_topic(topic).await) })
                .buffered(concurrency)
                .boxed()
        );

        let mut topics_mined = 0;
        let mut cards_created = 0;
        while let Some((topic, bundle)) = mined.next().await {
            let Some(bundle) = bundle else {
                continue;
            };
            cards_created += self.db.save_bundle(study_set.id, &bundle, Utc::now()).await?;
            topics_mined += 1;
            log_pipeline_stage!("miner", topic = topic.topic, "topic stored");
        }

        study_set.card_count = cards_created as i64;
        self.db.set_card_count(study_set.id, study_set.card_count).await?;

        Ok(GenerationReport {
            topics_planned: syllabus.len(),
            topics_mined,
            topics_skipped: syllabus.len() - topics_mined,
            cards_created,
            study_set,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::errors::GenerationError;
    use crate::llm_providers::{SamplingParams, TextGenerator};
    use crate::retry::Sleeper;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    /// Two topics; only the second bundle carries an arena scenario.
    struct TwoTopics;

    #[async_trait]
    impl TextGenerator for TwoTopics {
        async fn generate(
            &self,
            prompt: &str,
            _params: Option<SamplingParams>,
        ) -> Result<String, GenerationError> {
            let reply = if prompt.contains("Break it down into distinct") {
                json!([
                    {"topic": "Cells", "complexity": 1, "context": "Cell structure"},
                    {"topic": "Energy", "complexity": 1, "context": "ATP"}
                ])
            } else if prompt.contains("Topic: Cells") {
                json!({"flashcards": [{"question": "What is a cell?", "answer": "A unit"}]})
            } else {
                json!({
                    "flashcards": [{"question": "What is ATP?", "answer": "Energy"}],
                    "arena": {"scenario": "Power a cell", "ideal_response": "Use ATP"}
                })
            };
            Ok(reply.to_string())
        }

        fn provider_name(&self) -> &'static str {
            "TwoTopics"
        }

        fn model_name(&self) -> &str {
            "two-topics"
        }
    }

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _delay: Duration) {}
    }

    #[tokio::test]
    async fn test_storage_failure_removes_partial_study_set() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        // The second topic's arena insert fails after the first topic is already stored
        sqlx::query("DROP TABLE arena_challenges")
            .execute(db.pool())
            .await
            .unwrap();
        let llm = LLMService::new(Arc::new(TwoTopics), GenerationConfig::default())
            .with_sleeper(Arc::new(NoSleep));

        let result = ContentPipeline::new(&db, &llm).run("Biology", "Cells and energy").await;

        assert!(matches!(result, Err(PipelineError::Storage(_))));
        assert!(db.list_study_sets().await.unwrap().is_empty());
        assert!(db.list_all_flashcards().await.unwrap().is_empty());
    }
}
