mod common;

use async_trait::async_trait;
use common::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use study_forge::config::GenerationConfig;
use study_forge::syllabus::OFFLINE_TOPIC_PREFIX;
use study_forge::{
    ContentPipeline, Database, GenerationError, LLMService, PipelineError, SamplingParams,
    TextGenerator,
};

#[tokio::test]
async fn test_pipeline_stores_every_mined_topic() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let (llm, calls) = llm_with(happy_upstream);

    let report = ContentPipeline::new(&db, &llm)
        .run("Biology", "Cells and energy")
        .await
        .unwrap();

    assert_eq!(report.topics_planned, 2);
    assert_eq!(report.topics_mined, 2);
    assert_eq!(report.topics_skipped, 0);
    assert_eq!(report.cards_created, 4);
    assert_eq!(report.study_set.card_count, 4);
    // One syllabus call plus one per topic
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let stored = db.get_study_set(report.study_set.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Biology");
    assert_eq!(stored.card_count, 4);

    let quiz = db.list_quiz_items(stored.id).await.unwrap();
    assert_eq!(quiz.len(), 2);
    assert!(quiz.iter().all(|q| q.correct_answer == "Second"));

    let topics = db.list_topics(stored.id).await.unwrap();
    assert_eq!(topics, vec!["Cells".to_string(), "Energy".to_string()]);
}

#[tokio::test]
async fn test_pipeline_skips_failed_topic() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let (llm, _) = llm_with(|prompt: &str| {
        if prompt.contains(MINER_MARKER) && topic_of(prompt) == "Energy" {
            Err(GenerationError::Rejected("content policy".to_string()))
        } else {
            happy_upstream(prompt)
        }
    });

    let report = ContentPipeline::new(&db, &llm)
        .run("Biology", "Cells and energy")
        .await
        .unwrap();

    assert_eq!(report.topics_mined, 1);
    assert_eq!(report.topics_skipped, 1);
    assert_eq!(report.cards_created, 2);

    let flashcards = db.list_flashcards(report.study_set.id).await.unwrap();
    assert_eq!(flashcards.len(), 2);
    assert!(flashcards.iter().all(|card| card.tag == "Cells"));
}

#[tokio::test]
async fn test_pipeline_rejects_empty_document() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let (llm, calls) = llm_with(happy_upstream);

    let result = ContentPipeline::new(&db, &llm).run("Empty", "   \n").await;

    assert!(matches!(result, Err(PipelineError::EmptyDocument)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(db.list_study_sets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pipeline_fails_on_empty_syllabus() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let (llm, _) = llm_with(|prompt: &str| {
        if prompt.contains(SYLLABUS_MARKER) {
            Ok("[]".to_string())
        } else {
            happy_upstream(prompt)
        }
    });

    let result = ContentPipeline::new(&db, &llm).run("Biology", "Cells").await;

    assert!(matches!(result, Err(PipelineError::EmptySyllabus)));
    assert!(db.list_study_sets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_syllabus_transient_failures_exhaust_retries() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let (llm, calls) = llm_with(|_: &str| Err(GenerationError::ServerFault("503".to_string())));

    let result = ContentPipeline::new(&db, &llm).run("Biology", "Cells").await;

    assert!(matches!(result, Err(PipelineError::EmptySyllabus)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unavailable_model_gives_offline_syllabus() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let (llm, _) = llm_with(|_: &str| Err(GenerationError::ModelUnavailable("404".to_string())));

    let topics = llm.generate_syllabus("Cells and energy").await;
    assert_eq!(topics.len(), 3);
    assert!(topics.iter().all(|t| t.topic.starts_with(OFFLINE_TOPIC_PREFIX)));

    // Every topic then fails to mine, so the set exists but holds no cards
    let report = ContentPipeline::new(&db, &llm)
        .run("Biology", "Cells and energy")
        .await
        .unwrap();
    assert_eq!(report.topics_planned, 3);
    assert_eq!(report.topics_skipped, 3);
    assert_eq!(report.cards_created, 0);
}

/// Mines slowly and records the highest number of overlapping miner calls.
struct PeakTracker {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl TextGenerator for PeakTracker {
    async fn generate(&self, prompt: &str, _params: Option<SamplingParams>) -> Reply {
        if prompt.contains(SYLLABUS_MARKER) {
            let topics: Vec<_> = ["Cells", "Energy", "Genes", "Enzymes", "Membranes"]
                .iter()
                .map(|name| json!({"topic": name, "complexity": 1, "context": name}))
                .collect();
            return Ok(Value::Array(topics).to_string());
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        happy_upstream(prompt)
    }

    fn provider_name(&self) -> &'static str {
        "PeakTracker"
    }

    fn model_name(&self) -> &str {
        "peak-tracker"
    }
}

#[tokio::test]
async fn test_topic_mining_respects_concurrency_limit() {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let tracker = Arc::new(PeakTracker {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let settings = GenerationConfig::default();
    let limit = settings.topic_concurrency;
    let llm = LLMService::new(tracker.clone(), settings).with_sleeper(Arc::new(NoSleep));

    let report = ContentPipeline::new(&db, &llm)
        .run("Biology", "Cells and energy")
        .await
        .unwrap();

    assert_eq!(report.topics_mined, 5);
    let peak = tracker.peak.load(Ordering::SeqCst);
    assert!(peak <= limit, "peak {} exceeded limit {}", peak, limit);
    assert!(peak > 1, "topics were mined one at a time");
}
