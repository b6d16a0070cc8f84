#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use study_forge::config::GenerationConfig;
use study_forge::{
    Database, GenerationError, LLMService, SamplingParams, Sleeper, StudyService, TextGenerator,
};

pub type Reply = Result<String, GenerationError>;

/// Generator that answers every prompt through a closure and counts calls.
pub struct FnGenerator<F> {
    respond: F,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl<F> TextGenerator for FnGenerator<F>
where
    F: Fn(&str) -> Reply + Send + Sync,
{
    async fn generate(&self, prompt: &str, _params: Option<SamplingParams>) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(prompt)
    }

    fn provider_name(&self) -> &'static str {
        "Fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

pub struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _delay: Duration) {}
}

pub fn llm_with<F>(respond: F) -> (LLMService, Arc<AtomicUsize>)
where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
{
    let calls = Arc::new(AtomicUsize::new(0));
    let generator = FnGenerator {
        respond,
        calls: calls.clone(),
    };
    let llm = LLMService::new(Arc::new(generator), GenerationConfig::default())
        .with_sleeper(Arc::new(NoSleep));
    (llm, calls)
}

pub async fn service_with<F>(respond: F) -> StudyService
where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
{
    let db = Database::new("sqlite::memory:").await.unwrap();
    let (llm, _) = llm_with(respond);
    StudyService::new(db, llm)
}

pub const SYLLABUS_MARKER: &str = "Break it down into distinct";
pub const MINER_MARKER: &str = "Generate exactly";
pub const ARENA_MARKER: &str = "application exercise";
pub const EXAMINER_MARKER: &str = "multiple-choice quiz for the study set";
pub const GRADER_MARKER: &str = "grading a student's answer";

pub fn syllabus_reply() -> String {
    json!([
        {"topic": "Cells", "complexity": 1, "context": "Cell structure"},
        {"topic": "Energy", "complexity": "2", "context": "ATP and respiration"}
    ])
    .to_string()
}

pub fn bundle_reply(topic: &str) -> String {
    json!({
        "flashcards": [
            {"question": format!("What is {}?", topic), "answer": format!("{} explained", topic)},
            {"question": format!("Why does {} matter?", topic), "answer": "Because it does"}
        ],
        "quiz": {
            "question": format!("Which statement about {} is true?", topic),
            "options": ["First", "Second", "Third", "Fourth"],
            "correct_answer": "B"
        },
        "arena": {
            "scenario": format!("Apply {} to a lab problem", topic),
            "ideal_response": "A careful plan"
        }
    })
    .to_string()
}

pub fn quiz_list_reply() -> String {
    json!([
        {
            "question": "New Q1",
            "options": ["a", "b", "c", "d"],
            "correct_answer": "a",
            "tag": "Cells"
        },
        {
            "question": "New Q2",
            "options": ["w", "x", "y", "z"],
            "correct_answer": "z",
            "tag": "Energy"
        }
    ])
    .to_string()
}

pub fn topic_of(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Topic: "))
        .unwrap_or("Unknown")
        .to_string()
}

/// Well-behaved upstream for every stage.
pub fn happy_upstream(prompt: &str) -> Reply {
    if prompt.contains(SYLLABUS_MARKER) {
        Ok(syllabus_reply())
    } else if prompt.contains(MINER_MARKER) {
        Ok(bundle_reply(&topic_of(prompt)))
    } else if prompt.contains(ARENA_MARKER) {
        Ok(json!({"scenario": "A bakery loses power", "ideal_response": "Prioritise"}).to_string())
    } else if prompt.contains(EXAMINER_MARKER) {
        Ok(quiz_list_reply())
    } else if prompt.contains(GRADER_MARKER) {
        Ok(json!({"score": 80, "feedback": "Solid reasoning"}).to_string())
    } else {
        Err(GenerationError::Rejected("unexpected prompt".to_string()))
    }
}

pub const DOCUMENT: &[u8] = b"Cells are the basic unit of life. Energy flows through ATP.";
