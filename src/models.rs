use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scheduler::SchedulingState;

/// One segment of a document's syllabus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDescriptor {
    pub topic: String,
    pub complexity: u8, // 1..=5
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardDraft {
    pub question: String,
    pub answer: String,
    pub tag: String,
}

/// Multiple-choice question. `options` is always an ordered list and contains `correct_answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaDraft {
    pub scenario: String,
    pub ideal_response: String,
    pub related_topic_tag: String,
}

/// Everything mined for a single topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBundle {
    pub flashcards: Vec<FlashcardDraft>,
    pub quiz: Option<QuizDraft>,
    pub arena: Option<ArenaDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySet {
    pub id: Uuid,
    pub title: String,
    pub card_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub study_set_id: Uuid,
    pub question: String,
    pub answer: String,
    pub tag: String,
    pub repetition_number: u32,
    pub interval: f64, // days
    pub ease_factor: f64,
    pub next_review_date: DateTime<Utc>,
}

impl Flashcard {
    pub fn scheduling_state(&self) -> SchedulingState {
        SchedulingState {
            repetition_number: self.repetition_number,
            interval: self.interval,
            ease_factor: self.ease_factor,
            next_review_date: self.next_review_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: Uuid,
    pub study_set_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaChallenge {
    pub id: Uuid,
    pub study_set_id: Uuid,
    pub scenario: String,
    pub ideal_response: String,
    pub related_topic_tag: String,
}

/// Knobs for one arena session request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    #[serde(default = "default_num_questions")]
    pub num_questions: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_num_questions() -> usize {
    5
}

fn default_temperature() -> f32 {
    0.9
}

fn default_top_p() -> f32 {
    0.95
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            num_questions: default_num_questions(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            random_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaItemMeta {
    pub variant: String,
    pub seed: u64,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaSessionItem {
    pub question_text: String,
    pub ideal_response: String,
    pub meta: ArenaItemMeta,
}

/// A generated batch of scenarios. Never modified after it is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaSession {
    pub id: Uuid,
    pub study_set_id: Uuid,
    pub seed: u64,
    pub items: Vec<ArenaSessionItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub score: u8, // 0..=100
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    pub scenario: String,
    pub answer: String,
    #[serde(default)]
    pub ideal_response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub choice: crate::scheduler::ReviewChoice,
}

/// Outcome of a whole-document generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub study_set: StudySet,
    pub topics_planned: usize,
    pub topics_mined: usize,
    pub topics_skipped: usize,
    pub cards_created: usize,
}

/// Per-set count of flashcards due for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueSummary {
    pub study_set_id: Uuid,
    pub title: String,
    pub due_count: i64,
}
