use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::Database;
use crate::errors::{ApiError, PipelineError};
use crate::extractor::{DocumentExtractor, PlainTextExtractor, derive_title};
use crate::llm_service::LLMService;
use crate::models::*;
use crate::pipeline::ContentPipeline;
use crate::scheduler::{ReviewChoice, Sm2Scheduler};

/// Application service tying storage, generation and scheduling together.
#[derive(Clone)]
pub struct StudyService {
    db: Database,
    llm: LLMService,
    scheduler: Sm2Scheduler,
    extractor: Arc<dyn DocumentExtractor>,
}

impl StudyService {
    pub fn new(db: Database, llm: LLMService) -> Self {
        Self {
            db,
            llm,
            scheduler: Sm2Scheduler::new(),
            extractor: Arc::new(PlainTextExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // Generation
    pub async fn generate_study_set(
        &self,
        file_name: &str,
        content: &[u8],
    ) -> std::result::Result<GenerationReport, PipelineError> {
        let text = self.extractor.extract_text(content);
        let title = derive_title(file_name);
        ContentPipeline::new(&self.db, &self.llm).run(&title, &text).await
    }

    // Study sets
    pub async fn list_study_sets(&self) -> Result<Vec<StudySet>> {
        self.db.list_study_sets().await
    }

    pub async fn get_study_set(&self, id: Uuid) -> Result<Option<StudySet>> {
        self.db.get_study_set(id).await
    }

    pub async fn delete_study_set(&self, id: Uuid) -> Result<bool> {
        self.db.delete_study_set(id).await
    }

    async fn require_study_set(&self, id: Uuid) -> std::result::Result<StudySet, ApiError> {
        self.db
            .get_study_set(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Study set {} not found", id)))
    }

    pub async fn list_flashcards(
        &self,
        study_set_id: Uuid,
    ) -> std::result::Result<Vec<Flashcard>, ApiError> {
        self.require_study_set(study_set_id).await?;
        Ok(self.db.list_flashcards(study_set_id).await?)
    }

    pub async fn list_quiz_items(
        &self,
        study_set_id: Uuid,
    ) -> std::result::Result<Vec<QuizItem>, ApiError> {
        self.require_study_set(study_set_id).await?;
        Ok(self.db.list_quiz_items(study_set_id).await?)
    }

    pub async fn get_arena_challenge(&self, study_set_id: Uuid) -> Result<Option<ArenaChallenge>> {
        self.db.get_arena_challenge(study_set_id).await
    }

    /// Replace a study set's quiz with freshly generated questions. When generation fails the
    /// stored quiz is left exactly as it was.
    pub async fn regenerate_quiz(
        &self,
        study_set_id: Uuid,
    ) -> std::result::Result<Vec<QuizItem>, ApiError> {
        let study_set = self.require_study_set(study_set_id).await?;
        let flashcards = self.db.list_flashcards(study_set_id).await?;
        if flashcards.is_empty() {
            return Err(ApiError::ValidationError(
                "Study set has no flashcards to build a quiz from".to_string(),
            ));
        }

        let drafts = self
            .llm
            .regenerate_quiz(&study_set.title, &flashcards)
            .await
            .ok_or_else(|| {
                ApiError::LLMError("quiz regeneration produced no questions".to_string())
            })?;

        Ok(self.db.replace_quiz_items(study_set_id, &drafts).await?)
    }

    // Arena
    pub async fn start_arena_session(
        &self,
        study_set_id: Uuid,
        params: SessionParams,
    ) -> std::result::Result<ArenaSession, ApiError> {
        let max_questions = self.llm.settings().max_session_questions;
        if params.num_questions == 0 || params.num_questions > max_questions {
            return Err(ApiError::ValidationError(format!(
                "num_questions must be between 1 and {}",
                max_questions
            )));
        }
        if !(0.0..=2.0).contains(&params.temperature) {
            return Err(ApiError::ValidationError(
                "temperature must be between 0 and 2".to_string(),
            ));
        }
        if !(params.top_p > 0.0 && params.top_p <= 1.0) {
            return Err(ApiError::ValidationError(
                "top_p must be in (0, 1]".to_string(),
            ));
        }

        let study_set = self.require_study_set(study_set_id).await?;
        let topics = self.db.list_topics(study_set_id).await?;
        let generated = self
            .llm
            .generate_arena_session(&study_set.title, &topics, &params)
            .await;

        Ok(self
            .db
            .save_arena_session(study_set_id, generated.seed, generated.items)
            .await?)
    }

    pub async fn get_arena_session(&self, id: Uuid) -> Result<Option<ArenaSession>> {
        self.db.get_arena_session(id).await
    }

    pub async fn grade_arena(
        &self,
        request: &GradeRequest,
    ) -> std::result::Result<GradingResult, ApiError> {
        if request.scenario.trim().is_empty() {
            return Err(ApiError::ValidationError("scenario must not be empty".to_string()));
        }
        Ok(self
            .llm
            .grade_arena_answer(
                &request.scenario,
                &request.answer,
                request.ideal_response.as_deref(),
            )
            .await)
    }

    // Review operations
    pub async fn get_due_flashcards(&self) -> Result<Vec<Flashcard>> {
        self.db.get_due_flashcards(Utc::now()).await
    }

    pub async fn todays_reviews(&self) -> Result<Vec<DueSummary>> {
        self.db.due_counts_by_set(Utc::now()).await
    }

    /// Apply a learner's rating to a flashcard. `None` when the flashcard does not exist.
    pub async fn review_flashcard(
        &self,
        card_id: Uuid,
        choice: ReviewChoice,
    ) -> Result<Option<Flashcard>> {
        let Some(mut card) = self.db.get_flashcard(card_id).await? else {
            return Ok(None);
        };

        let next = self
            .scheduler
            .schedule(&card.scheduling_state(), choice, Utc::now());
        self.db.update_flashcard_schedule(card_id, &next).await?;

        card.repetition_number = next.repetition_number;
        card.interval = next.interval;
        card.ease_factor = next.ease_factor;
        card.next_review_date = next.next_review_date;
        Ok(Some(card))
    }
}
