use tracing::{error, info, warn};

use crate::llm_service::LLMService;
use crate::log_pipeline_stage;
use crate::models::{Flashcard, QuizDraft};
use crate::normalize::normalize_quiz_list;

/// Flashcards rendered as a `Q:`/`A:` transcript, stopping before `max_chars` is exceeded.
pub fn flashcard_context(flashcards: &[Flashcard], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0;
    for card in flashcards {
        let entry = format!("[{}] Q: {}\nA: {}\n\n", card.tag, card.question, card.answer);
        let entry_chars = entry.chars().count();
        if used + entry_chars > max_chars {
            break;
        }
        context.push_str(&entry);
        used += entry_chars;
    }
    context
}

impl LLMService {
    /// Produce a fresh set of multiple-choice questions from a study set's flashcards.
    ///
    /// `None` means nothing valid came back; the caller must keep the existing quiz.
    pub async fn regenerate_quiz(
        &self,
        title: &str,
        flashcards: &[Flashcard],
    ) -> Option<Vec<QuizDraft>> {
        let count = self.settings.regenerated_quiz_count;
        log_pipeline_stage!("examiner", count = count, "regenerating quiz");

        let context = flashcard_context(flashcards, self.settings.quiz_context_chars);
        if context.is_empty() {
            warn!(title = %title, "No flashcard material to build a quiz from");
            return None;
        }

        let prompt = format!(
            r#"You are a university examiner writing a multiple-choice quiz for the study set "{title}".
Use ONLY the material below. Each entry is prefixed with its topic in brackets.

{context}
Write exactly {count} new multiple-choice questions that test understanding rather than recall of wording.
Each question has 4 options; "correct_answer" must repeat the text of the correct option exactly;
"tag" is the bracketed topic the question is about.

Return STRICTLY as a JSON list:
[{{"question": "...", "options": ["...", "...", "...", "..."], "correct_answer": "...", "tag": "..."}}]"#,
            title = title,
            context = context,
            count = count,
        );

        match self.request_json("regenerate_quiz", &prompt, None).await {
            Ok(Some(value)) => {
                let mut quizzes = normalize_quiz_list(&value, title);
                quizzes.truncate(count);
                if quizzes.is_empty() {
                    warn!(title = %title, "Regenerated quiz contained no valid questions");
                    return None;
                }
                info!(
                    title = %title,
                    requested = count,
                    received = quizzes.len(),
                    "Quiz regenerated"
                );
                Some(quizzes)
            }
            Ok(None) => {
                warn!(
                    title = %title,
                    "Quiz regeneration gave up after repeated transient failures"
                );
                None
            }
            Err(e) => {
                error!(title = %title, error = %e, "Quiz regeneration failed");
                None
            }
        }
    }
}
