use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::log_db_operation;
use crate::models::*;
use crate::scheduler::SchedulingState;

/// Fixed-width UTC timestamps, so string comparison in SQL matches time order. Review intervals
/// are capped, which keeps stored dates inside four-digit years.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(raw)?)
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database is a separate database.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        let db = Database { pool };
        db.migrate().await?;
        log_db_operation!(info, "migrate", "database initialized");
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS study_sets (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                card_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                study_set_id TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                tag TEXT NOT NULL,
                repetition_number INTEGER NOT NULL DEFAULT 0,
                interval REAL NOT NULL DEFAULT 0.0,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                next_review_date TEXT NOT NULL,
                FOREIGN KEY (study_set_id) REFERENCES study_sets(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_flashcards_next_review ON flashcards(next_review_date)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quiz_questions (
                id TEXT PRIMARY KEY,
                study_set_id TEXT NOT NULL,
                question TEXT NOT NULL,
                options TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                tag TEXT NOT NULL,
                FOREIGN KEY (study_set_id) REFERENCES study_sets(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS arena_challenges (
                id TEXT PRIMARY KEY,
                study_set_id TEXT NOT NULL,
                scenario TEXT NOT NULL,
                ideal_response TEXT NOT NULL,
                related_topic_tag TEXT NOT NULL,
                FOREIGN KEY (study_set_id) REFERENCES study_sets(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS arena_sessions (
                id TEXT PRIMARY KEY,
                study_set_id TEXT NOT NULL,
                seed TEXT NOT NULL,
                items TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (study_set_id) REFERENCES study_sets(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Study set operations
    pub async fn create_study_set(&self, title: &str) -> Result<StudySet> {
        let study_set = StudySet {
            id: Uuid::new_v4(),
            title: title.to_string(),
            card_count: 0,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO study_sets (id, title, card_count, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(study_set.id.to_string())
        .bind(&study_set.title)
        .bind(study_set.card_count)
        .bind(timestamp(study_set.created_at))
        .execute(&self.pool)
        .await?;

        Ok(study_set)
    }

    pub async fn list_study_sets(&self) -> Result<Vec<StudySet>> {
        let rows = sqlx::query("SELECT * FROM study_sets ORDER BY created_at DESC, rowid DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_study_set).collect()
    }

    pub async fn get_study_set(&self, id: Uuid) -> Result<Option<StudySet>> {
        let row = sqlx::query("SELECT * FROM study_sets WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_study_set).transpose()
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Delete a study set together with everything generated for it.
    pub async fn delete_study_set(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM study_sets WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_card_count(&self, id: Uuid, card_count: i64) -> Result<()> {
        sqlx::query("UPDATE study_sets SET card_count = ?1 WHERE id = ?2")
            .bind(card_count)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Store everything mined for one topic in a single transaction. New flashcards start with
    /// the initial scheduling state and are due at `now`. Returns the number of flashcards stored.
    pub async fn save_bundle(
        &self,
        study_set_id: Uuid,
        bundle: &ContentBundle,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let initial = SchedulingState::initial(now);
        let mut tx = self.pool.begin().await?;

        for card in &bundle.flashcards {
            sqlx::query(
                r#"
                INSERT INTO flashcards (id, study_set_id, question, answer, tag,
                                        repetition_number, interval, ease_factor, next_review_date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(study_set_id.to_string())
            .bind(&card.question)
            .bind(&card.answer)
            .bind(&card.tag)
            .bind(i64::from(initial.repetition_number))
            .bind(initial.interval)
            .bind(initial.ease_factor)
            .bind(timestamp(initial.next_review_date))
            .execute(&mut *tx)
            .await?;
        }

        if let Some(quiz) = &bundle.quiz {
            insert_quiz(&mut tx, study_set_id, quiz).await?;
        }

        if let Some(arena) = &bundle.arena {
            sqlx::query(
                r#"
                INSERT INTO arena_challenges
                    (id, study_set_id, scenario, ideal_response, related_topic_tag)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(study_set_id.to_string())
            .bind(&arena.scenario)
            .bind(&arena.ideal_response)
            .bind(&arena.related_topic_tag)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        log_db_operation!(
            debug,
            "save_bundle",
            study_set_id = study_set_id,
            count = bundle.flashcards.len()
        );

        Ok(bundle.flashcards.len())
    }

    // Flashcard operations
    pub async fn list_flashcards(&self, study_set_id: Uuid) -> Result<Vec<Flashcard>> {
        let rows = sqlx::query("SELECT * FROM flashcards WHERE study_set_id = ?1 ORDER BY rowid")
            .bind(study_set_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_flashcard).collect()
    }

    pub async fn list_all_flashcards(&self) -> Result<Vec<Flashcard>> {
        let rows = sqlx::query("SELECT * FROM flashcards ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_flashcard).collect()
    }

    pub async fn get_flashcard(&self, id: Uuid) -> Result<Option<Flashcard>> {
        let row = sqlx::query("SELECT * FROM flashcards WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_flashcard).transpose()
    }

    /// Distinct flashcard tags of a study set in first-seen order.
    pub async fn list_topics(&self, study_set_id: Uuid) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT tag FROM flashcards WHERE study_set_id = ?1 GROUP BY tag ORDER BY MIN(rowid)",
        )
        .bind(study_set_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("tag").map_err(Into::into))
            .collect()
    }

    pub async fn update_flashcard_schedule(
        &self,
        id: Uuid,
        state: &SchedulingState,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE flashcards
            SET repetition_number = ?1, interval = ?2, ease_factor = ?3, next_review_date = ?4
            WHERE id = ?5
            "#,
        )
        .bind(i64::from(state.repetition_number))
        .bind(state.interval)
        .bind(state.ease_factor)
        .bind(timestamp(state.next_review_date))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_due_flashcards(&self, now: DateTime<Utc>) -> Result<Vec<Flashcard>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM flashcards
            WHERE next_review_date <= ?1
            ORDER BY next_review_date ASC, rowid
            "#,
        )
        .bind(timestamp(now))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_flashcard).collect()
    }

    /// Due flashcard count for every study set, including sets with nothing due.
    pub async fn due_counts_by_set(&self, now: DateTime<Utc>) -> Result<Vec<DueSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id AS id, s.title AS title,
                   COUNT(f.id) AS due_count
            FROM study_sets s
            LEFT JOIN flashcards f
                ON f.study_set_id = s.id AND f.next_review_date <= ?1
            GROUP BY s.id, s.title
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(timestamp(now))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DueSummary> {
                Ok(DueSummary {
                    study_set_id: parse_id(&row.try_get::<String, _>("id")?)?,
                    title: row.try_get("title")?,
                    due_count: row.try_get("due_count")?,
                })
            })
            .collect()
    }

    // Quiz operations
    pub async fn list_quiz_items(&self, study_set_id: Uuid) -> Result<Vec<QuizItem>> {
        let rows =
            sqlx::query("SELECT * FROM quiz_questions WHERE study_set_id = ?1 ORDER BY rowid")
            .bind(study_set_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_quiz_item).collect()
    }

    /// Swap a study set's quiz for `drafts` atomically. Either all old items are replaced or
    /// none are.
    pub async fn replace_quiz_items(
        &self,
        study_set_id: Uuid,
        drafts: &[QuizDraft],
    ) -> Result<Vec<QuizItem>> {
        if drafts.is_empty() {
            return Err(anyhow!("refusing to replace a quiz with an empty set"));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM quiz_questions WHERE study_set_id = ?1")
            .bind(study_set_id.to_string())
            .execute(&mut *tx)
            .await?;

        let mut items = Vec::with_capacity(drafts.len());
        for draft in drafts {
            items.push(insert_quiz(&mut tx, study_set_id, draft).await?);
        }
        tx.commit().await?;

        log_db_operation!(
            debug,
            "replace_quiz_items",
            study_set_id = study_set_id,
            count = items.len()
        );
        Ok(items)
    }

    // Arena operations
    pub async fn get_arena_challenge(&self, study_set_id: Uuid) -> Result<Option<ArenaChallenge>> {
        let row = sqlx::query(
            "SELECT * FROM arena_challenges WHERE study_set_id = ?1 ORDER BY rowid LIMIT 1",
        )
        .bind(study_set_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<ArenaChallenge> {
            Ok(ArenaChallenge {
                id: parse_id(&row.try_get::<String, _>("id")?)?,
                study_set_id: parse_id(&row.try_get::<String, _>("study_set_id")?)?,
                scenario: row.try_get("scenario")?,
                ideal_response: row.try_get("ideal_response")?,
                related_topic_tag: row.try_get("related_topic_tag")?,
            })
        })
        .transpose()
    }

    pub async fn save_arena_session(
        &self,
        study_set_id: Uuid,
        seed: u64,
        items: Vec<ArenaSessionItem>,
    ) -> Result<ArenaSession> {
        let session = ArenaSession {
            id: Uuid::new_v4(),
            study_set_id,
            seed,
            items,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO arena_sessions (id, study_set_id, seed, items, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.study_set_id.to_string())
        .bind(session.seed.to_string())
        .bind(serde_json::to_string(&session.items)?)
        .bind(timestamp(session.created_at))
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get_arena_session(&self, id: Uuid) -> Result<Option<ArenaSession>> {
        let row = sqlx::query("SELECT * FROM arena_sessions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<ArenaSession> {
            Ok(ArenaSession {
                id: parse_id(&row.try_get::<String, _>("id")?)?,
                study_set_id: parse_id(&row.try_get::<String, _>("study_set_id")?)?,
                seed: row.try_get::<String, _>("seed")?.parse()?,
                items: serde_json::from_str(&row.try_get::<String, _>("items")?)?,
                created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
            })
        })
        .transpose()
    }
}

async fn insert_quiz(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    study_set_id: Uuid,
    draft: &QuizDraft,
) -> Result<QuizItem> {
    let item = QuizItem {
        id: Uuid::new_v4(),
        study_set_id,
        question: draft.question.clone(),
        options: draft.options.clone(),
        correct_answer: draft.correct_answer.clone(),
        tag: draft.tag.clone(),
    };

    sqlx::query(
        r#"
        INSERT INTO quiz_questions (id, study_set_id, question, options, correct_answer, tag)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(item.id.to_string())
    .bind(item.study_set_id.to_string())
    .bind(&item.question)
    .bind(serde_json::to_string(&item.options)?)
    .bind(&item.correct_answer)
    .bind(&item.tag)
    .execute(&mut **tx)
    .await?;

    Ok(item)
}

fn row_to_study_set(row: &SqliteRow) -> Result<StudySet> {
    Ok(StudySet {
        id: parse_id(&row.try_get::<String, _>("id")?)?,
        title: row.try_get("title")?,
        card_count: row.try_get("card_count")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn row_to_flashcard(row: &SqliteRow) -> Result<Flashcard> {
    Ok(Flashcard {
        id: parse_id(&row.try_get::<String, _>("id")?)?,
        study_set_id: parse_id(&row.try_get::<String, _>("study_set_id")?)?,
        question: row.try_get("question")?,
        answer: row.try_get("answer")?,
        tag: row.try_get("tag")?,
        repetition_number: u32::try_from(row.try_get::<i64, _>("repetition_number")?)?,
        interval: row.try_get("interval")?,
        ease_factor: row.try_get("ease_factor")?,
        next_review_date: parse_timestamp(&row.try_get::<String, _>("next_review_date")?)?,
    })
}

fn row_to_quiz_item(row: &SqliteRow) -> Result<QuizItem> {
    Ok(QuizItem {
        id: parse_id(&row.try_get::<String, _>("id")?)?,
        study_set_id: parse_id(&row.try_get::<String, _>("study_set_id")?)?,
        question: row.try_get("question")?,
        options: serde_json::from_str(&row.try_get::<String, _>("options")?)?,
        correct_answer: row.try_get("correct_answer")?,
        tag: row.try_get("tag")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    fn bundle(topic: &str, cards: usize) -> ContentBundle {
        ContentBundle {
            flashcards: (0..cards)
                .map(|i| FlashcardDraft {
                    question: format!("{} question {}", topic, i),
                    answer: format!("{} answer {}", topic, i),
                    tag: topic.to_string(),
                })
                .collect(),
            quiz: Some(QuizDraft {
                question: format!("Quiz on {}", topic),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer: "c".into(),
                tag: topic.to_string(),
            }),
            arena: Some(ArenaDraft {
                scenario: format!("Apply {}", topic),
                ideal_response: "Carefully".into(),
                related_topic_tag: topic.to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_save_bundle_initializes_schedule() {
        let db = db().await;
        let set = db.create_study_set("Biology").await.unwrap();
        let now = Utc::now();

        let saved = db.save_bundle(set.id, &bundle("Cells", 3), now).await.unwrap();
        assert_eq!(saved, 3);

        let cards = db.list_flashcards(set.id).await.unwrap();
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].question, "Cells question 0");
        for card in &cards {
            assert_eq!(card.repetition_number, 0);
            assert_eq!(card.interval, 0.0);
            assert_eq!(card.ease_factor, 2.5);
            assert!((card.next_review_date - now).num_milliseconds().abs() <= 1);
        }

        let quiz = db.list_quiz_items(set.id).await.unwrap();
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].options, vec!["a", "b", "c", "d"]);

        let arena = db.get_arena_challenge(set.id).await.unwrap().unwrap();
        assert_eq!(arena.related_topic_tag, "Cells");
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let db = db().await;
        let set = db.create_study_set("Chemistry").await.unwrap();
        db.save_bundle(set.id, &bundle("Bonds", 2), Utc::now()).await.unwrap();
        let session = db.save_arena_session(set.id, 9, Vec::new()).await.unwrap();

        assert!(db.delete_study_set(set.id).await.unwrap());
        assert!(db.get_study_set(set.id).await.unwrap().is_none());
        assert!(db.list_flashcards(set.id).await.unwrap().is_empty());
        assert!(db.list_quiz_items(set.id).await.unwrap().is_empty());
        assert!(db.get_arena_challenge(set.id).await.unwrap().is_none());
        assert!(db.get_arena_session(session.id).await.unwrap().is_none());
        assert!(!db.delete_study_set(set.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_due_queries_follow_schedule() {
        let db = db().await;
        let set = db.create_study_set("Physics").await.unwrap();
        let now = Utc::now();
        db.save_bundle(set.id, &bundle("Motion", 2), now).await.unwrap();

        let cards = db.list_flashcards(set.id).await.unwrap();
        let later = SchedulingState {
            repetition_number: 1,
            interval: 1.0,
            ease_factor: 2.5,
            next_review_date: now + Duration::days(1),
        };
        assert!(db.update_flashcard_schedule(cards[0].id, &later).await.unwrap());

        let due = db.get_due_flashcards(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, cards[1].id);

        let summary = db.due_counts_by_set(now).await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].due_count, 1);

        let tomorrow = db.due_counts_by_set(now + Duration::days(2)).await.unwrap();
        assert_eq!(tomorrow[0].due_count, 2);

        let reloaded = db.get_flashcard(cards[0].id).await.unwrap().unwrap();
        assert_eq!(reloaded.repetition_number, 1);
    }

    #[tokio::test]
    async fn test_replace_quiz_items() {
        let db = db().await;
        let set = db.create_study_set("History").await.unwrap();
        db.save_bundle(set.id, &bundle("Rome", 1), Utc::now()).await.unwrap();

        let drafts = vec![
            QuizDraft {
                question: "New 1".into(),
                options: vec!["x".into(), "y".into()],
                correct_answer: "y".into(),
                tag: "Rome".into(),
            },
            QuizDraft {
                question: "New 2".into(),
                options: vec!["p".into(), "q".into()],
                correct_answer: "p".into(),
                tag: "Rome".into(),
            },
        ];
        let items = db.replace_quiz_items(set.id, &drafts).await.unwrap();
        assert_eq!(items.len(), 2);

        let stored = db.list_quiz_items(set.id).await.unwrap();
        assert_eq!(
            stored.iter().map(|q| q.question.as_str()).collect::<Vec<_>>(),
            ["New 1", "New 2"]
        );

        assert!(db.replace_quiz_items(set.id, &[]).await.is_err());
        assert_eq!(db.list_quiz_items(set.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_arena_session_round_trip_and_topics() {
        let db = db().await;
        let set = db.create_study_set("Economics").await.unwrap();
        db.save_bundle(set.id, &bundle("Supply", 1), Utc::now()).await.unwrap();
        db.save_bundle(set.id, &bundle("Demand", 1), Utc::now()).await.unwrap();
        db.save_bundle(set.id, &bundle("Supply", 1), Utc::now()).await.unwrap();

        assert_eq!(db.list_topics(set.id).await.unwrap(), vec!["Supply", "Demand"]);

        let items = vec![ArenaSessionItem {
            question_text: "Q".into(),
            ideal_response: "A".into(),
            meta: ArenaItemMeta {
                variant: "applied".into(),
                seed: u64::MAX,
                topic: "Supply".into(),
            },
        }];
        let session = db.save_arena_session(set.id, u64::MAX, items.clone()).await.unwrap();
        let loaded = db.get_arena_session(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.seed, u64::MAX);
        assert_eq!(loaded.items, items);
    }
}
