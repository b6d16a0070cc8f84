use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::{
    errors::{ApiError, ErrorContext},
    models::*,
    study_service::StudyService,
};

use crate::{log_api_error, log_api_start, log_api_success, log_api_warn};

#[derive(Clone)]
pub struct AppState {
    pub study_service: StudyService,
}

#[derive(Deserialize)]
pub struct GenerateParams {
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

fn reject(
    error: impl Into<ApiError>,
    operation: &str,
    resource: &str,
    id: Option<Uuid>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let mut context = ErrorContext::new(operation, resource);
    if let Some(id) = id {
        context = context.with_id(&id.to_string());
    }
    error.into().to_response_with_context(context)
}

// Study set endpoints
pub async fn generate_study_set(
    State(state): State<AppState>,
    Query(params): Query<GenerateParams>,
    body: Bytes,
) -> ApiResult<GenerationReport> {
    let file_name = params.title.unwrap_or_default();
    log_api_start!("generate_study_set");

    match state.study_service.generate_study_set(&file_name, &body).await {
        Ok(report) => {
            log_api_success!(
                "generate_study_set",
                study_set_id = report.study_set.id,
                "study set generated"
            );
            Ok(Json(ApiResponse::success(report)))
        }
        Err(e) => {
            log_api_warn!("generate_study_set", e.to_string());
            Err(reject(e, "generate_study_set", "study_set", None))
        }
    }
}

pub async fn list_study_sets(State(state): State<AppState>) -> ApiResult<Vec<StudySet>> {
    log_api_start!("list_study_sets");

    match state.study_service.list_study_sets().await {
        Ok(sets) => {
            log_api_success!("list_study_sets", count = sets.len(), "study sets listed");
            Ok(Json(ApiResponse::success(sets)))
        }
        Err(e) => {
            log_api_error!("list_study_sets", error = e, "database error listing study sets");
            Err(reject(e, "list_study_sets", "study_set", None))
        }
    }
}

pub async fn get_study_set(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StudySet> {
    log_api_start!("get_study_set", study_set_id = id);

    match state.study_service.get_study_set(id).await {
        Ok(Some(study_set)) => {
            log_api_success!("get_study_set", study_set_id = id, "study set retrieved");
            Ok(Json(ApiResponse::success(study_set)))
        }
        Ok(None) => {
            log_api_warn!("get_study_set", study_set_id = id, "study set not found");
            let error = ApiError::NotFound(format!("Study set with ID '{}' not found", id));
            Err(reject(error, "get_study_set", "study_set", Some(id)))
        }
        Err(e) => {
            log_api_error!(
                "get_study_set",
                study_set_id = id,
                error = e,
                "database error retrieving study set"
            );
            Err(reject(e, "get_study_set", "study_set", Some(id)))
        }
    }
}

pub async fn delete_study_set(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<bool> {
    log_api_start!("delete_study_set", study_set_id = id);

    match state.study_service.delete_study_set(id).await {
        Ok(true) => {
            log_api_success!("delete_study_set", study_set_id = id, "study set deleted");
            Ok(Json(ApiResponse::success(true)))
        }
        Ok(false) => {
            let error = ApiError::NotFound(format!("Study set with ID '{}' not found", id));
            Err(reject(error, "delete_study_set", "study_set", Some(id)))
        }
        Err(e) => Err(reject(e, "delete_study_set", "study_set", Some(id))),
    }
}

pub async fn list_flashcards(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Flashcard>> {
    log_api_start!("list_flashcards", study_set_id = id);

    state
        .study_service
        .list_flashcards(id)
        .await
        .map(|cards| Json(ApiResponse::success(cards)))
        .map_err(|e| reject(e, "list_flashcards", "study_set", Some(id)))
}

pub async fn list_quiz_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<QuizItem>> {
    log_api_start!("list_quiz_items", study_set_id = id);

    state
        .study_service
        .list_quiz_items(id)
        .await
        .map(|items| Json(ApiResponse::success(items)))
        .map_err(|e| reject(e, "list_quiz_items", "study_set", Some(id)))
}

pub async fn regenerate_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<QuizItem>> {
    log_api_start!("regenerate_quiz", study_set_id = id);

    match state.study_service.regenerate_quiz(id).await {
        Ok(items) => {
            log_api_success!("regenerate_quiz", study_set_id = id, "quiz replaced");
            Ok(Json(ApiResponse::success(items)))
        }
        Err(e) => {
            log_api_warn!("regenerate_quiz", study_set_id = id, "existing quiz kept");
            Err(reject(e, "regenerate_quiz", "quiz", Some(id)))
        }
    }
}

pub async fn get_arena_challenge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ArenaChallenge> {
    log_api_start!("get_arena_challenge", study_set_id = id);

    match state.study_service.get_arena_challenge(id).await {
        Ok(Some(challenge)) => Ok(Json(ApiResponse::success(challenge))),
        Ok(None) => {
            let error = ApiError::NotFound(format!("No arena challenge for study set '{}'", id));
            Err(reject(error, "get_arena_challenge", "arena_challenge", Some(id)))
        }
        Err(e) => Err(reject(e, "get_arena_challenge", "arena_challenge", Some(id))),
    }
}

// Arena session endpoints
pub async fn start_arena_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(params): Json<SessionParams>,
) -> ApiResult<ArenaSession> {
    log_api_start!("start_arena_session", study_set_id = id);

    match state.study_service.start_arena_session(id, params).await {
        Ok(session) => {
            log_api_success!(
                "start_arena_session",
                session_id = session.id,
                "arena session created"
            );
            Ok(Json(ApiResponse::success(session)))
        }
        Err(e) => Err(reject(e, "start_arena_session", "study_set", Some(id))),
    }
}

pub async fn get_arena_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ArenaSession> {
    log_api_start!("get_arena_session", session_id = id);

    match state.study_service.get_arena_session(id).await {
        Ok(Some(session)) => Ok(Json(ApiResponse::success(session))),
        Ok(None) => {
            let error = ApiError::NotFound(format!("Arena session with ID '{}' not found", id));
            Err(reject(error, "get_arena_session", "arena_session", Some(id)))
        }
        Err(e) => Err(reject(e, "get_arena_session", "arena_session", Some(id))),
    }
}

pub async fn grade_arena_answer(
    State(state): State<AppState>,
    Json(request): Json<GradeRequest>,
) -> ApiResult<GradingResult> {
    log_api_start!("grade_arena_answer");

    state
        .study_service
        .grade_arena(&request)
        .await
        .map(|result| Json(ApiResponse::success(result)))
        .map_err(|e| reject(e, "grade_arena_answer", "arena_answer", None))
}

// Review endpoints
pub async fn get_due_flashcards(State(state): State<AppState>) -> ApiResult<Vec<Flashcard>> {
    log_api_start!("get_due_flashcards");

    match state.study_service.get_due_flashcards().await {
        Ok(cards) => {
            log_api_success!("get_due_flashcards", count = cards.len(), "due flashcards retrieved");
            Ok(Json(ApiResponse::success(cards)))
        }
        Err(e) => Err(reject(e, "get_due_flashcards", "flashcard", None)),
    }
}

pub async fn review_flashcard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<Flashcard> {
    log_api_start!("review_flashcard", flashcard_id = id);

    match state.study_service.review_flashcard(id, request.choice).await {
        Ok(Some(card)) => {
            log_api_success!("review_flashcard", flashcard_id = id, "flashcard rescheduled");
            Ok(Json(ApiResponse::success(card)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Flashcard with ID '{}' not found", id));
            Err(reject(error, "review_flashcard", "flashcard", Some(id)))
        }
        Err(e) => Err(reject(e, "review_flashcard", "flashcard", Some(id))),
    }
}

pub async fn todays_reviews(State(state): State<AppState>) -> ApiResult<Vec<DueSummary>> {
    log_api_start!("todays_reviews");

    state
        .study_service
        .todays_reviews()
        .await
        .map(|summary| Json(ApiResponse::success(summary)))
        .map_err(|e| reject(e, "todays_reviews", "study_set", None))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Study set routes
        .route("/api/study-sets/generate", post(generate_study_set))
        .route("/api/study-sets", get(list_study_sets))
        .route("/api/study-sets/:id", get(get_study_set).delete(delete_study_set))
        .route("/api/study-sets/:id/flashcards", get(list_flashcards))
        .route("/api/study-sets/:id/quiz", get(list_quiz_items))
        .route("/api/study-sets/:id/quiz/regenerate", post(regenerate_quiz))
        .route("/api/study-sets/:id/arena", get(get_arena_challenge))
        .route("/api/study-sets/:id/arena/sessions", post(start_arena_session))

        // Arena routes
        .route("/api/arena/sessions/:id", get(get_arena_session))
        .route("/api/arena/grade", post(grade_arena_answer))

        // Review routes
        .route("/api/flashcards/due", get(get_due_flashcards))
        .route("/api/flashcards/:id/review", post(review_flashcard))
        .route("/api/reviews/today", get(todays_reviews))

        .layer(CorsLayer::permissive())
        .with_state(state)
}
