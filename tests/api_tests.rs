mod common;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_test::TestServer;
use common::*;
use serde_json::{Value, json};
use study_forge::GenerationError;
use study_forge::api::*;
use uuid::Uuid;

async fn create_test_server<F>(respond: F) -> TestServer
where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
{
    let app_state = AppState {
        study_service: service_with(respond).await,
    };
    TestServer::new(create_router(app_state)).unwrap()
}

async fn generate_set(server: &TestServer) -> Value {
    let response = server
        .post("/api/study-sets/generate")
        .add_query_param("title", "Biology 101.pdf")
        .bytes(Bytes::from_static(DOCUMENT))
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_api_generate_study_set() {
    let server = create_test_server(happy_upstream).await;

    let body = generate_set(&server).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["study_set"]["title"], "Biology 101");
    assert_eq!(body["data"]["study_set"]["card_count"], 4);
    assert_eq!(body["data"]["topics_mined"], 2);

    let list: Value = server.get("/api/study-sets").await.json();
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_api_generate_empty_document() {
    let server = create_test_server(happy_upstream).await;

    let response = server
        .post("/api/study-sets/generate")
        .add_query_param("title", "blank.txt")
        .bytes(Bytes::from_static(b"  \n "))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_api_study_set_contents() {
    let server = create_test_server(happy_upstream).await;
    let created = generate_set(&server).await;
    let set_id = created["data"]["study_set"]["id"].as_str().unwrap();

    let flashcards: Value = server
        .get(&format!("/api/study-sets/{}/flashcards", set_id))
        .await
        .json();
    assert_eq!(flashcards["data"].as_array().unwrap().len(), 4);
    assert_eq!(flashcards["data"][0]["repetition_number"], 0);
    assert_eq!(flashcards["data"][0]["ease_factor"], 2.5);

    let quiz: Value = server
        .get(&format!("/api/study-sets/{}/quiz", set_id))
        .await
        .json();
    assert_eq!(quiz["data"].as_array().unwrap().len(), 2);
    assert_eq!(quiz["data"][0]["options"].as_array().unwrap().len(), 4);

    let arena = server.get(&format!("/api/study-sets/{}/arena", set_id)).await;
    arena.assert_status_ok();
    let arena: Value = arena.json();
    assert_eq!(arena["data"]["related_topic_tag"], "Cells");
}

#[tokio::test]
async fn test_api_get_nonexistent_study_set() {
    let server = create_test_server(happy_upstream).await;
    let fake_id = Uuid::new_v4();

    server
        .get(&format!("/api/study-sets/{}", fake_id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/api/study-sets/{}/flashcards", fake_id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&format!("/api/study-sets/{}", fake_id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_delete_study_set_cascades() {
    let server = create_test_server(happy_upstream).await;
    let created = generate_set(&server).await;
    let set_id = created["data"]["study_set"]["id"].as_str().unwrap();

    server
        .delete(&format!("/api/study-sets/{}", set_id))
        .await
        .assert_status_ok();

    let due: Value = server.get("/api/flashcards/due").await.json();
    assert!(due["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_api_review_flashcard() {
    let server = create_test_server(happy_upstream).await;
    let created = generate_set(&server).await;
    let set_id = created["data"]["study_set"]["id"].as_str().unwrap();

    // New cards are due immediately
    let due: Value = server.get("/api/flashcards/due").await.json();
    assert_eq!(due["data"].as_array().unwrap().len(), 4);

    let today: Value = server.get("/api/reviews/today").await.json();
    assert_eq!(today["data"][0]["study_set_id"], set_id);
    assert_eq!(today["data"][0]["due_count"], 4);

    let card_id = due["data"][0]["id"].as_str().unwrap();
    let response = server
        .post(&format!("/api/flashcards/{}/review", card_id))
        .json(&json!({"choice": "good"}))
        .await;
    response.assert_status_ok();
    let reviewed: Value = response.json();
    assert_eq!(reviewed["data"]["repetition_number"], 1);
    assert_eq!(reviewed["data"]["interval"], 1.0);

    let due: Value = server.get("/api/flashcards/due").await.json();
    assert_eq!(due["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_api_review_rejects_unknown_choice() {
    let server = create_test_server(happy_upstream).await;

    let response = server
        .post(&format!("/api/flashcards/{}/review", Uuid::new_v4()))
        .json(&json!({"choice": "perfect"}))
        .await;
    assert!(response.status_code().is_client_error());

    server
        .post(&format!("/api/flashcards/{}/review", Uuid::new_v4()))
        .json(&json!({"choice": "easy"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_regenerate_quiz() {
    let server = create_test_server(happy_upstream).await;
    let created = generate_set(&server).await;
    let set_id = created["data"]["study_set"]["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/study-sets/{}/quiz/regenerate", set_id))
        .await;
    response.assert_status_ok();

    let quiz: Value = server
        .get(&format!("/api/study-sets/{}/quiz", set_id))
        .await
        .json();
    let questions: Vec<&str> = quiz["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["question"].as_str().unwrap())
        .collect();
    assert_eq!(questions, vec!["New Q1", "New Q2"]);
    assert_eq!(quiz["data"][1]["correct_answer"], "z");
}

#[tokio::test]
async fn test_api_arena_session_and_grading() {
    let server = create_test_server(happy_upstream).await;
    let created = generate_set(&server).await;
    let set_id = created["data"]["study_set"]["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/study-sets/{}/arena/sessions", set_id))
        .json(&json!({"num_questions": 3, "random_seed": 42}))
        .await;
    response.assert_status_ok();
    let session: Value = response.json();
    assert_eq!(session["data"]["seed"], 42);
    assert_eq!(session["data"]["items"].as_array().unwrap().len(), 3);

    let session_id = session["data"]["id"].as_str().unwrap();
    let fetched: Value = server
        .get(&format!("/api/arena/sessions/{}", session_id))
        .await
        .json();
    assert_eq!(fetched["data"]["items"], session["data"]["items"]);

    let graded: Value = server
        .post("/api/arena/grade")
        .json(&json!({"scenario": "A bakery loses power", "answer": "Move stock to the cold room"}))
        .await
        .json();
    assert_eq!(graded["data"]["score"], 80);
    assert_eq!(graded["data"]["feedback"], "Solid reasoning");
}

#[tokio::test]
async fn test_api_arena_session_validates_size() {
    let server = create_test_server(happy_upstream).await;
    let created = generate_set(&server).await;
    let set_id = created["data"]["study_set"]["id"].as_str().unwrap();

    server
        .post(&format!("/api/study-sets/{}/arena/sessions", set_id))
        .json(&json!({"num_questions": 0}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post(&format!("/api/study-sets/{}/arena/sessions", Uuid::new_v4()))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_grading_never_fails() {
    let server = create_test_server(|prompt: &str| {
        if prompt.contains(GRADER_MARKER) {
            Err(GenerationError::Transport("connection reset".to_string()))
        } else {
            happy_upstream(prompt)
        }
    })
    .await;

    let response = server
        .post("/api/arena/grade")
        .json(&json!({"scenario": "Explain osmosis", "answer": "Water moves"}))
        .await;
    response.assert_status_ok();
    let graded: Value = response.json();
    assert_eq!(graded["data"]["score"], 0);
    assert!(graded["data"]["feedback"].as_str().unwrap().starts_with("Grading unavailable"));
}
