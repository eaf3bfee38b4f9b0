use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::{seed_standard_assessment, start_payload, start_session};
use crate::test_support;

#[tokio::test]
async fn full_session_flow_grades_and_gates_results() {
    let ctx = test_support::setup_test_context().await;
    seed_standard_assessment(ctx.state.db(), "midterm").await;

    let started = start_session(&ctx, "midterm", "student-1").await;
    let session_token = started["session_token"].as_str().expect("token").to_string();
    let capability = started["capability_token"].as_str().expect("capability").to_string();
    assert_eq!(started["resumed"], false);
    assert_eq!(started["total_questions"], 3);
    assert_eq!(started["question"]["index"], 0);
    // The client-side integrity monitor reads its thresholds from here.
    assert_eq!(started["tab_switch_warn_limit"], 2);
    assert_eq!(started["tab_switch_autosubmit_limit"], 5);
    assert_eq!(started["require_fullscreen"], false);
    // Correctness never appears in the candidate-facing view.
    assert!(started["question"]["options"][0].get("is_correct").is_none());

    // Answer every question with its original key "a" (always correct in
    // the fixture), following the served order.
    let mut last = started;
    for _ in 0..3 {
        let question_id = last["question"]["question_id"].as_str().expect("question id");
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/sessions/{session_token}/answers"),
                Some(&capability),
                Some(json!({ "question_id": question_id, "selected_option": "a" })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        last = test_support::read_json(response).await;
    }

    assert_eq!(last["status"], "submitted");
    assert_eq!(last["termination_reason"], "completed");
    assert_eq!(last["summary"]["score"], 3);
    assert_eq!(last["summary"]["percentage"], 100);
    assert_eq!(last["summary"]["auto_submitted"], false);

    // Breakdown is gated until the admin releases results.
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/sessions/{session_token}/result"),
            Some(&capability),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = test_support::read_json(response).await;
    assert_eq!(body["code"], "results_not_released");

    let admin = test_support::admin_token(ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/admin/assessments/midterm/release",
            Some(&admin),
            Some(json!({ "released": true })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/sessions/{session_token}/result"),
            Some(&capability),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["summary"]["score"], 3);
    let breakdown = body["breakdown"].as_array().expect("breakdown");
    assert_eq!(breakdown.len(), 3);
    assert_eq!(breakdown[0]["isCorrect"], true);
    assert_eq!(breakdown[0]["selectedOriginalId"], "a");
}

#[tokio::test]
async fn wrong_passcode_is_refused_with_code() {
    let ctx = test_support::setup_test_context().await;
    seed_standard_assessment(ctx.state.db(), "midterm").await;

    let mut payload = start_payload("midterm", "student-1");
    payload["passcode"] = json!("not-the-passcode");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/sessions/start",
            None,
            Some(payload),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = test_support::read_json(response).await;
    assert_eq!(body["code"], "wrong_passcode");
}

#[tokio::test]
async fn out_of_order_answer_is_rejected() {
    let ctx = test_support::setup_test_context().await;
    seed_standard_assessment(ctx.state.db(), "midterm").await;

    let started = start_session(&ctx, "midterm", "student-1").await;
    let session_token = started["session_token"].as_str().expect("token");
    let capability = started["capability_token"].as_str().expect("capability");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/sessions/{session_token}/answers"),
            Some(capability),
            Some(json!({ "question_id": "not-the-current-question", "selected_option": "a" })),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = test_support::read_json(response).await;
    assert_eq!(body["code"], "invalid_question_sequence");
}

#[tokio::test]
async fn unknown_option_key_is_rejected() {
    let ctx = test_support::setup_test_context().await;
    seed_standard_assessment(ctx.state.db(), "midterm").await;

    let started = start_session(&ctx, "midterm", "student-1").await;
    let session_token = started["session_token"].as_str().expect("token");
    let capability = started["capability_token"].as_str().expect("capability");
    let question_id = started["question"]["question_id"].as_str().expect("question id");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/sessions/{session_token}/answers"),
            Some(capability),
            Some(json!({ "question_id": question_id, "selected_option": "z" })),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = test_support::read_json(response).await;
    assert_eq!(body["code"], "invalid_option_for_question");
}

#[tokio::test]
async fn skipped_answer_counts_as_wrong() {
    let ctx = test_support::setup_test_context().await;
    seed_standard_assessment(ctx.state.db(), "midterm").await;

    let started = start_session(&ctx, "midterm", "student-1").await;
    let session_token = started["session_token"].as_str().expect("token").to_string();
    let capability = started["capability_token"].as_str().expect("capability").to_string();

    let mut last = started;
    for index in 0..3 {
        let question_id = last["question"]["question_id"].as_str().expect("question id");
        let selected =
            if index == 0 { serde_json::Value::Null } else { json!("a") };
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/sessions/{session_token}/answers"),
                Some(&capability),
                Some(json!({ "question_id": question_id, "selected_option": selected })),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        last = test_support::read_json(response).await;
    }

    assert_eq!(last["summary"]["score"], 2);
    assert_eq!(last["summary"]["percentage"], 67);
}

#[tokio::test]
async fn capability_for_other_session_is_rejected() {
    let ctx = test_support::setup_test_context().await;
    seed_standard_assessment(ctx.state.db(), "midterm").await;

    let started = start_session(&ctx, "midterm", "student-1").await;
    let session_token = started["session_token"].as_str().expect("token");
    let foreign = test_support::capability_token("some-other-session", ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/sessions/{session_token}/question"),
            Some(&foreign),
            None,
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = test_support::read_json(response).await;
    assert_eq!(body["code"], "capability_mismatch");
}

#[tokio::test]
async fn admin_token_is_not_a_session_capability() {
    let ctx = test_support::setup_test_context().await;
    seed_standard_assessment(ctx.state.db(), "midterm").await;

    let started = start_session(&ctx, "midterm", "student-1").await;
    let session_token = started["session_token"].as_str().expect("token");
    let admin = test_support::admin_token(ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/sessions/{session_token}/question"),
            Some(&admin),
            None,
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
