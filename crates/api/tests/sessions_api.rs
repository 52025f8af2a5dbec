//! Integration tests for live detection: starting sessions, polling their
//! status, streaming updates and deleting them.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{
    assert_error, blank_video, body_json, delete, get, post_video, sse_events, ScriptedDetector,
};
use lifeguard_core::status::SessionStatus;
use lifeguard_vision::memory::MemoryOpener;
use serde_json::Value;

async fn start_live(app: &common::TestApp) -> String {
    let response = post_video(app.router.clone(), "/detect_live").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Detection started");
    json["session_id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Test: a live session runs to completion and reports its result
// ---------------------------------------------------------------------------

#[tokio::test]
async fn live_session_completes_with_result() {
    let app = common::build_test_app(blank_video(100), ScriptedDetector::drowning_at(&[20, 40]));
    let session_id = start_live(&app).await;
    assert!(uuid::Uuid::parse_str(&session_id).is_ok());

    assert_eq!(app.wait_for_terminal(&session_id).await, SessionStatus::Completed);

    let response = get(
        app.router.clone(),
        &format!("/detection_status/{session_id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["session_id"], session_id.as_str());
    assert_eq!(json["status"], "completed");
    assert_eq!(json["progress"], 100);
    assert_eq!(json["current_frame"], 100);
    assert_eq!(json["total_frames"], 100);
    assert_eq!(json["drowning_count"], 2);
    assert_eq!(json["result"], true);
    assert_eq!(json["error"], Value::Null);

    let detections = json["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0]["frame"], 20);
    assert_eq!(detections[0]["label"], "drowning");
    assert_eq!(detections[0]["confidence"], 0.9);
    assert_eq!(detections[0]["bbox"], serde_json::json!([4, 4, 20, 20]));
    assert_eq!(detections[0]["timestamp"], 0.8);

    assert_eq!(app.staged_files(), 0, "upload must be removed");
}

// ---------------------------------------------------------------------------
// Test: the annotated frame is handed out once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn frame_data_is_delivered_once() {
    let app = common::build_test_app(blank_video(20), ScriptedDetector::drowning_at(&[10]));
    let session_id = start_live(&app).await;
    app.wait_for_terminal(&session_id).await;

    let uri = format!("/detection_status/{session_id}");
    let first = body_json(get(app.router.clone(), &uri).await).await;
    let second = body_json(get(app.router.clone(), &uri).await).await;

    assert!(first["frame_data"].as_str().is_some_and(|d| !d.is_empty()));
    assert!(second.get("frame_data").is_none());
}

// ---------------------------------------------------------------------------
// Test: an unreadable upload ends the session in error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreadable_upload_ends_in_error() {
    let app = common::build_test_app(MemoryOpener::unreadable(), ScriptedDetector::default());
    let session_id = start_live(&app).await;

    assert_eq!(app.wait_for_terminal(&session_id).await, SessionStatus::Error);

    let json = body_json(
        get(
            app.router.clone(),
            &format!("/detection_status/{session_id}"),
        )
        .await,
    )
    .await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["result"], Value::Null);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Cannot open video file"));
    assert_eq!(app.staged_files(), 0);
}

// ---------------------------------------------------------------------------
// Test: unknown and malformed ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_session_returns_404() {
    let app = common::build_test_app(blank_video(10), ScriptedDetector::default());

    for id in [uuid::Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let response = get(app.router.clone(), &format!("/detection_status/{id}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_error(&body_json(response).await, "NOT_FOUND", "Session not found");
    }
}

#[tokio::test]
async fn detect_live_without_model_returns_500() {
    let app = common::build_test_app_without_model();
    let response = post_video(app.router.clone(), "/detect_live").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body_json(response).await, "MODEL_NOT_LOADED", "Model not loaded");
    assert!(app.state.sessions.is_empty().await);
}

// ---------------------------------------------------------------------------
// Test: live update stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn live_updates_end_with_completion_event() {
    let app = common::build_test_app(
        blank_video(100),
        ScriptedDetector::drowning_at(&[10, 20, 30, 40, 50]),
    );
    let session_id = start_live(&app).await;

    let response = get(app.router.clone(), &format!("/live_updates/{session_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let events = tokio::time::timeout(Duration::from_secs(10), sse_events(response))
        .await
        .expect("stream should end after the terminal event");
    assert!(events.len() >= 2);

    let (terminal, updates) = events.split_last().unwrap();
    assert_eq!(terminal["status"], "completed");
    assert_eq!(terminal["result"], true);
    // Live runs stop after three qualifying detections.
    assert_eq!(terminal["drowning_count"], 3);
    assert_eq!(terminal["total_detections"], 3);

    let last_update = updates.last().unwrap();
    assert_eq!(last_update["status"], "completed");
    assert_eq!(last_update["progress"], 100);
    assert!(last_update["recent_detections"].as_array().unwrap().len() <= 3);
    for update in updates {
        assert!(update.get("recent_detections").is_some());
        assert!(update["progress"].as_u64().unwrap() <= 100);
    }
    for pair in updates.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        assert!(before["progress"].as_u64() <= after["progress"].as_u64());
        assert!(before["current_frame"].as_u64() <= after["current_frame"].as_u64());
        assert!(before["drowning_count"].as_u64() <= after["drowning_count"].as_u64());
    }
}

// ---------------------------------------------------------------------------
// Test: a snapshot is handed out once across polls and streams
// ---------------------------------------------------------------------------

#[tokio::test]
async fn frame_taken_by_stream_is_not_polled_again() {
    let app = common::build_test_app(blank_video(20), ScriptedDetector::drowning_at(&[10]));
    let session_id = start_live(&app).await;
    app.wait_for_terminal(&session_id).await;

    let events = sse_events(
        get(app.router.clone(), &format!("/live_updates/{session_id}")).await,
    )
    .await;
    let streamed = events
        .iter()
        .filter(|event| event.get("frame_data").is_some())
        .count();
    assert_eq!(streamed, 1);

    let json = body_json(
        get(
            app.router.clone(),
            &format!("/detection_status/{session_id}"),
        )
        .await,
    )
    .await;
    assert_eq!(json["status"], "completed");
    assert!(json.get("frame_data").is_none());
}

#[tokio::test]
async fn frame_taken_by_poll_is_not_streamed_again() {
    let app = common::build_test_app(blank_video(20), ScriptedDetector::drowning_at(&[10]));
    let session_id = start_live(&app).await;
    app.wait_for_terminal(&session_id).await;

    let json = body_json(
        get(
            app.router.clone(),
            &format!("/detection_status/{session_id}"),
        )
        .await,
    )
    .await;
    assert!(json["frame_data"].as_str().is_some_and(|d| !d.is_empty()));

    let events = sse_events(
        get(app.router.clone(), &format!("/live_updates/{session_id}")).await,
    )
    .await;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.get("frame_data").is_none()));
}

#[tokio::test]
async fn live_updates_report_error_terminal_event() {
    let app = common::build_test_app(MemoryOpener::unreadable(), ScriptedDetector::default());
    let session_id = start_live(&app).await;
    app.wait_for_terminal(&session_id).await;

    let response = get(app.router.clone(), &format!("/live_updates/{session_id}")).await;
    let events = sse_events(response).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["status"], "error");
    assert_eq!(events[1]["status"], "error");
    assert!(events[1]["error"]
        .as_str()
        .unwrap()
        .starts_with("Cannot open video file"));
}

#[tokio::test]
async fn live_updates_for_unknown_session_send_single_error() {
    let app = common::build_test_app(blank_video(10), ScriptedDetector::default());
    let response = get(
        app.router.clone(),
        &format!("/live_updates/{}", uuid::Uuid::new_v4()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let events = sse_events(response).await;
    assert_eq!(events, vec![serde_json::json!({ "error": "Session not found" })]);
}

// ---------------------------------------------------------------------------
// Test: deleting sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_finished_session() {
    let app = common::build_test_app(blank_video(10), ScriptedDetector::default());
    let session_id = start_live(&app).await;
    app.wait_for_terminal(&session_id).await;

    let uri = format!("/sessions/{session_id}");
    assert_eq!(
        delete(app.router.clone(), &uri).await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        delete(app.router.clone(), &uri).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        get(app.router.clone(), &format!("/detection_status/{session_id}"))
            .await
            .status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn delete_cancels_running_session() {
    let detector = Arc::new(ScriptedDetector::default().delayed(Duration::from_secs(30)));
    let app = common::build_test_app_with(blank_video(50), Arc::clone(&detector), |_| {});
    let session_id = start_live(&app).await;

    let id = uuid::Uuid::parse_str(&session_id).unwrap();
    let session = app.state.sessions.get(&id).await.unwrap();
    for _ in 0..500 {
        if detector.calls() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(detector.calls(), 1);

    let response = delete(app.router.clone(), &format!("/sessions/{session_id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    for _ in 0..500 {
        if session.status().await != SessionStatus::Processing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let state = session.state().await;
    assert_eq!(state.status, SessionStatus::Error);
    assert_eq!(state.error.as_deref(), Some("Session cancelled"));
    assert_eq!(app.staged_files(), 0);
}

// ---------------------------------------------------------------------------
// Test: registry capacity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_registry_returns_503() {
    let detector = Arc::new(ScriptedDetector::default().delayed(Duration::from_secs(30)));
    let app = common::build_test_app_with(blank_video(50), detector, |config| {
        config.max_sessions = 1;
    });
    start_live(&app).await;

    let response = post_video(app.router.clone(), "/detect_live").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(app.state.sessions.len().await, 1);
}
