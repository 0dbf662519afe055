mod helpers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tokio::sync::Notify;
use tower::ServiceExt;

use scrivener::application::ports::{TaskStore, TranscriptionEngine};
use scrivener::domain::{TaskId, TaskStatus};

use helpers::{
    Part, ScriptedEngine, TEST_ENGINE, TestApp, multipart_body, multipart_content_type,
    wait_for, wait_for_terminal,
};

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn form(method: Method, uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn upload(app: &TestApp, filename: &str, bytes: &[u8]) -> (StatusCode, Value) {
    send(
        app,
        form(Method::POST, "/api/upload", &[Part::File("file", filename, bytes)]),
    )
    .await
}

async fn upload_and_finish(app: &TestApp, filename: &str) -> TaskId {
    let (status, body) = upload(app, filename, b"RIFF fake audio").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let id: TaskId = body["task_id"].as_str().unwrap().parse().unwrap();
    wait_for_terminal(app.store.as_ref(), id).await;
    id
}

/// The scratch waveform is removed just after the task turns `Completed`.
async fn wait_until_empty(dir: &std::path::Path) {
    for _ in 0..500 {
        if std::fs::read_dir(dir).map(|e| e.count() == 0).unwrap_or(true) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("{} still holds scratch files", dir.display());
}

fn shared(engine: ScriptedEngine) -> Arc<dyn TranscriptionEngine> {
    Arc::new(engine)
}

fn speaking_app_engine() -> Arc<dyn TranscriptionEngine> {
    shared(ScriptedEngine::speaking(
        TEST_ENGINE,
        &[(0.0, 1.25, "hello"), (1.25, 3.5, "world")],
    ))
}

#[tokio::test]
async fn given_running_service_when_checking_health_then_engine_count_is_reported() {
    let app = TestApp::start(vec![
        speaking_app_engine(),
        shared(ScriptedEngine::unavailable("offline")),
    ])
    .await;

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["engines_available"], 1);
    assert_eq!(body["tasks_running"], 0);
}

#[tokio::test]
async fn given_running_service_when_asking_for_system_info_then_host_details_are_reported() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;

    let (status, body) = send(&app, get("/api/system")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["system"]["os"], std::env::consts::OS);
    assert_eq!(body["system"]["arch"], std::env::consts::ARCH);
    assert_eq!(body["system"]["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["system"]["cpus"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn given_audio_upload_when_processed_then_task_completes_with_transcript() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;

    let (status, body) = upload(&app, "meeting.wav", b"RIFF fake audio").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task created");
    let id: TaskId = body["task_id"].as_str().unwrap().parse().unwrap();
    wait_for_terminal(app.store.as_ref(), id).await;

    let (status, body) = send(&app, get(&format!("/api/task/{}", id))).await;

    assert_eq!(status, StatusCode::OK);
    let task = &body["task"];
    assert_eq!(task["status"], "completed");
    assert_eq!(task["filename"], "meeting.wav");
    assert_eq!(task["engine"], TEST_ENGINE);
    assert_eq!(task["progress"], 1.0);
    assert_eq!(task["result"]["full_text"], "hello world");
    assert_eq!(task["result"]["segments"][1]["start"], 1.25);
    assert!(task["error"].is_null());
    wait_until_empty(&app.uploads_dir()).await;
}

#[tokio::test]
async fn given_unsupported_extension_when_uploading_then_rejected_and_no_task_created() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;

    let (status, body) = upload(&app, "notes.txt", b"plain text").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Unsupported file format"));
    assert!(app.store.list_tasks().await.is_empty());
}

#[tokio::test]
async fn given_oversized_upload_when_uploading_then_rejected_and_staging_is_clean() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let too_big = vec![0u8; 1024 * 1024 + 512];

    let (status, body) = upload(&app, "long.mp3", &too_big).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("File too large"));
    assert!(app.store.list_tasks().await.is_empty());
    assert_eq!(std::fs::read_dir(app.uploads_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn given_form_without_file_when_uploading_then_bad_request() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;

    let (status, body) = send(
        &app,
        form(Method::POST, "/api/upload", &[Part::Text("engine", TEST_ENGINE)]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn given_unknown_engine_in_form_when_uploading_then_task_fails_naming_engine() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;

    let (status, body) = send(
        &app,
        form(
            Method::POST,
            "/api/upload",
            &[
                Part::File("file", "clip.mp3", b"fake"),
                Part::Text("engine", "parakeet"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id: TaskId = body["task_id"].as_str().unwrap().parse().unwrap();

    let task = wait_for_terminal(app.store.as_ref(), id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("parakeet"));
}

#[tokio::test]
async fn given_malformed_or_unknown_id_when_fetching_then_not_found() {
    let app = TestApp::start(vec![]).await;

    let (malformed, body) = send(&app, get("/api/task/not-a-uuid")).await;
    let (unknown, _) = send(&app, get(&format!("/api/task/{}", TaskId::new()))).await;
    let (export, _) = send(&app, get("/api/export/../../etc/passwd")).await;

    assert_eq!(malformed, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Task not found");
    assert_eq!(unknown, StatusCode::NOT_FOUND);
    assert_eq!(export, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn given_tasks_when_listing_then_newest_first_with_flags() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let first = upload_and_finish(&app, "first.wav").await;
    let second = upload_and_finish(&app, "second.wav").await;

    let (status, body) = send(&app, get("/api/tasks")).await;

    assert_eq!(status, StatusCode::OK);
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["id"], second.to_string());
    assert_eq!(tasks[1]["id"], first.to_string());
    assert_eq!(tasks[0]["has_result"], true);
    assert_eq!(tasks[0]["has_media"], true);
    assert!(tasks[0].get("result").is_none());
}

#[tokio::test]
async fn given_completed_task_when_exporting_srt_then_cues_use_comma_millis() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let id = upload_and_finish(&app, "meeting.mp3").await;

    let (status, body) = send(&app, get(&format!("/api/export/{}?format=srt", id))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "meeting.srt");
    let content = body["content"].as_str().unwrap();
    assert!(content.starts_with("1\n00:00:00,000 --> 00:00:01,250\nhello\n"));
    assert!(content.contains("2\n00:00:01,250 --> 00:00:03,500\nworld"));
}

#[tokio::test]
async fn given_completed_task_when_exporting_unknown_format_then_bad_request() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let id = upload_and_finish(&app, "meeting.mp3").await;

    let (status, body) = send(&app, get(&format!("/api/export/{}?format=docx", id))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("docx"));
}

#[tokio::test]
async fn given_failed_task_when_exporting_then_not_found() {
    let app = TestApp::start(vec![shared(ScriptedEngine::failing(TEST_ENGINE, "boom"))])
    .await;
    let id = upload_and_finish(&app, "meeting.mp3").await;

    let (status, _) = send(&app, get(&format!("/api/export/{}?format=txt", id))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn given_completed_task_when_editing_segment_then_text_and_export_follow() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let id = upload_and_finish(&app, "meeting.mp3").await;

    let (status, body) = send(
        &app,
        form(
            Method::POST,
            &format!("/api/result/{}/edit", id),
            &[Part::Text("segment_index", "0"), Part::Text("text", "goodbye")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Segment updated");

    let (_, body) = send(&app, get(&format!("/api/export/{}?format=txt", id))).await;
    assert_eq!(body["content"], "goodbye world");
}

#[tokio::test]
async fn given_bad_segment_index_when_editing_then_bad_request() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let id = upload_and_finish(&app, "meeting.mp3").await;
    let uri = format!("/api/result/{}/edit", id);

    let (past_end, _) = send(
        &app,
        form(
            Method::POST,
            &uri,
            &[Part::Text("segment_index", "2"), Part::Text("text", "x")],
        ),
    )
    .await;
    let (negative, body) = send(
        &app,
        form(
            Method::POST,
            &uri,
            &[Part::Text("segment_index", "-1"), Part::Text("text", "x")],
        ),
    )
    .await;

    assert_eq!(past_end, StatusCode::BAD_REQUEST);
    assert_eq!(negative, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "segment_index must be a non-negative integer");
}

#[tokio::test]
async fn given_running_task_when_retranscribing_then_rejected_until_it_finishes() {
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(
        ScriptedEngine::speaking(TEST_ENGINE, &[(0.0, 1.0, "first pass")]).gated(gate.clone()),
    );
    let app = TestApp::start(vec![engine.clone() as Arc<dyn TranscriptionEngine>]).await;
    let (_, body) = upload(&app, "meeting.mp3", b"fake").await;
    let id: TaskId = body["task_id"].as_str().unwrap().parse().unwrap();
    wait_for(app.store.as_ref(), id, |t| t.status == TaskStatus::Processing).await;
    let uri = format!("/api/task/{}/retranscribe", id);

    let (busy, body) = send(
        &app,
        form(Method::POST, &uri, &[Part::Text("model", "tiny")]),
    )
    .await;
    assert_eq!(busy, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("processing"));

    gate.notify_one();
    wait_for_terminal(app.store.as_ref(), id).await;

    let (status, body) = send(
        &app,
        form(Method::POST, &uri, &[Part::Text("language", "fr")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Retranscription started");

    gate.notify_one();
    let task = wait_for(app.store.as_ref(), id, |t| {
        t.status == TaskStatus::Completed && t.language == "fr"
    })
    .await;
    assert_eq!(task.engine, TEST_ENGINE);
    assert_eq!(task.result.unwrap().language, "fr");
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn given_task_with_missing_media_when_retranscribing_then_not_found() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let id = upload_and_finish(&app, "meeting.mp3").await;
    let media = app.store.get_task(id).await.unwrap().media_path;
    std::fs::remove_file(media).unwrap();

    let (status, _) = send(
        &app,
        form(
            Method::POST,
            &format!("/api/task/{}/retranscribe", id),
            &[Part::Text("model", "tiny")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.store.get_task(id).await.unwrap().status,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn given_completed_task_when_deleting_then_gone_from_api_and_disk() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let id = upload_and_finish(&app, "meeting.mp3").await;
    let request = |method: Method| {
        Request::builder()
            .method(method)
            .uri(format!("/api/task/{}", id))
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&app, request(Method::DELETE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task deleted");

    let (after, _) = send(&app, request(Method::GET)).await;
    let (again, _) = send(&app, request(Method::DELETE)).await;
    assert_eq!(after, StatusCode::NOT_FOUND);
    assert_eq!(again, StatusCode::NOT_FOUND);
    assert!(!app.history_dir().join(id.to_string()).exists());
}

#[tokio::test]
async fn given_completed_task_when_fetching_audio_then_waveform_is_served() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let id = upload_and_finish(&app, "meeting.mp3").await;

    let response = app
        .router()
        .oneshot(get(&format!("/api/audio/{}", id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"RIFF fake audio");
}

#[tokio::test]
async fn given_lost_waveform_when_fetching_audio_then_it_is_regenerated() {
    let app = TestApp::start(vec![speaking_app_engine()]).await;
    let id = upload_and_finish(&app, "meeting.mp3").await;
    let wav = app.store.get_task(id).await.unwrap().wav_path.unwrap();
    std::fs::remove_file(&wav).unwrap();
    let conversions_before = app.normalizer.calls();

    let (status, _) = send(&app, get(&format!("/api/audio/{}", id))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.normalizer.calls(), conversions_before + 1);
    assert!(wav.is_file());
}

#[tokio::test]
async fn given_registered_engines_when_listing_then_availability_and_requirement_are_shown() {
    let app = TestApp::start(vec![
        speaking_app_engine(),
        shared(ScriptedEngine::unavailable("offline")),
    ])
    .await;

    let (status, body) = send(&app, get("/api/engines")).await;

    assert_eq!(status, StatusCode::OK);
    let engines = body["engines"].as_array().unwrap();
    let find = |name: &str| {
        engines
            .iter()
            .find(|e| e["name"] == name)
            .cloned()
            .unwrap()
    };
    assert_eq!(find(TEST_ENGINE)["available"], true);
    assert_eq!(find("offline")["available"], false);
    assert_eq!(find("offline")["requirement"], "the scripted-model package");
}
