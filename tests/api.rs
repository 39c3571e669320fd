mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use campus_admin::agent::{ChatModel, MockMailer};
use campus_admin::api;
use campus_admin::config::Settings;
use campus_admin::orchestrator::Orchestrator;
use campus_admin::session::MemorySessionStore;
use campus_admin::store::MemoryRecordStore;
use common::{answer, tool_call, ScriptedModel};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(model: Arc<dyn ChatModel>) -> Router {
    let mut settings = Settings::default();
    settings.auth.secret_key = Some("test-secret".to_string());

    let orchestrator = Orchestrator::with_components(
        settings,
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemorySessionStore::new()),
        model,
        Arc::new(MockMailer::new()),
    )
    .unwrap();
    api::router(orchestrator)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn send_raw(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/admin/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "username={}&password={}",
            username.replace('@', "%40"),
            password
        )))
        .unwrap()
}

/// Sign up and log in the default admin, returning a bearer token.
async fn admin_token(app: &Router) -> String {
    let (status, _) = send(
        app,
        json_request(
            Method::POST,
            "/admin/signup",
            None,
            json!({ "email": "dean@uni.edu", "password": "s3cret-pass", "name": "Dean" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(app, login_request("dean@uni.edu", "s3cret-pass")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

fn silent() -> Arc<dyn ChatModel> {
    Arc::new(ScriptedModel::always(answer("ok")))
}

#[tokio::test]
async fn test_public_routes() {
    let app = app(silent());

    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app, get("/", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = app(silent());

    let (status, body) = send(&app, get("/students/list", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "auth_error");

    let (status, _) = send(&app, get("/analytics/total", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_and_login_errors() {
    let app = app(silent());
    admin_token(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/admin/signup",
            None,
            json!({ "email": "DEAN@uni.edu", "password": "other-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = send(&app, login_request("dean@uni.edu", "wrong-pass")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_student_crud() {
    let app = app(silent());
    let token = admin_token(&app).await;
    let token = Some(token.as_str());

    let student = json!({
        "name": "Ana",
        "department": "Computer Science",
        "email": "ana@uni.edu",
        "student_id": 101
    });
    let (status, body) = send(&app, json_request(Method::POST, "/students", token, student.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["student"]["email"], "ana@uni.edu");

    let (status, _) = send(&app, json_request(Method::POST, "/students", token, student)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, get("/students?student_id=101", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ana");

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/students?identifier=ana@uni.edu",
            token,
            json!({ "field": "department", "new_value": "Data Science" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student"]["department"], "Data Science");

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/students?identifier=ana@uni.edu",
            token,
            json!({ "field": "gpa", "new_value": "4.0" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = send(&app, get("/students", token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/students?identifier=101")
        .header(header::AUTHORIZATION, format!("Bearer {}", token.unwrap()))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/students?email=ana@uni.edu", token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_analytics_and_faq() {
    let app = app(silent());
    let token = admin_token(&app).await;
    let token = Some(token.as_str());

    for (name, department, email) in [
        ("Ana", "Computer Science", "ana@uni.edu"),
        ("Ben", "Computer Science", "ben@uni.edu"),
        ("Cy", "Electrical Engineering", "cy@uni.edu"),
    ] {
        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/students",
                token,
                json!({ "name": name, "department": department, "email": email }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&app, get("/analytics/total", token)).await;
    assert_eq!(body["total_students"], 3);

    let (_, body) = send(&app, get("/analytics/by-department?department=Computer%20Science", token)).await;
    assert_eq!(body["count"], 2);

    let (_, body) = send(&app, get("/analytics/recent?limit=2", token)).await;
    assert_eq!(body["recent_students"].as_array().unwrap().len(), 2);

    let activity = Request::builder()
        .method(Method::POST)
        .uri("/students/activity?identifier=cy@uni.edu")
        .header(header::AUTHORIZATION, format!("Bearer {}", token.unwrap()))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, activity).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/analytics/active", token)).await;
    assert_eq!(body["active_last_7_days"][0]["email"], "cy@uni.edu");

    let (_, body) = send(&app, get("/analytics/dashboard", token)).await;
    assert_eq!(body["total_students"], 3);
    assert_eq!(body["active_last_7_days"], 1);

    let (_, body) = send(&app, get("/faq/cafeteria", token)).await;
    assert!(body["cafeteria_timings"].is_string());
}

#[tokio::test]
async fn test_chat_uses_admin_thread() {
    let app = app(Arc::new(ScriptedModel::always(answer("Hello, Dean."))));
    let token = admin_token(&app).await;
    let token = Some(token.as_str());

    let (status, body) = send(&app, get("/chat?q=hello", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Hello, Dean.");
    assert_eq!(body["thread_id"], "admin:dean@uni.edu");

    let (_, body) = send(&app, get("/chat/history", token)).await;
    assert_eq!(body["turns"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get("/chat/threads", token)).await;
    assert_eq!(body["threads"][0], "admin:dean@uni.edu");
}

#[tokio::test]
async fn test_chat_stream_emits_events() {
    let app = app(Arc::new(ScriptedModel::always(answer("Hello, Dean."))));
    let token = admin_token(&app).await;

    let (status, body) = send_raw(&app, get("/chat/stream?q=hello&thread_id=s1", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("data: Hello, Dean."), "got: {}", body);
}

#[tokio::test]
async fn test_chat_stream_reports_errors() {
    let app = app(Arc::new(ScriptedModel::new(Vec::new())));
    let token = admin_token(&app).await;

    let (status, body) = send_raw(&app, get("/chat/stream?q=hello", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("[STREAM ERROR]"), "got: {}", body);
}

#[tokio::test]
async fn test_chat_upstream_failure_is_bad_gateway() {
    let app = app(Arc::new(ScriptedModel::new(Vec::new())));
    let token = admin_token(&app).await;

    let (status, body) = send(&app, get("/chat?q=hello", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "upstream_model_error");
}

#[tokio::test]
async fn test_round_limit_returns_partial_answer() {
    let app = app(Arc::new(ScriptedModel::always(tool_call("get_total_students", "{}"))));
    let token = admin_token(&app).await;

    let (status, body) = send(&app, get("/chat?q=count%20forever", Some(&token))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "round_limit_exceeded");
    assert!(body["partial"].as_str().unwrap().contains("get_total_students"));

    let (status, body) = send_raw(&app, get("/chat/stream?q=count%20forever&thread_id=s2", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let partial_at = body.find("get_total_students").expect("partial answer event");
    let error_at = body.find("[STREAM ERROR]").expect("error event");
    assert!(partial_at < error_at, "got: {}", body);
}

#[tokio::test]
async fn test_errors_without_partial_omit_the_field() {
    let app = app(silent());

    let (_, body) = send(&app, get("/students/list", None)).await;
    assert!(body.get("partial").is_none());
}
