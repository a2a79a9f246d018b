//! Route-level tests for the web front end, driven through the full router
//! with a mock of the remote assistant API behind it.

use std::sync::Arc;

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use axum_test::TestServer;
use serde_json::json;

use tradechat_web::AppState;
use tradechat_web::config::AppConfig;
use tradechat_web::server::build_router;

/// Serve a mock assistant API and return its base URL.
async fn spawn_auth_upstream() -> String {
    let router = Router::new().route(
        "/api/auth/login",
        post(|Json(body): Json<serde_json::Value>| async move {
            if body["password"] == "Str0ng!pass" {
                Json(json!({
                    "token": "token-abc",
                    "email": body["email"],
                    "userId": 5
                }))
                .into_response()
            } else {
                StatusCode::UNAUTHORIZED.into_response()
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve upstream");
    });
    format!("http://{addr}")
}

fn app_config(api_base_url: &str) -> AppConfig {
    AppConfig::load_from_args([
        "tradechat-web",
        "--api-base-url",
        api_base_url,
    ])
    .expect("test config")
}

fn test_server(api_base_url: &str) -> TestServer {
    let state = AppState::new(Arc::new(app_config(api_base_url)));
    TestServer::builder()
        .save_cookies()
        .build(build_router(state))
        .expect("test server")
}

#[tokio::test]
async fn test_public_pages_render() {
    let server = test_server("http://127.0.0.1:9");

    let home = server.get("/").await;
    home.assert_status_ok();
    assert!(home.text().contains("TradeChat"));

    let about = server.get("/about").await;
    about.assert_status_ok();
    assert!(about.text().contains("About TradeChat"));

    let login = server.get("/account/login").await;
    login.assert_status_ok();
    assert!(login.text().contains("Sign in"));
}

#[tokio::test]
async fn test_chat_requires_a_session() {
    let server = test_server("http://127.0.0.1:9");

    let response = server.get("/chat").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/account/login");
}

#[tokio::test]
async fn test_chat_submit_without_session_is_unauthorized() {
    let server = test_server("http://127.0.0.1:9");

    let response = server.post("/chat").json(&json!({ "message": "hi" })).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_login_form_is_rejected_without_an_api_call() {
    // Port 9 is unreachable; reaching the API would fail the request
    // instead of re-rendering the form.
    let server = test_server("http://127.0.0.1:9");

    let response = server
        .post("/account/login")
        .form(&json!({ "email": "not-an-email", "password": "" }))
        .await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("Please correct the fields below."));
    assert!(body.contains("Enter a valid email address."));
}

#[tokio::test]
async fn test_login_flow_establishes_a_session() {
    let base_url = spawn_auth_upstream().await;
    let server = test_server(&base_url);

    let login = server
        .post("/account/login")
        .form(&json!({ "email": "trader@example.com", "password": "Str0ng!pass" }))
        .await;
    login.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(login.header("location"), "/chat");

    // The saved cookie authenticates the chat page.
    let chat = server.get("/chat").await;
    chat.assert_status_ok();
    assert!(chat.text().contains("trader@example.com"));

    // Logout tears the session down again.
    let logout = server.get("/account/logout").await;
    logout.assert_status(StatusCode::SEE_OTHER);
    let after = server.get("/chat").await;
    after.assert_status(StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_rejected_credentials_re_render_the_form() {
    let base_url = spawn_auth_upstream().await;
    let server = test_server(&base_url);

    let response = server
        .post("/account/login")
        .form(&json!({ "email": "trader@example.com", "password": "Wrong1!pass" }))
        .await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("Sign-in failed"));
    assert!(body.contains("trader@example.com"));
}

#[tokio::test]
async fn test_conversation_endpoints_require_a_session() {
    let server = test_server("http://127.0.0.1:9");

    let list = server.get("/api/conversations").await;
    list.assert_status(StatusCode::UNAUTHORIZED);

    let one = server.get("/api/conversations/c1").await;
    one.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let server = test_server("http://127.0.0.1:9");

    let css = server.get("/static/app.css").await;
    css.assert_status_ok();
    assert!(css.text().contains(".chat-message"));
}
