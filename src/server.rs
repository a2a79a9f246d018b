use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::AppState;
use crate::api::{ChatMessage, ConversationSummary};
use crate::chat::{NoopSink, RenderSink};
use crate::config::AppConfig;
use crate::forms::{LoginForm, RegisterForm};
use crate::session::{AuthUser, WebSession};
use crate::ui::{self, StatusLevel};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "tcw_session";

/// One server-rendered UI update pushed to the browser over SSE.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum UiPatch {
    /// Replace the transcript element.
    Transcript { html: String },
    /// Replace the in-progress assistant bubble.
    Bubble { html: String },
    /// Replace the conversation sidebar.
    History { html: String },
    /// Turn finished; the composer may unlock.
    Done,
}

impl UiPatch {
    fn event_name(&self) -> &'static str {
        match self {
            Self::Transcript { .. } => "transcript",
            Self::Bubble { .. } => "bubble",
            Self::History { .. } => "history",
            Self::Done => "done",
        }
    }
}

/// Sink that renders fragments and forwards them to the SSE channel.
///
/// Send failures mean the browser went away mid-stream; the turn keeps
/// running so the transcript stays consistent for the next page load.
struct ChannelSink {
    tx: mpsc::UnboundedSender<UiPatch>,
}

impl RenderSink for ChannelSink {
    fn render_transcript(&mut self, messages: &[ChatMessage]) {
        let _ = self.tx.send(UiPatch::Transcript {
            html: ui::transcript_fragment(messages),
        });
    }

    fn render_placeholder(&mut self, html: &str) {
        let _ = self.tx.send(UiPatch::Bubble {
            html: html.to_string(),
        });
    }

    fn render_history(&mut self, conversations: &[ConversationSummary], active: Option<&str>) {
        let _ = self.tx.send(UiPatch::History {
            html: ui::history_fragment(conversations, active),
        });
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

/// Start the web server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = AppState::new(Arc::clone(&config));

    // Periodic eviction of idle web sessions.
    let sessions = state.sessions.clone();
    let idle_timeout = config.session.idle_timeout();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            sessions.cleanup_expired(idle_timeout);
        }
    });

    let app = build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        name: "server.started",
        %addr,
        api_base_url = %config.api.base_url,
        "web server listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// Assemble the full route table.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/about", get(about))
        .route("/account/login", get(login_page).post(login_submit))
        .route("/account/register", get(register_page).post(register_submit))
        .route("/account/logout", get(logout))
        .route("/chat", get(chat_page).post(chat_submit))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/{id}", get(load_conversation))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn resolve_session(state: &AppState, jar: &CookieJar) -> Option<WebSession> {
    let cookie = jar.get(SESSION_COOKIE)?;
    state.sessions.get(cookie.value())
}

fn session_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

async fn home() -> Html<String> {
    Html(ui::home_page())
}

async fn about() -> Html<String> {
    Html(ui::about_page())
}

async fn login_page() -> Html<String> {
    Html(ui::login_page(None, &[], ""))
}

async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let errors = form.validate();
    if !errors.is_empty() {
        // Invalid input never reaches the remote API.
        return Html(ui::login_page(
            Some((StatusLevel::Error, "Please correct the fields below.")),
            &errors,
            &form.email,
        ))
        .into_response();
    }

    match state.auth_api.login(&form.email, &form.password).await {
        Ok(auth) => {
            let session = state.sessions.create(
                AuthUser {
                    token: auth.token,
                    email: if auth.email.is_empty() {
                        form.email.clone()
                    } else {
                        auth.email
                    },
                    user_id: auth.user_id,
                },
                &state.config.api.base_url,
            );
            let jar = jar.add(session_cookie(session.id().to_string()));
            (jar, Redirect::to("/chat")).into_response()
        }
        Err(error) => {
            warn!(%error, email = %form.email, "login rejected");
            Html(ui::login_page(
                Some((StatusLevel::Error, "Sign-in failed. Check your email and password.")),
                &[],
                &form.email,
            ))
            .into_response()
        }
    }
}

async fn register_page() -> Html<String> {
    Html(ui::register_page(None, &[], "", ""))
}

async fn register_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    let errors = form.validate();
    if !errors.is_empty() {
        return Html(ui::register_page(
            Some((StatusLevel::Error, "Please correct the fields below.")),
            &errors,
            &form.name,
            &form.email,
        ))
        .into_response();
    }

    match state
        .auth_api
        .register(&form.name, &form.email, &form.password)
        .await
    {
        // Some deployments issue a token at registration and some don't;
        // only auto-login when one arrived.
        Ok(auth) if !auth.token.is_empty() => {
            let session = state.sessions.create(
                AuthUser {
                    token: auth.token,
                    email: if auth.email.is_empty() {
                        form.email.clone()
                    } else {
                        auth.email
                    },
                    user_id: auth.user_id,
                },
                &state.config.api.base_url,
            );
            let jar = jar.add(session_cookie(session.id().to_string()));
            (jar, Redirect::to("/chat")).into_response()
        }
        Ok(_) => Html(ui::login_page(
            Some((StatusLevel::Info, "Account created. Sign in to continue.")),
            &[],
            &form.email,
        ))
        .into_response(),
        Err(error) => {
            warn!(%error, email = %form.email, "registration rejected");
            Html(ui::register_page(
                Some((StatusLevel::Error, "Registration failed. Try again.")),
                &[],
                &form.name,
                &form.email,
            ))
            .into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    let jar = jar.remove(session_cookie(String::new()));
    (jar, Redirect::to("/account/login"))
}

async fn chat_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(session) = resolve_session(&state, &jar) else {
        return Redirect::to("/account/login").into_response();
    };

    // A turn may be streaming in another request; render what we can see
    // without blocking on it. The sidebar is populated by the page script.
    let chat = session.chat();
    let (transcript_html, active_id) = match chat.try_lock() {
        Ok(chat) => (
            ui::transcript_fragment(chat.transcript()),
            chat.conversation_id().to_string(),
        ),
        Err(_) => (String::new(), String::new()),
    };
    Html(ui::chat_page(
        &transcript_html,
        "",
        &session.user().email,
        &active_id,
    ))
    .into_response()
}

async fn chat_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<ChatRequest>,
) -> Response {
    let Some(session) = resolve_session(&state, &jar) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    // Holding the lock for the whole turn is what makes a second submit
    // observe Busy.
    let Ok(mut chat) = session.chat().try_lock_owned() else {
        return (
            StatusCode::CONFLICT,
            "a response is still streaming; wait for it to finish",
        )
            .into_response();
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut sink = ChannelSink { tx: tx.clone() };
        if let Err(error) = chat.submit(&request.message, &mut sink).await {
            error!(%error, "chat turn ended with an error");
        }
        let _ = tx.send(UiPatch::Done);
    });

    let stream = async_stream::stream! {
        while let Some(patch) = rx.recv().await {
            let json = serde_json::to_string(&patch).unwrap_or_else(|_| "{}".to_string());
            yield Ok::<_, Infallible>(Event::default().event(patch.event_name()).data(json));
        }
    };
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

async fn list_conversations(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(session) = resolve_session(&state, &jar) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Ok(mut chat) = session.chat().try_lock_owned() else {
        return StatusCode::CONFLICT.into_response();
    };

    let mut sink = NoopSink;
    let list = chat.load_history(&mut sink).await;
    Json(list).into_response()
}

async fn load_conversation(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    let Some(session) = resolve_session(&state, &jar) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Ok(mut chat) = session.chat().try_lock_owned() else {
        return StatusCode::CONFLICT.into_response();
    };

    let mut sink = NoopSink;
    let messages = chat.load_conversation(&id, &mut sink).await;
    Json(messages).into_response()
}
