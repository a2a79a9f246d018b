//! Server-rendered pages and fragments.
//!
//! Every page is assembled with `format!` into one shared shell; fragments
//! (transcript, sidebar) are also rendered server-side so the browser script
//! only swaps markup, never builds it.

use serde::Serialize;

use crate::api::{ChatMessage, ConversationSummary, MessageRole};
use crate::forms::FieldError;
use crate::markdown;

/// Generate the HTML shell shared by every page.
pub fn html_shell(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="AI-assisted trading ideas and market chat">
    <title>{title} - TradeChat</title>
    <link rel="stylesheet" href="/static/app.css">
    <script defer src="/static/site.js"></script>
</head>
<body>
    <header class="site-header">
        <div class="container">
            <a href="/" class="brand">TradeChat</a>
            <nav class="site-nav">
                <a href="/">Home</a>
                <a href="/chat">Chat</a>
                <a href="/about">About</a>
                <a href="/account/login">Sign in</a>
            </nav>
        </div>
    </header>
    <main class="container">
        {content}
    </main>
    <footer class="site-footer">
        <div class="container">
            <p>TradeChat is a research aid, not investment advice.</p>
        </div>
    </footer>
</body>
</html>"#
    )
}

/// Severity of a form status banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

impl StatusLevel {
    fn css_class(self) -> &'static str {
        match self {
            Self::Info => "status status-info",
            Self::Error => "status status-error",
        }
    }
}

fn status_banner(status: Option<(StatusLevel, &str)>) -> String {
    match status {
        Some((level, message)) => format!(
            r#"<p class="{}">{}</p>"#,
            level.css_class(),
            markdown::escape_text(message)
        ),
        None => String::new(),
    }
}

fn field_error_list(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let items: String = errors
        .iter()
        .map(|e| format!("<li>{}</li>", markdown::escape_text(&e.message)))
        .collect();
    format!(r#"<ul class="field-errors">{items}</ul>"#)
}

pub fn home_page() -> String {
    html_shell(
        "Home",
        r#"
    <section class="hero">
        <h1>Talk your way to a trading plan</h1>
        <p>Ask the assistant about tickers, setups, and risk. Streamed answers, saved conversations.</p>
        <p><a class="button" href="/chat">Open the chat</a></p>
    </section>"#,
    )
}

pub fn about_page() -> String {
    html_shell(
        "About",
        r#"
    <section class="prose">
        <h1>About TradeChat</h1>
        <p>TradeChat is a thin front end over a remote assistant API. Your
        conversations are stored by the API and can be resumed from the
        sidebar at any time.</p>
        <p>Nothing here is investment advice. Verify everything before
        risking money on it.</p>
    </section>"#,
    )
}

/// Login page, optionally re-rendered with a banner, field errors, and the
/// previously entered email.
pub fn login_page(
    status: Option<(StatusLevel, &str)>,
    errors: &[FieldError],
    email: &str,
) -> String {
    let content = format!(
        r#"
    <section class="auth-card">
        <h1>Sign in</h1>
        {banner}
        {errors}
        <form method="post" action="/account/login">
            <label for="email">Email</label>
            <input id="email" name="email" type="email" value="{email}" autocomplete="username">
            <label for="password">Password</label>
            <input id="password" name="password" type="password" autocomplete="current-password">
            <button type="submit">Sign in</button>
        </form>
        <p>No account yet? <a href="/account/register">Register</a>.</p>
    </section>"#,
        banner = status_banner(status),
        errors = field_error_list(errors),
        email = markdown::escape_text(email),
    );
    html_shell("Sign in", &content)
}

/// Registration page with the same re-render affordances as login.
pub fn register_page(
    status: Option<(StatusLevel, &str)>,
    errors: &[FieldError],
    name: &str,
    email: &str,
) -> String {
    let content = format!(
        r#"
    <section class="auth-card">
        <h1>Create an account</h1>
        {banner}
        {errors}
        <form method="post" action="/account/register">
            <label for="name">Name</label>
            <input id="name" name="name" type="text" value="{name}" autocomplete="name">
            <label for="email">Email</label>
            <input id="email" name="email" type="email" value="{email}" autocomplete="username">
            <label for="password">Password</label>
            <input id="password" name="password" type="password" autocomplete="new-password">
            <button type="submit">Register</button>
        </form>
        <p>Already registered? <a href="/account/login">Sign in</a>.</p>
    </section>"#,
        banner = status_banner(status),
        errors = field_error_list(errors),
        name = markdown::escape_text(name),
        email = markdown::escape_text(email),
    );
    html_shell("Register", &content)
}

/// One strategy offered under a trading persona.
#[derive(Debug, Clone, Serialize)]
pub struct Strategy {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// A selectable trading persona with its strategy menu.
#[derive(Debug, Clone, Serialize)]
pub struct TraderProfile {
    pub id: &'static str,
    pub label: &'static str,
    pub strategies: Vec<Strategy>,
}

/// Personas and strategies seeded into the chat page.
#[must_use]
pub fn trader_profiles() -> Vec<TraderProfile> {
    vec![
        TraderProfile {
            id: "day-trader",
            label: "Day Trader",
            strategies: vec![
                Strategy {
                    id: "breakout",
                    label: "Breakout Scalps",
                    description: "High-volume intraday breakouts with tight risk controls.",
                },
                Strategy {
                    id: "momentum",
                    label: "Momentum",
                    description: "Accelerating moves backed by news or order flow.",
                },
                Strategy {
                    id: "mean-reversion",
                    label: "VWAP Reversion",
                    description: "Fade extended moves back toward the volume-weighted average.",
                },
            ],
        },
        TraderProfile {
            id: "swing-trader",
            label: "Swing Trader",
            strategies: vec![
                Strategy {
                    id: "breakout",
                    label: "Breakout",
                    description: "Multi-day breakouts from well-defined bases or channels.",
                },
                Strategy {
                    id: "trend-follow",
                    label: "Trend Follow",
                    description: "Hold leaders in established uptrends with trailing stops.",
                },
                Strategy {
                    id: "pullback",
                    label: "Pullback",
                    description: "Entries on controlled pullbacks into moving averages.",
                },
            ],
        },
        TraderProfile {
            id: "long-term",
            label: "Long-Term Investor",
            strategies: vec![
                Strategy {
                    id: "quality-growth",
                    label: "Quality Growth",
                    description: "Compounders with double-digit growth and durable moats.",
                },
                Strategy {
                    id: "value",
                    label: "Value Rotation",
                    description: "Out-of-favor names trading well below intrinsic value.",
                },
                Strategy {
                    id: "dividend",
                    label: "Dividend Compounders",
                    description: "Reliable cashflow with sustainable payout growth.",
                },
            ],
        },
    ]
}

fn profile_options(profiles: &[TraderProfile]) -> String {
    profiles
        .iter()
        .map(|p| format!(r#"<option value="{id}">{label}</option>"#, id = p.id, label = p.label))
        .collect()
}

fn strategy_options(profile: &TraderProfile) -> String {
    profile
        .strategies
        .iter()
        .map(|s| format!(r#"<option value="{id}">{label}</option>"#, id = s.id, label = s.label))
        .collect()
}

/// Chat page with the current transcript pre-rendered into it.
///
/// `active_conversation` is the session's current conversation id (empty
/// when unassigned); the page script uses it to highlight the sidebar
/// entry after it loads the history list.
pub fn chat_page(
    transcript_html: &str,
    history_html: &str,
    user_email: &str,
    active_conversation: &str,
) -> String {
    let profiles = trader_profiles();
    let profiles_json = serde_json::to_string(&profiles).unwrap_or_else(|_| "[]".to_string());
    let first = &profiles[0];
    let content = format!(
        r#"
    <div class="chat-layout">
        <aside class="chat-sidebar">
            <h2>Conversations</h2>
            <div id="history" data-active-id="{active}">{history_html}</div>
        </aside>
        <section class="chat-main">
            <header class="chat-header">
                <h1>Assistant</h1>
                <span class="chat-user">{user}</span>
                <a class="logout" href="/account/logout">Sign out</a>
            </header>
            <div id="transcript" class="transcript">{transcript_html}</div>
            <div id="live-bubble" class="live-bubble"></div>
            <form id="composer" class="composer">
                <div class="profile-controls">
                    <select id="profile" name="profile" aria-label="Trading style">{profile_opts}</select>
                    <select id="strategy" name="strategy" aria-label="Strategy">{strategy_opts}</select>
                    <p id="strategy-notes" class="strategy-notes">{first_note}</p>
                </div>
                <textarea id="message" name="message" rows="2"
                    placeholder="Ask about a ticker, a setup, or a plan..."></textarea>
                <button id="send" type="submit">Send</button>
            </form>
        </section>
    </div>
    <script type="application/json" id="trader-profiles">{profiles_json}</script>
    <script src="/static/chat.js"></script>"#,
        active = markdown::escape_text(active_conversation),
        user = markdown::escape_text(user_email),
        profile_opts = profile_options(&profiles),
        strategy_opts = strategy_options(first),
        first_note = first.strategies[0].description,
    );
    html_shell("Chat", &content)
}

/// Render the transcript as stacked message bubbles.
///
/// User text is escaped verbatim; assistant text is rendered as Markdown.
#[must_use]
pub fn transcript_fragment(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        let body = match message.role {
            MessageRole::Assistant => markdown::render_markdown(&message.content),
            MessageRole::User | MessageRole::System => {
                format!("<p>{}</p>", markdown::escape_text(&message.content))
            }
        };
        out.push_str(&format!(
            r#"<article class="chat-message chat-message-{role}"><div class="bubble">{body}</div></article>"#,
            role = message.role.as_str(),
        ));
    }
    out
}

/// Render the conversation sidebar list.
#[must_use]
pub fn history_fragment(conversations: &[ConversationSummary], active: Option<&str>) -> String {
    if conversations.is_empty() {
        return r#"<p class="history-empty">No conversations yet.</p>"#.to_string();
    }
    let mut out = String::from(r#"<ul class="history-list">"#);
    for summary in conversations {
        let class = if active == Some(summary.conversation_id.as_str()) {
            "history-item active"
        } else {
            "history-item"
        };
        let name = if summary.name.is_empty() {
            "Untitled conversation"
        } else {
            summary.name.as_str()
        };
        out.push_str(&format!(
            r##"<li class="{class}"><a href="#" data-conversation-id="{id}">{name}</a></li>"##,
            id = markdown::escape_text(&summary.conversation_id),
            name = markdown::escape_text(name),
        ));
    }
    out.push_str("</ul>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_escapes_user_text_and_renders_assistant_markdown() {
        let messages = vec![
            ChatMessage::user("<b>not bold</b>"),
            ChatMessage::assistant("**bold**"),
        ];
        let html = transcript_fragment(&messages);
        assert!(html.contains("&lt;b&gt;not bold&lt;/b&gt;"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("chat-message-user"));
        assert!(html.contains("chat-message-assistant"));
    }

    #[test]
    fn test_history_marks_active_conversation() {
        let list = vec![
            ConversationSummary {
                conversation_id: "c1".to_string(),
                name: "AAPL plan".to_string(),
            },
            ConversationSummary {
                conversation_id: "c2".to_string(),
                name: String::new(),
            },
        ];
        let html = history_fragment(&list, Some("c2"));
        assert!(html.contains(r#"data-conversation-id="c1""#));
        assert!(html.contains("history-item active"));
        assert!(html.contains("Untitled conversation"));
    }

    #[test]
    fn test_empty_history_renders_placeholder() {
        let html = history_fragment(&[], None);
        assert!(html.contains("No conversations yet"));
    }

    #[test]
    fn test_login_page_prefills_email_and_shows_errors() {
        let errors = vec![FieldError {
            field: "password",
            message: "Password is required.".to_string(),
        }];
        let html = login_page(
            Some((StatusLevel::Error, "Sign-in failed.")),
            &errors,
            "trader@example.com",
        );
        assert!(html.contains(r#"value="trader@example.com""#));
        assert!(html.contains("status-error"));
        assert!(html.contains("Password is required."));
    }

    #[test]
    fn test_chat_page_embeds_profiles_and_transcript() {
        let html = chat_page("<p>hello</p>", "", "trader@example.com", "c5");
        assert!(html.contains(r#"value="day-trader""#));
        assert!(html.contains("<p>hello</p>"));
        assert!(html.contains("trader@example.com"));
        assert!(html.contains(r#"data-active-id="c5""#));
    }

    #[test]
    fn test_chat_page_seeds_strategy_menu() {
        let html = chat_page("", "", "trader@example.com", "");
        // Initial strategy select carries the first profile's strategies.
        assert!(html.contains(r#"value="breakout""#));
        assert!(html.contains("Breakout Scalps"));
        // The full profile data rides along for the cascade.
        assert!(html.contains(r#"id="trader-profiles""#));
        assert!(html.contains(r#""id":"quality-growth""#));
        assert!(html.contains("Dividend Compounders"));
    }

    #[test]
    fn test_every_profile_offers_strategies() {
        for profile in trader_profiles() {
            assert!(
                !profile.strategies.is_empty(),
                "{} has no strategies",
                profile.id
            );
            for strategy in &profile.strategies {
                assert!(!strategy.description.is_empty());
            }
        }
    }
}
