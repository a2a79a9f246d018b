//! Typed client for the remote assistant API.
//!
//! The remote API is a black-box collaborator: it owns credential checking,
//! token issuance, and conversation persistence. This client forwards the
//! opaque bearer token and maps the handful of endpoints the front end
//! consumes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ChatError;

/// Connection settings for one authenticated user.
///
/// Passed explicitly into [`crate::chat::ChatSession::new`]; nothing in the
/// chat pipeline reads ambient configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote assistant API.
    pub base_url: String,
    /// Opaque token issued at login, if the user is authenticated.
    pub bearer_token: Option<String>,
    /// Identifier of the user on whose behalf requests are made.
    pub user_id: String,
}

impl ClientConfig {
    /// Settings for the unauthenticated credential-exchange endpoints.
    #[must_use]
    pub fn anonymous(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
            user_id: String::new(),
        }
    }
}

/// Role of a message author.
///
/// The remote API is not consistent about casing in stored history, so
/// capitalized spellings deserialize too; serialization is always
/// lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt (only ever seen in loaded history).
    #[serde(alias = "System", alias = "SYSTEM")]
    System,
    /// User message.
    #[serde(alias = "User", alias = "USER")]
    User,
    /// Assistant response.
    #[serde(alias = "Assistant", alias = "ASSISTANT")]
    Assistant,
}

impl MessageRole {
    /// Lowercase wire/CSS name for the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: MessageRole,
    /// Message text (Markdown for assistant messages).
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sidebar entry for one stored conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Opaque server-assigned conversation handle.
    pub conversation_id: String,
    /// Display name; may be empty for untitled chats.
    #[serde(default)]
    pub name: String,
}

/// Credential payload for login and registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Full name; registration only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

/// Token issued by the remote API after a successful credential exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Opaque bearer token; stored and forwarded, never inspected.
    pub token: String,
    /// Token expiry, when the API reports one.
    #[serde(default)]
    pub expires_at_utc: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_id: i64,
}

/// HTTP client for the remote assistant API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    user_id: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("authenticated", &self.bearer_token.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a new client with the given settings.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url,
            bearer_token: config.bearer_token,
            user_id: config.user_id,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    /// POST `/api/auth/login` - exchange credentials for a token.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ChatError> {
        self.auth_exchange("/api/auth/login", AuthRequest {
            name: None,
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    /// POST `/api/auth/register` - create an account; returns a token for
    /// auto-login when the API issues one.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ChatError> {
        self.auth_exchange("/api/auth/register", AuthRequest {
            name: Some(name.to_string()),
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    async fn auth_exchange(
        &self,
        path: &str,
        request: AuthRequest,
    ) -> Result<AuthResponse, ChatError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, path, "credential exchange rejected");
            return Err(ChatError::UpstreamStatus { status });
        }
        Ok(response.json().await?)
    }

    /// GET `/api/conversations` - ordered conversation summaries.
    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>, ChatError> {
        let response = self
            .authorize(self.http.get(self.endpoint("/api/conversations")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::UpstreamStatus { status });
        }
        Ok(response.json().await?)
    }

    /// GET `/api/conversations/{id}` - ordered messages of one conversation.
    pub async fn conversation(&self, id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        let response = self
            .authorize(
                self.http
                    .get(self.endpoint(&format!("/api/conversations/{id}"))),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::UpstreamStatus { status });
        }
        Ok(response.json().await?)
    }

    /// POST `/chat` - submit a user message and open the response stream.
    ///
    /// The returned [`reqwest::Response`] body is the block stream decoded
    /// by [`crate::stream::StreamDecoder`]; status has already been checked.
    pub async fn send_message(
        &self,
        content: &str,
        conversation_id: &str,
    ) -> Result<reqwest::Response, ChatError> {
        let body = serde_json::json!({
            "role": "user",
            "content": content,
            "userId": self.user_id,
            "conversationId": conversation_id,
        });

        let response = self
            .authorize(self.http.post(self.endpoint("/chat")).json(&body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::UpstreamStatus { status });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join_strips_trailing_slash() {
        let client = ApiClient::new(ClientConfig::anonymous("http://api.example/"));
        assert_eq!(client.endpoint("/chat"), "http://api.example/chat");
    }

    #[test]
    fn test_message_role_wire_names() {
        assert_eq!(MessageRole::Assistant.as_str(), "assistant");
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_auth_response_tolerates_missing_fields() {
        let auth: AuthResponse = serde_json::from_str(r#"{"token":"t-1"}"#).unwrap();
        assert_eq!(auth.token, "t-1");
        assert_eq!(auth.user_id, 0);
        assert!(auth.expires_at_utc.is_none());
    }

    #[test]
    fn test_message_role_accepts_capitalized_history() {
        // Stored history can come back with capitalized roles.
        let messages: Vec<ChatMessage> = serde_json::from_str(
            r#"[{"role":"User","content":"q"},{"role":"Assistant","content":"a"},{"role":"system","content":"s"}]"#,
        )
        .unwrap();
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[2].role, MessageRole::System);
        // Serialization stays lowercase.
        let json = serde_json::to_string(&messages[1]).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
    }

    #[test]
    fn test_conversation_summary_wire_shape() {
        let summary: ConversationSummary =
            serde_json::from_str(r#"{"conversationId":"c1","name":"Swing ideas"}"#).unwrap();
        assert_eq!(summary.conversation_id, "c1");
        assert_eq!(summary.name, "Swing ideas");
    }
}
