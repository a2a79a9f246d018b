//! Chat turn state machine and transcript ownership.
//!
//! [`ChatSession`] drives one request/response cycle end-to-end: it appends
//! the optimistic user message, opens the streaming `/chat` call, feeds
//! every chunk through a [`StreamDecoder`], and re-renders the in-progress
//! assistant bubble through an injected [`RenderSink`]. The sink boundary
//! keeps the state machine testable without a browser.

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ChatMessage, ClientConfig, ConversationSummary};
use crate::error::ChatError;
use crate::markdown;
use crate::stream::{StreamDecoder, StreamFrame};

/// Placeholder shown between submit and the first decoded increment.
const THINKING_BUBBLE: &str = r#"<p class="thinking">Thinking&hellip;</p>"#;

/// Rendering sink driven by the session.
///
/// Implementations push markup to wherever the transcript is displayed:
/// the SSE bridge in the web layer, or a recording sink in tests.
pub trait RenderSink: Send {
    /// Replace the visible transcript wholesale.
    fn render_transcript(&mut self, messages: &[ChatMessage]);

    /// Re-render the in-progress assistant bubble from fully rendered
    /// markup. Called once per decoded increment with the whole
    /// accumulator re-rendered from the start.
    fn render_placeholder(&mut self, html: &str);

    /// Replace the conversation sidebar; `active` marks the entry to
    /// highlight.
    fn render_history(&mut self, conversations: &[ConversationSummary], active: Option<&str>);
}

/// Sink that discards every render call.
///
/// Used where only the returned data matters, e.g. the JSON proxy
/// endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl RenderSink for NoopSink {
    fn render_transcript(&mut self, _messages: &[ChatMessage]) {}
    fn render_placeholder(&mut self, _html: &str) {}
    fn render_history(&mut self, _conversations: &[ConversationSummary], _active: Option<&str>) {}
}

/// Phase of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    /// No request outstanding; the composer accepts input.
    #[default]
    Idle,
    /// Request issued, no response bytes consumed yet.
    Sending,
    /// Response body is being decoded.
    Streaming,
}

/// One user's chat state: transcript, conversation id, and the in-flight
/// turn.
///
/// Exactly one stream may be in flight at a time; a submission while a
/// turn is outstanding is rejected with [`ChatError::Busy`] rather than
/// interleaving two decoders against one transcript.
#[derive(Debug)]
pub struct ChatSession {
    api: ApiClient,
    transcript: Vec<ChatMessage>,
    /// Opaque server-assigned id; empty means "new conversation, not yet
    /// assigned". Never invented locally.
    conversation_id: String,
    /// Growing text of the currently streaming assistant message.
    accumulator: String,
    state: TurnState,
}

impl ChatSession {
    /// Create a session from explicit connection settings.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            api: ApiClient::new(config),
            transcript: Vec::new(),
            conversation_id: String::new(),
            accumulator: String::new(),
            state: TurnState::Idle,
        }
    }

    #[must_use]
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    #[must_use]
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Submit one user message and stream the assistant's reply.
    ///
    /// Empty (after trimming) input is a no-op. The user message is
    /// appended optimistically and never rolled back; on failure the
    /// placeholder bubble is replaced with the error description and the
    /// session returns to [`TurnState::Idle`].
    pub async fn submit(
        &mut self,
        text: &str,
        sink: &mut dyn RenderSink,
    ) -> Result<(), ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if self.state != TurnState::Idle {
            return Err(ChatError::Busy);
        }

        self.transcript.push(ChatMessage::user(text));
        sink.render_transcript(&self.transcript);
        sink.render_placeholder(THINKING_BUBBLE);

        self.state = TurnState::Sending;
        self.accumulator.clear();
        let result = self.run_turn(text, sink).await;
        self.state = TurnState::Idle;

        if let Err(error) = &result {
            warn!(%error, "chat turn failed");
            let message = format!("Error: {error}");
            sink.render_placeholder(&format!(
                r#"<p class="bubble-error">{}</p>"#,
                markdown::escape_text(&message)
            ));
            self.transcript.push(ChatMessage::assistant(message));
            sink.render_transcript(&self.transcript);
        }
        result
    }

    async fn run_turn(
        &mut self,
        text: &str,
        sink: &mut dyn RenderSink,
    ) -> Result<(), ChatError> {
        let previous_id = self.conversation_id.clone();
        let response = self.api.send_message(text, &self.conversation_id).await?;
        self.state = TurnState::Streaming;

        let mut decoder = StreamDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for frame in decoder.feed(&chunk) {
                self.apply_frame(frame, sink);
            }
        }
        if let Some(frame) = decoder.finish() {
            self.apply_frame(frame, sink);
        }

        // Finalize the assistant message even when the stream carried no
        // text, and re-render the transcript so the page can retire the
        // live bubble.
        self.transcript
            .push(ChatMessage::assistant(std::mem::take(&mut self.accumulator)));
        sink.render_transcript(&self.transcript);
        info!(
            conversation_id = %self.conversation_id,
            messages = self.transcript.len(),
            "assistant turn complete"
        );

        if self.conversation_id != previous_id {
            // Non-fatal: the just-completed message is unaffected.
            match self.api.conversations().await {
                Ok(list) => sink.render_history(&list, Some(self.conversation_id.as_str())),
                Err(error) => warn!(%error, "history refresh failed"),
            }
        }
        Ok(())
    }

    /// Apply one decoded frame in arrival order.
    fn apply_frame(&mut self, frame: StreamFrame, sink: &mut dyn RenderSink) {
        if let Some(id) = frame.id_update {
            debug!(conversation_id = %id, "conversation id announced");
            self.conversation_id = id;
        }
        if let Some(text) = frame.text_increment {
            self.accumulator.push_str(&text);
            sink.render_placeholder(&markdown::render_markdown(&self.accumulator));
        }
    }

    /// Fetch and render the conversation sidebar.
    ///
    /// A fetch failure is logged and renders the empty list; it never
    /// surfaces to the user.
    pub async fn load_history(&mut self, sink: &mut dyn RenderSink) -> Vec<ConversationSummary> {
        match self.api.conversations().await {
            Ok(list) => {
                let active =
                    (!self.conversation_id.is_empty()).then_some(self.conversation_id.as_str());
                sink.render_history(&list, active);
                list
            }
            Err(error) => {
                warn!(%error, "failed to fetch chat history");
                sink.render_history(&[], None);
                Vec::new()
            }
        }
    }

    /// Replace the transcript with a stored conversation.
    ///
    /// No-op when the fetch fails or returns no data, and rejected while a
    /// turn is outstanding so a loading conversation can never interleave
    /// with a streaming one.
    pub async fn load_conversation(
        &mut self,
        id: &str,
        sink: &mut dyn RenderSink,
    ) -> Vec<ChatMessage> {
        if self.state != TurnState::Idle {
            debug!("ignoring conversation load while a turn is outstanding");
            return Vec::new();
        }

        match self.api.conversation(id).await {
            Ok(messages) if messages.is_empty() => {
                debug!(conversation_id = %id, "conversation returned no data");
                Vec::new()
            }
            Ok(messages) => {
                self.conversation_id = id.to_string();
                self.transcript.clone_from(&messages);
                sink.render_transcript(&self.transcript);
                messages
            }
            Err(error) => {
                warn!(%error, conversation_id = %id, "failed to load conversation");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_session() -> ChatSession {
        // Port 9 (discard) is never listened on; these tests only exercise
        // paths that return before any request is issued.
        ChatSession::new(ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            bearer_token: Some("tok".to_string()),
            user_id: "u-1".to_string(),
        })
    }

    #[tokio::test]
    async fn test_empty_submit_is_a_noop() {
        let mut session = offline_session();
        let mut sink = NoopSink;
        session.submit("   \n", &mut sink).await.unwrap();
        assert!(session.transcript().is_empty());
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_submit_rejected_while_turn_outstanding() {
        let mut session = offline_session();
        session.state = TurnState::Streaming;

        let mut sink = NoopSink;
        let result = session.submit("second message", &mut sink).await;
        assert!(matches!(result, Err(ChatError::Busy)));
        // The rejected submission must not touch the transcript.
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_load_conversation_rejected_while_streaming() {
        let mut session = offline_session();
        session.conversation_id = "c1".to_string();
        session.state = TurnState::Streaming;

        let mut sink = NoopSink;
        let loaded = session.load_conversation("c2", &mut sink).await;
        assert!(loaded.is_empty());
        assert_eq!(session.conversation_id(), "c1");
    }

    #[test]
    fn test_frames_without_id_do_not_clear_the_latched_id() {
        let mut session = offline_session();
        let mut sink = NoopSink;

        session.apply_frame(
            StreamFrame {
                id_update: Some("c7".to_string()),
                text_increment: Some("Hel".to_string()),
            },
            &mut sink,
        );
        session.apply_frame(
            StreamFrame {
                id_update: None,
                text_increment: Some("lo".to_string()),
            },
            &mut sink,
        );

        assert_eq!(session.conversation_id(), "c7");
        assert_eq!(session.accumulator, "Hello");
    }
}
