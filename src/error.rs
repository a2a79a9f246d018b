//! Failure taxonomy for the chat front end.
//!
//! Only HTTP-layer failures terminate a turn; everything local to stream
//! parsing is recovered silently inside the decoder.

use reqwest::StatusCode;

/// Errors surfaced by the chat session and the remote API client.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Network-level failure talking to the remote assistant API.
    #[error("request to the assistant API failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote assistant API answered with a non-success status.
    #[error("assistant API returned {status}")]
    UpstreamStatus {
        /// Status code of the failing response.
        status: StatusCode,
    },

    /// A turn is already outstanding for this session; the composer is
    /// locked until it completes.
    #[error("a response is still streaming; wait for it to finish")]
    Busy,
}
