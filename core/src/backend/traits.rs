//! Backend Trait
//!
//! Trait definition for language-model backends. The abstraction keeps the
//! worker loop independent of any particular provider; tests drive it with
//! an in-memory mock and the shipped implementation talks to Ollama.

use thiserror::Error;

use crate::conversation::Conversation;

/// Errors a backend call may produce.
///
/// The model worker converts any of these into a visible error reply; a
/// backend failure never terminates a worker cycle.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP transport failed (connect, timeout, decode).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },

    /// The backend answered 200 but the payload was not usable.
    #[error("malformed backend reply: {0}")]
    Malformed(String),
}

/// Language-model collaborator.
///
/// `complete` is a blocking call and may take many seconds; it runs on the
/// model worker's thread only.
pub trait LanguageModel: Send + Sync {
    /// Backend name, for log lines.
    fn name(&self) -> &str;

    /// Whether the backend is reachable. Best-effort; a false answer only
    /// produces a startup warning.
    fn health_check(&self) -> bool;

    /// Generate the next assistant reply for the given conversation.
    fn complete(&self, conversation: &Conversation) -> Result<String, BackendError>;
}
