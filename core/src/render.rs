//! Render Requests
//!
//! Requests sent from the Controller to the display worker, and the seam
//! behind which the actual panel lives. The core never touches pixels,
//! fonts, or refresh timing - it decides *what* should be on screen and in
//! what order, and the [`Renderer`] collaborator decides how that looks.
//!
//! A render call on real e-paper hardware can take around two seconds, so
//! requests are queued and the display worker paces them one at a time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A display directive from the Controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderRequest {
    /// Show the charging instructions that accompany an accepted
    /// submission. The instruction copy is owned by the renderer.
    ShowLoadingPrompt,

    /// Refresh the on-screen echo of the user's input line.
    UpdateUserInputEcho {
        /// The input text to echo (partial while typing, final after
        /// enter).
        text: String,
    },

    /// Fill one more segment of the charge bar.
    AdvanceLoadingBar {
        /// Zero-based index of the segment to fill.
        unit: u8,
    },

    /// Show a finished reply.
    ShowResponse {
        /// The reply text.
        text: String,
    },
}

impl RenderRequest {
    /// Short name of the request kind, for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShowLoadingPrompt => "ShowLoadingPrompt",
            Self::UpdateUserInputEcho { .. } => "UpdateUserInputEcho",
            Self::AdvanceLoadingBar { .. } => "AdvanceLoadingBar",
            Self::ShowResponse { .. } => "ShowResponse",
        }
    }
}

/// Errors a renderer may report.
///
/// A failed render is logged and skipped by the display worker; it never
/// stops the worker or any other component.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The panel (or whatever stands in for it) rejected the refresh.
    #[error("panel refresh failed: {0}")]
    Panel(String),

    /// Writing to the render target failed.
    #[error("render target error: {0}")]
    Io(#[from] std::io::Error),
}

/// Display collaborator.
///
/// Implementations serialize their own hardware access; the display worker
/// guarantees calls arrive one at a time, in request order.
pub trait Renderer: Send {
    /// Render one request. Synchronous; may be slow.
    fn render(&mut self, request: &RenderRequest) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_names() {
        assert_eq!(RenderRequest::ShowLoadingPrompt.name(), "ShowLoadingPrompt");
        assert_eq!(
            RenderRequest::AdvanceLoadingBar { unit: 3 }.name(),
            "AdvanceLoadingBar"
        );
    }

    #[test]
    fn test_requests_serialize() {
        let request = RenderRequest::UpdateUserInputEcho {
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: RenderRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
