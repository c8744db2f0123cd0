//! Language-Model Backends
//!
//! The inference seam. The model worker calls
//! [`LanguageModel::complete`] with a read-only conversation snapshot and
//! blocks on its own thread until the reply arrives; no other component
//! ever waits on the model.

mod ollama;
mod traits;

pub use ollama::OllamaBackend;
pub use traits::{BackendError, LanguageModel};
