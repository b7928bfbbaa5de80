pub mod chat;
pub mod client;
pub mod patterns;
pub mod prediction;
pub mod satellite;
pub mod sections;

use serde::Serialize;
use tracing::{debug, warn};

pub use client::{ChatCompletion, CompletionRequest, HttpChatClient};

/// Whether a response came from the completion service or the built-in rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Ai,
    Fallback,
}

/// Sends one completion; `None` means the caller should use its fallback.
pub async fn ask(
    backend: Option<&dyn ChatCompletion>,
    request: CompletionRequest,
    purpose: &'static str,
) -> Option<String> {
    let Some(backend) = backend else {
        debug!(purpose, "no completion backend configured, using fallback");
        return None;
    };
    match backend.complete(request).await {
        Ok(reply) => Some(reply),
        Err(err) => {
            warn!(purpose, error = %err, "completion failed, using fallback");
            None
        }
    }
}
