//! Language model trait.
//!
//! Remote backends drive a chat model through this one seam. Implementations
//! classify their own provider failures into [`BackendError`] so the fallback
//! controller never sees raw HTTP errors.

use async_trait::async_trait;

use crate::error::{BackendError, BackendResult};

/// A chat-completion language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one system/user exchange and return the assistant text.
    async fn complete(&self, system: &str, user: &str) -> BackendResult<String>;

    /// Cheap request proving the credential and endpoint work.
    async fn probe(&self) -> BackendResult<()> {
        let reply = self.complete("Reply with the single word: ok", "ping").await?;
        if reply.trim().is_empty() {
            return Err(BackendError::invalid_response("empty probe reply"));
        }
        Ok(())
    }

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}
