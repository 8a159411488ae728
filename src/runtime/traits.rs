//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::access::ParticipantId;
use crate::state_machine::Prompt;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Handle to a message the bot has sent, for editing it later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

/// Outbound delivery failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Edit with identical content
    #[error("message content unchanged")]
    Unchanged,
    /// Message too old or otherwise not editable
    #[error("message cannot be edited")]
    NotEditable,
    /// Recipient blocked the bot or never started a chat
    #[error("recipient unreachable: {0}")]
    Unreachable(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound side of the chat transport
#[async_trait]
pub trait ChatOutlet: Send + Sync {
    /// Send a new message
    async fn send(&self, to: ParticipantId, prompt: &Prompt) -> Result<MessageRef, DeliveryError>;

    /// Replace the text and buttons of an earlier message
    async fn edit(
        &self,
        to: ParticipantId,
        message: MessageRef,
        prompt: &Prompt,
    ) -> Result<(), DeliveryError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatOutlet + ?Sized> ChatOutlet for Arc<T> {
    async fn send(&self, to: ParticipantId, prompt: &Prompt) -> Result<MessageRef, DeliveryError> {
        (**self).send(to, prompt).await
    }

    async fn edit(
        &self,
        to: ParticipantId,
        message: MessageRef,
        prompt: &Prompt,
    ) -> Result<(), DeliveryError> {
        (**self).edit(to, message, prompt).await
    }
}
