//! The `Channel` trait and the messages that flow through it.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::channels::keyboard::Keyboard;
use crate::error::ChannelError;

/// Inbound events, in arrival order.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A decoded inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Name of the channel that received it.
    pub channel: String,
    /// VK id of the sender.
    pub user_id: i64,
    pub text: String,
    /// Whether the message was sent to the bot (rather than e.g. echoed from it).
    pub directed_at_bot: bool,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: i64, text: &str) -> Self {
        Self {
            channel: channel.to_string(),
            user_id,
            text: text.to_string(),
            directed_at_bot: true,
        }
    }

    pub fn with_directed_at_bot(mut self, directed: bool) -> Self {
        self.directed_at_bot = directed;
        self
    }
}

/// An outbound chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub user_id: i64,
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// Comma-separated attachment references.
    pub attachment: Option<String>,
}

impl OutgoingMessage {
    pub fn text(user_id: i64, text: impl Into<String>) -> Self {
        Self {
            user_id,
            text: text.into(),
            keyboard: None,
            attachment: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_attachment(mut self, attachment: impl Into<String>) -> Self {
        self.attachment = Some(attachment.into());
        self
    }
}

/// A messaging gateway the bot listens on and replies through.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver one message to a user.
    async fn send(&self, message: OutgoingMessage) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
