pub mod discord;

use anyhow::Result;
use async_trait::async_trait;

/// A message received from the chat platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform-specific user ID of the author
    pub author_id: String,
    /// Display name of the author, used for logging only
    pub author_name: String,
    /// Channel the message was posted in; replies go back here
    pub channel_id: String,
    /// The message text
    pub content: String,
}

/// The parts of a live gateway session the dispatcher relies on.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// User ID the bot itself is logged in as.
    fn current_user_id(&self) -> String;

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<()>;
}
