use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::{BotConfig, EmptyResultPolicy};
use crate::giphy::{GifSearch, SearchResult};
use crate::platform::{ChatSession, IncomingMessage};

/// A message split into its verb and argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    pub verb: &'a str,
    /// Remaining tokens joined by single spaces; empty if there are none.
    pub argument: String,
}

impl<'a> Command<'a> {
    /// Splits on single spaces. The verb must be the very first token, so
    /// content starting with a space has no verb and yields `None`.
    pub fn parse(content: &'a str) -> Option<Self> {
        let mut tokens = content.split(' ');
        let verb = tokens.next().filter(|verb| !verb.is_empty())?;
        let argument = tokens
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Some(Self { verb, argument })
    }
}

/// What became of one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a command for us, or our own message.
    Ignored,
    Replied,
    /// The search found nothing and the policy says to stay quiet.
    NoResult,
    /// The search or the reply failed; already logged.
    Failed,
}

/// Turns one incoming message into zero or one outbound message.
///
/// Holds only read-only state, so a single instance is shared by every
/// concurrently handled event.
pub struct Dispatcher {
    search: Arc<dyn GifSearch>,
    config: BotConfig,
}

impl Dispatcher {
    pub fn new(search: Arc<dyn GifSearch>, config: BotConfig) -> Self {
        Self { search, config }
    }

    pub async fn handle(&self, session: &dyn ChatSession, msg: &IncomingMessage) -> Outcome {
        // Never react to our own messages
        if msg.author_id == session.current_user_id() {
            return Outcome::Ignored;
        }

        let Some(tag) = self.search_tag(&msg.content) else {
            return Outcome::Ignored;
        };

        info!(
            author = %msg.author_name,
            author_id = %msg.author_id,
            channel_id = %msg.channel_id,
            tag = %tag,
            "search command received"
        );

        let result = match self.search.random(&tag).await {
            Ok(result) => result,
            Err(e) => {
                error!(tag = %tag, "GIF search failed: {:#}", e);
                return Outcome::Failed;
            }
        };

        let Some(reply) = self.reply_for(&result) else {
            info!(tag = %tag, "no GIF found, not replying");
            return Outcome::NoResult;
        };

        if result.is_empty() {
            warn!(tag = %tag, policy = %self.config.on_empty, "no GIF found");
        }

        match session.send_message(&msg.channel_id, reply).await {
            Ok(()) => Outcome::Replied,
            Err(e) => {
                error!(channel_id = %msg.channel_id, "Failed to send reply: {:#}", e);
                Outcome::Failed
            }
        }
    }

    /// The search tag, if `content` is a well-formed invocation.
    fn search_tag(&self, content: &str) -> Option<String> {
        let command = Command::parse(content)?;
        if command.verb != self.config.command || command.argument.is_empty() {
            return None;
        }
        Some(command.argument)
    }

    fn reply_for<'a>(&'a self, result: &'a SearchResult) -> Option<&'a str> {
        if !result.is_empty() {
            return Some(result.embed_url.as_str());
        }
        match self.config.on_empty {
            EmptyResultPolicy::Send => Some(""),
            EmptyResultPolicy::Skip => None,
            EmptyResultPolicy::Notice => Some(self.config.no_results_message.as_str()),
        }
    }
}
