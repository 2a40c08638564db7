use std::future::Future;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::all::{
    ActivityData, ChannelId, Client, Context, EventHandler, GatewayIntents, Message, Ready,
};
use tracing::{debug, info};

use crate::bot::Dispatcher;
use crate::config::Config;
use crate::platform::{ChatSession, IncomingMessage};

/// Handler for Discord gateway events.
///
/// Serenity runs every event on its own task, so a slow Giphy lookup only
/// holds up the message that asked for it.
struct DiscordHandler {
    dispatcher: Arc<Dispatcher>,
    status: String,
}

impl DiscordHandler {
    /// Gateway intents needed to read message text in guilds and DMs.
    fn intents() -> GatewayIntents {
        GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            bot_id = %ready.user.id,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );

        ctx.set_activity(Some(presence(&self.status)));
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let incoming = to_incoming(&msg);
        let session = DiscordSession { ctx: &ctx };
        let outcome = self.dispatcher.handle(&session, &incoming).await;

        debug!(
            message_id = %msg.id,
            channel_id = %incoming.channel_id,
            ?outcome,
            "discord message handled"
        );
    }
}

/// The "Playing ..." activity advertising the command syntax.
fn presence(status: &str) -> ActivityData {
    ActivityData::playing(status)
}

fn to_incoming(msg: &Message) -> IncomingMessage {
    IncomingMessage {
        author_id: msg.author.id.to_string(),
        author_name: msg.author.name.clone(),
        channel_id: msg.channel_id.to_string(),
        content: msg.content.clone(),
    }
}

/// A live gateway context seen through the dispatcher's interface.
struct DiscordSession<'a> {
    ctx: &'a Context,
}

#[async_trait]
impl ChatSession for DiscordSession<'_> {
    fn current_user_id(&self) -> String {
        self.ctx.cache.current_user().id.to_string()
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<()> {
        let id: NonZeroU64 = channel_id
            .parse()
            .with_context(|| format!("Invalid Discord channel id: {}", channel_id))?;

        ChannelId::from(id)
            .say(&self.ctx.http, text)
            .await
            .with_context(|| format!("Failed to send message to channel {}", channel_id))?;

        Ok(())
    }
}

/// Connect to Discord and handle events until `shutdown` resolves.
pub async fn run<F>(config: &Config, dispatcher: Arc<Dispatcher>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let handler = DiscordHandler {
        dispatcher,
        status: config.bot.status.clone(),
    };

    info!("Starting Discord platform...");

    let mut client = Client::builder(&config.credentials.discord_token, DiscordHandler::intents())
        .event_handler(handler)
        .await
        .context("Failed to create Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown.await;
        info!("Closing Discord connection...");
        shard_manager.shutdown_all().await;
    });

    client
        .start()
        .await
        .context("Discord client stopped with an error")?;

    Ok(())
}
