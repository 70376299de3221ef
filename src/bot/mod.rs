//! # Bot Module
//!
//! Serenity front-end for the playback core.
//!
//! - Slash command registration ([`commands`]) and dispatch ([`handlers`])
//! - Voice connection management: joining attaches a [`SongbirdSink`] to the
//!   guild's [`VoiceSession`]
//! - Announcing session events in the guild's text channel ([`events`])
//!
//! ## Architecture
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`] and owns the shared
//! [`SessionRegistry`] and [`TrackResolver`]. Commands never touch songbird
//! directly once a session has its sink.

use anyhow::{Context as _, Result};
use dashmap::DashMap;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{songbird_sink::SongbirdSink, SessionRegistry, VoiceSession},
    config::Config,
    sources::TrackResolver,
};

/// Main Discord event handler.
pub struct MusicBot {
    config: Arc<Config>,
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn TrackResolver>,
    http: reqwest::Client,
    /// Text channel each guild last used the bot from; events are announced there.
    announce_channels: Arc<DashMap<GuildId, ChannelId>>,
    announcer_started: AtomicBool,
}

impl MusicBot {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<SessionRegistry>,
        resolver: Arc<dyn TrackResolver>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            registry,
            resolver,
            http,
            announce_channels: Arc::new(DashMap::new()),
            announcer_started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<dyn TrackResolver> {
        &self.resolver
    }

    pub fn set_announce_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.announce_channels.insert(guild_id, channel_id);
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set (instant
    /// propagation) or globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .with_context(|| format!("could not register commands in guild {guild_id}"))?;
                info!("✅ Guild commands registered for: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx)
                    .await
                    .context("could not register global commands")?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }

    /// Connects to a voice channel and makes sure the guild's session streams
    /// into it. Returns the session.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<VoiceSession> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird is not initialised"))?;

        let call = manager
            .join(guild_id, channel_id)
            .await
            .with_context(|| format!("could not join voice channel {channel_id}"))?;

        let session = self.registry.get_or_create(guild_id);
        if !session.is_connected() {
            let sink = SongbirdSink::attach(guild_id, call, self.http.clone()).await;
            session.attach_sink(Arc::new(sink));
        }

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(session)
    }

    /// Tears down the guild's session and drops the songbird call.
    /// Returns `false` if the bot was not in voice.
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<bool> {
        let had_session = self.registry.leave(guild_id).await;

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird is not initialised"))?;
        let had_call = manager.get(guild_id).is_some();
        if had_call {
            if let Err(e) = manager.remove(guild_id).await {
                warn!("⚠️ Could not drop voice call in guild {}: {:?}", guild_id, e);
            }
        }

        if had_session || had_call {
            info!("👋 Left voice in guild {}", guild_id);
        }
        Ok(had_session || had_call)
    }
}

/// The voice channel `user_id` currently sits in, from the gateway cache.
pub fn voice_channel_of(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild.voice_states.get(&user_id).and_then(|state| state.channel_id)
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());
        info!("🔧 Application ID: {}", self.config.application_id);

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Error registering commands: {:?}", e);
        }

        // `ready` fires again after every reconnect; one announcer is enough
        if !self.announcer_started.swap(true, Ordering::SeqCst) {
            let announcer = events::Announcer::new(
                ctx.http.clone(),
                self.registry.clone(),
                self.announce_channels.clone(),
            );
            tokio::spawn(announcer.run());
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("❌ Error handling command: {:?}", e);
            }
        }
    }

    /// Cleans up when the bot is disconnected from voice by someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id != bot_id || new.channel_id.is_some() || old.is_none() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        if self.registry.get(guild_id).is_some() {
            info!("🔌 Disconnected from voice in guild {}, closing its session", guild_id);
            if let Err(e) = self.leave_voice_channel(&ctx, guild_id).await {
                error!("❌ Error cleaning up guild {}: {:?}", guild_id, e);
            }
        }
    }
}
