use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{error, info};

use super::{voice_channel_of, MusicBot};
use crate::{
    audio::{SkipVote, VoiceSession},
    error::MusicError,
    sources::{import_playlist, PlaylistEntry},
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return reply(ctx, &command, "This command can't be used in DM channels.", true).await;
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );
    bot.set_announce_channel(guild_id, command.channel_id);

    match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "summon" => handle_summon(ctx, &command, bot, guild_id).await,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await,
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await,
        "now" => handle_now(ctx, &command, bot, guild_id).await,
        "shuffle" => handle_shuffle(ctx, &command, bot, guild_id).await,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await,
        "help" => reply_embed(ctx, &command, embeds::help_embed(), true).await,
        _ => reply(ctx, &command, "❌ Unknown command", true).await,
    }
}

// Funciones auxiliares

async fn reply(ctx: &Context, command: &CommandInteraction, content: impl Into<String>, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_error(ctx: &Context, command: &CommandInteraction, error: &MusicError) -> Result<()> {
    reply(ctx, command, format!("❌ {}", embeds::describe_error(error)), true).await
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn str_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn channel_option(command: &CommandInteraction, name: &str) -> Option<ChannelId> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_channel_id())
}

/// The user must be in voice, and the bot must be either idle or in that same
/// channel. Returns the user's channel, or the refusal to show them.
fn ensure_voice_state(ctx: &Context, command: &CommandInteraction, guild_id: GuildId) -> Result<ChannelId, String> {
    let Some(user_channel) = voice_channel_of(ctx, guild_id, command.user.id) else {
        return Err("You aren't connected to any voice channel 😛".to_string());
    };

    let bot_id = ctx.cache.current_user().id;
    match voice_channel_of(ctx, guild_id, bot_id) {
        Some(bot_channel) if bot_channel != user_channel => Err(format!(
            "I'm currently in the channel <#{bot_channel}>. Join that channel if you'd like to use me, or wait until I'm available 🥺"
        )),
        _ => Ok(user_channel),
    }
}

/// The guild's session, only if it has a live voice connection.
fn connected_session(bot: &MusicBot, guild_id: GuildId) -> Option<VoiceSession> {
    bot.registry().get(guild_id).filter(VoiceSession::is_connected)
}

// Handlers específicos para cada comando

async fn handle_join(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let channel_id = match ensure_voice_state(ctx, command, guild_id) {
        Ok(channel_id) => channel_id,
        Err(refusal) => return reply(ctx, command, refusal, true).await,
    };

    match bot.join_voice_channel(ctx, guild_id, channel_id).await {
        Ok(_) => reply(ctx, command, format!("🔊 Joining <#{channel_id}> 😊"), false).await,
        Err(e) => {
            error!("❌ Join failed in guild {}: {:?}", guild_id, e);
            reply(ctx, command, "❌ I couldn't join your voice channel. Check my permissions.", true).await
        }
    }
}

/// Like `/join`, but may name any voice channel and moves the bot even when it
/// is busy elsewhere. Gated to `MANAGE_GUILD` at registration.
async fn handle_summon(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let destination = channel_option(command, "channel").or_else(|| voice_channel_of(ctx, guild_id, command.user.id));
    let Some(channel_id) = destination else {
        return reply(ctx, command, "You aren't connected to any voice channel 😛", true).await;
    };

    match bot.join_voice_channel(ctx, guild_id, channel_id).await {
        Ok(_) => reply(ctx, command, format!("🔊 Moving to <#{channel_id}>"), false).await,
        Err(e) => {
            error!("❌ Summon failed in guild {}: {:?}", guild_id, e);
            reply(ctx, command, "❌ I couldn't join that voice channel. Check my permissions.", true).await
        }
    }
}

async fn handle_leave(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    if let Err(refusal) = ensure_voice_state(ctx, command, guild_id) {
        return reply(ctx, command, refusal, true).await;
    }

    if bot.leave_voice_channel(ctx, guild_id).await? {
        reply(ctx, command, "👋 Sayonara!", false).await
    } else {
        reply(ctx, command, "I'm not connected to any channel! 😋", true).await
    }
}

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let Some(query) = str_option(command, "query").map(str::trim).filter(|q| !q.is_empty()) else {
        return reply(ctx, command, "❌ Tell me what to play.", true).await;
    };
    let channel_id = match ensure_voice_state(ctx, command, guild_id) {
        Ok(channel_id) => channel_id,
        Err(refusal) => return reply(ctx, command, refusal, true).await,
    };

    // Resolver puede tardar varios segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let session = match connected_session(bot, guild_id) {
        Some(session) => session,
        None => match bot.join_voice_channel(ctx, guild_id, channel_id).await {
            Ok(session) => session,
            Err(e) => {
                error!("❌ Join failed in guild {}: {:?}", guild_id, e);
                command
                    .edit_response(
                        &ctx.http,
                        EditInteractionResponse::new().content("❌ I couldn't join your voice channel."),
                    )
                    .await?;
                return Ok(());
            }
        },
    };

    let resolver = bot.resolver().clone();
    if resolver.is_playlist(query) {
        let limit = bot.config().max_playlist_size;
        let entries = match resolver.resolve_playlist(query, limit).await {
            Ok(entries) => entries,
            Err(e) => {
                command
                    .edit_response(
                        &ctx.http,
                        EditInteractionResponse::new().content(format!("❌ {}", embeds::describe_error(&e))),
                    )
                    .await?;
                return Ok(());
            }
        };

        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new().content(format!(
                    "📋 Time to queue up some songs... ({} found)",
                    entries.len()
                )),
            )
            .await?;
        spawn_import(ctx, bot, session, entries, command, query.to_string());
        return Ok(());
    }

    match resolver.resolve(query, command.user.id).await {
        Ok(song) => {
            let embed = match session.enqueue(song.clone()) {
                Ok(position) => embeds::song_added_embed(&song, position),
                Err(e) => embeds::error_embed("Couldn't queue that", &embeds::describe_error(&e)),
            };
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
        }
        Err(e) => {
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new().embed(embeds::error_embed(
                        "Something happened 😢",
                        &embeds::describe_error(&e),
                    )),
                )
                .await?;
        }
    }
    Ok(())
}

/// Imports a playlist in the background and posts a summary when done.
fn spawn_import(
    ctx: &Context,
    bot: &MusicBot,
    session: VoiceSession,
    entries: Vec<PlaylistEntry>,
    command: &CommandInteraction,
    source: String,
) {
    let http = ctx.http.clone();
    let resolver = Arc::clone(bot.resolver());
    let delay = bot.config().playlist_import_delay();
    let requester = command.user.id;
    let channel_id = command.channel_id;

    tokio::spawn(async move {
        let report = import_playlist(resolver.as_ref(), &session, entries, requester, delay).await;
        let message = CreateMessage::new().embed(embeds::import_summary_embed(&report, &source));
        if let Err(e) = channel_id.send_message(&http, message).await {
            error!("❌ Could not post import summary in {}: {:?}", channel_id, e);
        }
    });
}

async fn handle_pause(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let Some(session) = bot.registry().get(guild_id) else {
        return reply_error(ctx, command, &MusicError::NotConnected).await;
    };
    match session.pause() {
        Ok(true) => reply(ctx, command, "⏸️ Paused", false).await,
        Ok(false) => reply(ctx, command, "Nothing is playing at the moment ☺️", true).await,
        Err(e) => reply_error(ctx, command, &e).await,
    }
}

async fn handle_resume(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let Some(session) = bot.registry().get(guild_id) else {
        return reply_error(ctx, command, &MusicError::NotConnected).await;
    };
    match session.resume() {
        Ok(true) => reply(ctx, command, "▶️ Resumed", false).await,
        Ok(false) => reply(ctx, command, "Nothing is paused right now ☺️", true).await,
        Err(e) => reply_error(ctx, command, &e).await,
    }
}

async fn handle_stop(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let Some(session) = bot.registry().get(guild_id) else {
        return reply_error(ctx, command, &MusicError::NotConnected).await;
    };
    match session.stop_all() {
        Ok(cleared) => reply(ctx, command, format!("⏹️ Stopped and cleared {cleared} queued songs"), false).await,
        Err(e) => reply_error(ctx, command, &e).await,
    }
}

async fn handle_skip(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let Some(session) = bot.registry().get(guild_id) else {
        return reply_error(ctx, command, &MusicError::NotConnected).await;
    };
    let content = match session.skip(command.user.id) {
        Ok(None) => "Nothing to skip right now...".to_string(),
        Ok(Some(SkipVote::Requester)) => "⏭️ Skipping, you queued it".to_string(),
        Ok(Some(SkipVote::Passed { votes })) => format!("⏭️ Skip vote passed with {votes} votes"),
        Ok(Some(SkipVote::Counted { votes, required })) => {
            format!("🗳️ Skip vote added, currently at **{votes}/{required}**")
        }
        Ok(Some(SkipVote::AlreadyVoted { votes, required })) => {
            return reply(
                ctx,
                command,
                format!("You have already voted to skip this song ({votes}/{required})."),
                true,
            )
            .await;
        }
        Err(e) => return reply_error(ctx, command, &e).await,
    };
    reply(ctx, command, content, false).await
}

async fn handle_queue(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    if let Err(refusal) = ensure_voice_state(ctx, command, guild_id) {
        return reply(ctx, command, refusal, true).await;
    }
    let Some(session) = bot.registry().get(guild_id) else {
        return reply(ctx, command, "The queue is empty ☺️", true).await;
    };

    let page = int_option(command, "page").unwrap_or(1).max(1) as usize;
    let snapshot = session.queue().snapshot(page, bot.config().queue_page_size);
    let current = session.current();
    let embed = embeds::queue_embed(
        &snapshot,
        current.as_ref(),
        session.is_looping(),
        session.queue().total_duration(),
    );
    reply_embed(ctx, command, embed, false).await
}

async fn handle_now(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let playing = bot
        .registry()
        .get(guild_id)
        .and_then(|session| session.current().map(|song| (song, session.is_looping())));

    match playing {
        Some((song, looping)) => reply_embed(ctx, command, embeds::now_playing_embed(&song, looping), false).await,
        None => reply(ctx, command, "Nothing is playing at the moment ☺️", true).await,
    }
}

async fn handle_shuffle(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    if let Err(refusal) = ensure_voice_state(ctx, command, guild_id) {
        return reply(ctx, command, refusal, true).await;
    }
    match bot.registry().get(guild_id) {
        Some(session) if !session.queue().is_empty() => {
            session.queue().shuffle();
            reply(ctx, command, "🔀 Queue shuffled", false).await
        }
        _ => reply(ctx, command, "The queue is empty ☺️", true).await,
    }
}

async fn handle_remove(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    if let Err(refusal) = ensure_voice_state(ctx, command, guild_id) {
        return reply(ctx, command, refusal, true).await;
    }
    let Some(session) = bot.registry().get(guild_id).filter(|s| !s.queue().is_empty()) else {
        return reply(ctx, command, "There is nothing to remove ☺️", true).await;
    };

    let index = int_option(command, "index").unwrap_or(0).max(0) as usize;
    match session.queue().remove_at(index) {
        Ok(song) => reply(ctx, command, format!("✅ Removed **{}** from the queue", song.title()), false).await,
        Err(e) => reply_error(ctx, command, &e).await,
    }
}

async fn handle_loop(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    if let Err(refusal) = ensure_voice_state(ctx, command, guild_id) {
        return reply(ctx, command, refusal, true).await;
    }
    let Some(session) = bot.registry().get(guild_id).filter(|s| s.current().is_some()) else {
        return reply(ctx, command, "You haven't told me to play anything... 👉👈", true).await;
    };

    let content = if session.toggle_loop() {
        "🔂 Looping the current song"
    } else {
        "➡️ Loop disabled"
    };
    reply(ctx, command, content, false).await
}

async fn handle_volume(ctx: &Context, command: &CommandInteraction, bot: &MusicBot, guild_id: GuildId) -> Result<()> {
    let Some(session) = connected_session(bot, guild_id) else {
        return reply(ctx, command, "Nothing is playing at the moment ☺️", true).await;
    };
    let Some(level) = int_option(command, "level") else {
        return reply(ctx, command, format!("🔊 Volume is {}%", (session.volume() * 100.0).round() as u32), true).await;
    };
    if !(0..=100).contains(&level) {
        return reply(ctx, command, "The volume must be between 0 and 100! 😢", true).await;
    }

    match session.set_volume(level as f32 / 100.0) {
        Ok(()) => reply(ctx, command, format!("🔊 The volume of the player has been set to {level}%"), false).await,
        Err(e) => reply_error(ctx, command, &e).await,
    }
}
