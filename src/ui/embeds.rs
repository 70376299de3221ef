use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{QueuePage, Song},
    error::{MusicError, ResolveErrorKind},
    sources::ImportReport,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 ROCKU";

/// Max failures listed in an import summary before collapsing the rest.
const MAX_LISTED_FAILURES: usize = 10;

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Human wording for an error shown to users.
pub fn describe_error(error: &MusicError) -> String {
    match error {
        MusicError::Resolution { kind: ResolveErrorKind::NotFound, reason } => {
            format!("Couldn't find anything that matches that. ({reason})")
        }
        MusicError::Resolution { kind: ResolveErrorKind::NetworkFailure, reason } => {
            format!("Couldn't reach the music source, try again in a moment. ({reason})")
        }
        MusicError::Resolution { kind: ResolveErrorKind::Restricted, reason } => {
            format!("That track is restricted and can't be played. ({reason})")
        }
        MusicError::OutOfRange { index, len } => {
            format!("There is no song at position {index}; the queue has {len} songs.")
        }
        MusicError::InvalidArgument(reason) => format!("Invalid value: {reason}"),
        MusicError::NotConnected => "Not connected to any voice channel.".to_string(),
        MusicError::Sink(reason) => format!("Audio playback failed: {reason}"),
        MusicError::SessionClosed => "The player was shut down; use `/join` to start again.".to_string(),
    }
}

fn song_fields(mut embed: CreateEmbed, song: &Song) -> CreateEmbed {
    let duration = song
        .duration()
        .map(format_duration)
        .unwrap_or_else(|| "🔴 Live".to_string());

    embed = embed
        .field("⏱️ Duration", duration, true)
        .field("👤 Requested by", format!("<@{}>", song.requested_by()), true)
        .field("🎤 Uploader", song.uploader().unwrap_or("Unknown"), true);

    if let Some(thumbnail) = song.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    if song.url().starts_with("http") {
        embed = embed.url(song.url());
    }
    embed
}

/// Crea un embed para mostrar la canción actual
pub fn now_playing_embed(song: &Song, looping: bool) -> CreateEmbed {
    let title = if looping { "🔂 Now Playing (looping)" } else { "🎵 Now Playing" };
    let embed = CreateEmbed::default()
        .title(title)
        .description(format!("```css\n{}\n```", song.title()))
        .color(colors::MUSIC_PURPLE);

    song_fields(embed, song)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn song_added_embed(song: &Song, position: usize) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("✅ Enqueued")
        .description(format!("{song}"))
        .color(colors::SUCCESS_GREEN)
        .field("📍 Position", position.to_string(), true);

    song_fields(embed, song)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar la cola de reproducción
pub fn queue_embed(
    page: &QueuePage,
    current: Option<&Song>,
    looping: bool,
    total_duration: Duration,
) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE);

    if let Some(song) = current {
        let status = if looping { "🔂" } else { "▶️" };
        embed = embed.field(format!("{status} Playing"), format!("{song}"), false);
    }

    if page.total_items == 0 {
        return embed
            .description("😴 **The queue is empty**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if page.items.is_empty() {
        embed = embed.description(format!(
            "Page {} is past the end of the queue (only {} pages).",
            page.page, page.total_pages
        ));
    } else {
        let mut list = String::new();
        for (position, song) in page.numbered() {
            let duration = song
                .duration()
                .map(|d| format!(" `[{}]`", format_duration(d)))
                .unwrap_or_default();
            list.push_str(&format!("`{}.` [**{}**]({}){}\n", position, song.title(), song.url(), duration));
        }
        embed = embed.description(list);
    }

    let mut info = format!("**{} tracks**", page.total_items);
    if total_duration > Duration::ZERO {
        info.push_str(&format!(" • **{}** total", humantime::format_duration(total_duration)));
    }
    embed = embed.field("Information", info, false);

    embed
        .footer(CreateEmbedFooter::new(format!(
            "Viewing page {}/{} • ROCKU",
            page.page, page.total_pages
        )))
        .timestamp(Timestamp::now())
}

/// Summary posted once a background playlist import ends.
pub fn import_summary_embed(report: &ImportReport, source: &str) -> CreateEmbed {
    let color = match (report.queued, report.failed.len()) {
        (0, _) => colors::ERROR_RED,
        (_, 0) => colors::SUCCESS_GREEN,
        _ => colors::WARNING_ORANGE,
    };

    let mut embed = CreateEmbed::default()
        .title("📋 Playlist Imported")
        .description(format!("Queued up **{}** songs!", report.queued))
        .color(color)
        .field("🔗 Source", source, false);

    if !report.failed.is_empty() {
        let mut failures: String = report
            .failed
            .iter()
            .take(MAX_LISTED_FAILURES)
            .map(|(entry, error)| format!("• **{}**: {}\n", entry.title, error))
            .collect();
        if report.failed.len() > MAX_LISTED_FAILURES {
            failures.push_str(&format!("…and {} more", report.failed.len() - MAX_LISTED_FAILURES));
        }
        embed = embed.field(format!("⚠️ Couldn't queue {}", report.failed.len()), failures, false);
    }

    if report.interrupted {
        embed = embed.field("⏹️ Interrupted", "The bot left the voice channel before the import finished.", false);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de error
pub fn error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de ayuda general
pub fn help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 ROCKU - Commands")
        .color(colors::INFO_BLUE)
        .field(
            "🎵 Playback",
            "• `/play <query>` - Play a song, link or playlist\n\
            • `/pause` - Pause the current song\n\
            • `/resume` - Resume a paused song\n\
            • `/skip` - Vote to skip (the requester skips instantly)\n\
            • `/stop` - Stop playing and clear the queue\n\
            • `/now` - Show the current song",
            false,
        )
        .field(
            "📜 Queue",
            "• `/queue [page]` - Show the queue\n\
            • `/shuffle` - Shuffle the queue\n\
            • `/remove <index>` - Remove a song by position\n\
            • `/loop` - Loop the current song on/off",
            false,
        )
        .field(
            "🔊 Voice",
            "• `/join` - Join your voice channel\n\
            • `/summon [channel]` - Bring me to a channel (Manage Server)\n\
            • `/leave` - Clear the queue and leave\n\
            • `/volume <0-100>` - Set the volume",
            false,
        )
        .field(
            "🔗 Sources",
            "• YouTube searches, videos and playlists\n\
            • Spotify tracks and playlists\n\
            • Direct audio file links",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}
