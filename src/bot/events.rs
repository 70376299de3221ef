use dashmap::DashMap;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{SessionEvent, SessionRegistry, SkipVote},
    ui::embeds,
};

/// Posts session events to each guild's announce channel.
pub struct Announcer {
    http: Arc<Http>,
    registry: Arc<SessionRegistry>,
    channels: Arc<DashMap<GuildId, ChannelId>>,
}

/// What to post for an event, if anything.
pub fn announcement(event: &SessionEvent, looping: bool) -> Option<CreateMessage> {
    match event {
        SessionEvent::SongStarted { song, .. } => {
            Some(CreateMessage::new().embed(embeds::now_playing_embed(song, looping)))
        }
        SessionEvent::SkipTriggered { song, vote, .. } => {
            let content = match vote {
                SkipVote::Requester => format!("⏭️ Skipped **{}** (requested by the person who queued it)", song.title()),
                SkipVote::Passed { votes } => format!("⏭️ Vote passed with {votes} votes, skipping **{}**", song.title()),
                _ => return None,
            };
            Some(CreateMessage::new().content(content))
        }
        SessionEvent::PlaybackError { song, error, .. } => Some(CreateMessage::new().embed(
            embeds::error_embed(
                "Playback failed",
                &format!("Couldn't play **{}**: {}", song.title(), error),
            ),
        )),
        SessionEvent::SongFinished { .. } => None,
    }
}

impl Announcer {
    pub fn new(
        http: Arc<Http>,
        registry: Arc<SessionRegistry>,
        channels: Arc<DashMap<GuildId, ChannelId>>,
    ) -> Self {
        Self {
            http,
            registry,
            channels,
        }
    }

    pub async fn run(self) {
        let mut events = self.registry.subscribe();
        info!("📣 Event announcer started");

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    warn!("⚠️ Announcer lagged behind, {} events dropped", missed);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            self.announce(&event).await;
        }

        info!("📣 Event announcer stopped");
    }

    async fn announce(&self, event: &SessionEvent) {
        let guild_id = event.guild_id();
        let Some(channel_id) = self.channels.get(&guild_id).map(|c| *c) else {
            debug!("No announce channel for guild {}", guild_id);
            return;
        };

        let looping = self
            .registry
            .get(guild_id)
            .map(|session| session.is_looping())
            .unwrap_or(false);
        let Some(message) = announcement(event, looping) else {
            return;
        };

        if let Err(e) = channel_id.send_message(&self.http, message).await {
            error!("❌ Could not announce in channel {}: {:?}", channel_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioHandle, Song};
    use serenity::model::id::UserId;

    fn song() -> Song {
        Song::new(AudioHandle::Ytdl("https://youtu.be/x".into()), "x", "https://youtu.be/x", UserId::new(1))
    }

    #[test]
    fn only_user_visible_events_are_announced() {
        let guild_id = GuildId::new(1);
        assert!(announcement(&SessionEvent::SongStarted { guild_id, song: song() }, false).is_some());
        assert!(announcement(&SessionEvent::SongFinished { guild_id, song: song() }, false).is_none());
        assert!(announcement(
            &SessionEvent::SkipTriggered { guild_id, song: song(), vote: SkipVote::Passed { votes: 3 } },
            false
        )
        .is_some());
        assert!(announcement(
            &SessionEvent::PlaybackError { guild_id, song: song(), error: "boom".into() },
            false
        )
        .is_some());
    }
}
