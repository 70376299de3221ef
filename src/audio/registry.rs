use dashmap::DashMap;
use serenity::model::id::GuildId;
use tokio::sync::broadcast;
use tracing::info;

use super::session::{SessionEvent, SessionSettings, VoiceSession};

const EVENT_BUFFER: usize = 256;

/// Owns the voice session of every guild the bot is playing in.
///
/// Sessions are created lazily and only removed by an explicit leave; a guild
/// that never leaves keeps its session for the life of the process.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, VoiceSession>,
    settings: SessionSettings,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            sessions: DashMap::new(),
            settings,
            events,
        }
    }

    /// Returns the guild's session, starting one if needed.
    pub fn get_or_create(&self, guild_id: GuildId) -> VoiceSession {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| VoiceSession::start(guild_id, self.settings, self.events.clone()))
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<VoiceSession> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Detaches the session from the registry without tearing it down.
    pub fn remove(&self, guild_id: GuildId) -> Option<VoiceSession> {
        self.sessions.remove(&guild_id).map(|(_, session)| session)
    }

    /// Removes the guild's session and tears it down. Returns `false` if the
    /// guild had no session.
    pub async fn leave(&self, guild_id: GuildId) -> bool {
        match self.remove(guild_id) {
            Some(session) => {
                session.leave().await;
                true
            }
            None => false,
        }
    }

    /// Leaves every guild; used on process shutdown.
    pub async fn shutdown(&self) {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let sessions: Vec<VoiceSession> = guilds.into_iter().filter_map(|g| self.remove(g)).collect();
        let count = sessions.len();

        futures::future::join_all(sessions.iter().map(|session| session.leave())).await;
        info!("🛑 Closed {} voice sessions", count);
    }

    /// Events from every session's play loop.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}
