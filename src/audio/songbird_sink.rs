use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::GuildId;
use songbird::{
    events::CoreEvent,
    input::{HttpRequest, Input, YoutubeDl},
    tracks::{ControlError, PlayMode, Track, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use super::{
    sink::{ActiveTrack, AudioSink, PlaybackEnd, TrackControl},
    song::AudioHandle,
};
use crate::error::{MusicError, MusicResult};

/// Audio sink backed by a songbird voice call.
pub struct SongbirdSink {
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
}

impl SongbirdSink {
    /// Wraps a joined call and registers the connection-level handlers.
    pub async fn attach(guild_id: GuildId, call: Arc<Mutex<Call>>, http: reqwest::Client) -> Self {
        {
            let mut handler = call.lock().await;
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                DisconnectLogger { guild_id },
            );
            handler.add_global_event(
                Event::Core(CoreEvent::DriverReconnect),
                ReconnectLogger { guild_id },
            );
        }

        Self { guild_id, call, http }
    }

    fn input_for(&self, handle: &AudioHandle) -> Input {
        match handle {
            AudioHandle::Ytdl(url) => YoutubeDl::new(self.http.clone(), url.clone()).into(),
            AudioHandle::Http(url) => HttpRequest::new(self.http.clone(), url.clone()).into(),
        }
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn open(&self, handle: &AudioHandle, volume: f32) -> MusicResult<ActiveTrack> {
        let input = self.input_for(handle);

        let track = {
            let mut call = self.call.lock().await;
            call.play_only(Track::from(input).volume(volume))
        };

        let (tx, rx) = oneshot::channel();
        let notifier = TrackEndNotifier {
            guild_id: self.guild_id,
            ended: Arc::new(SyncMutex::new(Some(tx))),
        };

        track
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .map_err(sink_error)?;
        track
            .add_event(Event::Track(TrackEvent::Error), notifier)
            .map_err(sink_error)?;

        debug!("🔊 Track opened in guild {}: {}", self.guild_id, handle.locator());
        Ok(ActiveTrack::new(Arc::new(SongbirdTrack(track)), rx))
    }

    async fn close(&self) {
        let mut call = self.call.lock().await;
        call.stop();
        if let Err(e) = call.leave().await {
            warn!("⚠️ Error leaving voice channel in guild {}: {:?}", self.guild_id, e);
        }
        info!("👋 Voice connection closed in guild {}", self.guild_id);
    }
}

struct SongbirdTrack(TrackHandle);

impl TrackControl for SongbirdTrack {
    fn set_volume(&self, volume: f32) -> MusicResult<()> {
        self.0.set_volume(volume).map_err(sink_error)
    }

    fn pause(&self) -> MusicResult<()> {
        self.0.pause().map_err(sink_error)
    }

    fn resume(&self) -> MusicResult<()> {
        self.0.play().map_err(sink_error)
    }

    fn stop(&self) -> MusicResult<()> {
        self.0.stop().map_err(sink_error)
    }
}

fn sink_error(e: ControlError) -> MusicError {
    MusicError::Sink(e.to_string())
}

/// Forwards the first end or error event of a track to the play loop.
#[derive(Clone)]
struct TrackEndNotifier {
    guild_id: GuildId,
    ended: Arc<SyncMutex<Option<oneshot::Sender<PlaybackEnd>>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = match ctx {
            EventContext::Track(tracks) => tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(PlaybackEnd::Errored(format!("{:?}", e))),
                    _ => None,
                })
                .unwrap_or(PlaybackEnd::Finished),
            _ => PlaybackEnd::Finished,
        };

        debug!("🎵 Track ended in guild {}: {:?}", self.guild_id, outcome);
        if let Some(tx) = self.ended.lock().take() {
            let _ = tx.send(outcome);
        }

        Some(Event::Cancel)
    }
}

struct DisconnectLogger {
    guild_id: GuildId,
}

#[async_trait]
impl VoiceEventHandler for DisconnectLogger {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        warn!("🔌 Voice driver disconnected in guild {}", self.guild_id);
        None
    }
}

struct ReconnectLogger {
    guild_id: GuildId,
}

#[async_trait]
impl VoiceEventHandler for ReconnectLogger {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        info!("🔄 Voice driver reconnected in guild {}", self.guild_id);
        None
    }
}
