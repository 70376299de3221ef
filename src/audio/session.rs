use parking_lot::Mutex;
use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use tokio::{
    sync::{broadcast, Notify},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    queue::SongQueue,
    sink::{AudioSink, PlaybackEnd, TrackControl},
    song::Song,
    votes::{SkipVote, SkipVoteTracker, DEFAULT_REQUIRED_VOTES},
};
use crate::error::{MusicError, MusicResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Paused,
    /// Terminal: the session left its voice channel.
    Stopped,
}

/// Per-session defaults handed out by the registry.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub default_volume: f32,
    pub skip_votes_required: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            skip_votes_required: DEFAULT_REQUIRED_VOTES,
        }
    }
}

/// Notifications from the play loop to whoever renders them.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SongStarted { guild_id: GuildId, song: Song },
    SongFinished { guild_id: GuildId, song: Song },
    SkipTriggered { guild_id: GuildId, song: Song, vote: SkipVote },
    PlaybackError { guild_id: GuildId, song: Song, error: String },
}

impl SessionEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::SongStarted { guild_id, .. }
            | Self::SongFinished { guild_id, .. }
            | Self::SkipTriggered { guild_id, .. }
            | Self::PlaybackError { guild_id, .. } => *guild_id,
        }
    }
}

/// Why the current track is being halted from outside the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndIntent {
    Skip,
    Stop,
}

struct SessionState {
    status: PlaybackStatus,
    volume: f32,
    loop_current: bool,
    current: Option<Song>,
    votes: SkipVoteTracker,
    sink: Option<Arc<dyn AudioSink>>,
    control: Option<Arc<dyn TrackControl>>,
    intent: Option<EndIntent>,
    /// Bumped by every `stop_all`, so a song dequeued just before a stop is
    /// not started after it.
    stop_generation: u64,
}

struct SessionInner {
    guild_id: GuildId,
    // Lock order: `state`, then `queue`.
    state: Mutex<SessionState>,
    queue: SongQueue,
    sink_attached: Notify,
    cancel: CancellationToken,
    events: broadcast::Sender<SessionEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Voice playback state machine for one guild.
///
/// Cloning gives another handle to the same session. The background play loop
/// is spawned on creation and runs until [`VoiceSession::leave`].
#[derive(Clone)]
pub struct VoiceSession {
    inner: Arc<SessionInner>,
}

impl VoiceSession {
    /// Creates the session and spawns its play loop. Must be called from
    /// within a tokio runtime.
    pub fn start(
        guild_id: GuildId,
        settings: SessionSettings,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let inner = Arc::new(SessionInner {
            guild_id,
            state: Mutex::new(SessionState {
                status: PlaybackStatus::Idle,
                volume: settings.default_volume.clamp(0.0, 1.0),
                loop_current: false,
                current: None,
                votes: SkipVoteTracker::new(settings.skip_votes_required),
                sink: None,
                control: None,
                intent: None,
                stop_generation: 0,
            }),
            queue: SongQueue::new(),
            sink_attached: Notify::new(),
            cancel: CancellationToken::new(),
            events,
            task: Mutex::new(None),
        });

        let task = tokio::spawn(play_loop(inner.clone()));
        *inner.task.lock() = Some(task);

        info!("🎛️ Voice session created for guild {}", guild_id);
        Self { inner }
    }

    pub fn guild_id(&self) -> GuildId {
        self.inner.guild_id
    }

    /// Gives the session the voice connection it streams into.
    pub fn attach_sink(&self, sink: Arc<dyn AudioSink>) {
        self.inner.state.lock().sink = Some(sink);
        self.inner.sink_attached.notify_one();
        debug!("🔗 Audio sink attached in guild {}", self.inner.guild_id);
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().sink.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Queues a song and returns its 1-based position.
    pub fn enqueue(&self, song: Song) -> MusicResult<usize> {
        if self.is_closed() {
            return Err(MusicError::SessionClosed);
        }
        self.inner.queue.enqueue(song);
        Ok(self.inner.queue.len())
    }

    pub fn queue(&self) -> &SongQueue {
        &self.inner.queue
    }

    pub fn status(&self) -> PlaybackStatus {
        self.inner.state.lock().status
    }

    pub fn current(&self) -> Option<Song> {
        self.inner.state.lock().current.clone()
    }

    pub fn volume(&self) -> f32 {
        self.inner.state.lock().volume
    }

    pub fn is_looping(&self) -> bool {
        self.inner.state.lock().loop_current
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Pauses the current song. Returns `false` if nothing was playing.
    pub fn pause(&self) -> MusicResult<bool> {
        let mut state = self.inner.state.lock();
        if state.sink.is_none() {
            return Err(MusicError::NotConnected);
        }
        if state.status != PlaybackStatus::Playing {
            return Ok(false);
        }
        if let Some(control) = &state.control {
            control.pause()?;
        }
        state.status = PlaybackStatus::Paused;
        info!("⏸️ Paused in guild {}", self.inner.guild_id);
        Ok(true)
    }

    /// Resumes a paused song. Returns `false` if nothing was paused.
    pub fn resume(&self) -> MusicResult<bool> {
        let mut state = self.inner.state.lock();
        if state.sink.is_none() {
            return Err(MusicError::NotConnected);
        }
        if state.status != PlaybackStatus::Paused {
            return Ok(false);
        }
        if let Some(control) = &state.control {
            control.resume()?;
        }
        state.status = PlaybackStatus::Playing;
        info!("▶️ Resumed in guild {}", self.inner.guild_id);
        Ok(true)
    }

    /// Sets the volume (0.0..=1.0), applying it live to the open track.
    pub fn set_volume(&self, volume: f32) -> MusicResult<()> {
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(MusicError::InvalidArgument(format!(
                "volume must be between 0.0 and 1.0, got {volume}"
            )));
        }

        let mut state = self.inner.state.lock();
        state.volume = volume;
        if let Some(control) = &state.control {
            if let Err(e) = control.set_volume(volume) {
                warn!("⚠️ Could not apply volume live in guild {}: {}", self.inner.guild_id, e);
            }
        }
        info!("🔊 Volume set to {}% in guild {}", (volume * 100.0).round() as u32, self.inner.guild_id);
        Ok(())
    }

    /// Flips loop mode for the current song and returns the new value.
    pub fn toggle_loop(&self) -> bool {
        let mut state = self.inner.state.lock();
        state.loop_current = !state.loop_current;
        if state.loop_current {
            info!("🔂 Loop enabled in guild {}", self.inner.guild_id);
        } else {
            info!("➡️ Loop disabled in guild {}", self.inner.guild_id);
        }
        state.loop_current
    }

    /// Clears the queue and halts the current song. The session stays alive.
    /// Returns how many queued songs were dropped.
    pub fn stop_all(&self) -> MusicResult<usize> {
        let mut state = self.inner.state.lock();
        let cleared = self.inner.queue.clear();
        state.stop_generation += 1;
        state.votes.reset();

        if let Some(control) = state.control.clone() {
            // Ya se está deteniendo: no volver a llamar a stop()
            let already_ending = state.intent.replace(EndIntent::Stop).is_some();
            if !already_ending {
                if let Err(e) = control.stop() {
                    warn!("⚠️ Could not stop track in guild {}: {}", self.inner.guild_id, e);
                }
            }
        }

        info!("⏹️ Playback stopped in guild {}", self.inner.guild_id);
        Ok(cleared)
    }

    /// Casts a skip vote for the current song.
    ///
    /// Returns `None` when nothing is playing, or when the current song is
    /// already being skipped or stopped. When the vote passes, the song is
    /// halted and the loop advances to the next one.
    pub fn skip(&self, voter: UserId) -> MusicResult<Option<SkipVote>> {
        let mut state = self.inner.state.lock();
        if state.sink.is_none() {
            return Err(MusicError::NotConnected);
        }
        let Some(song) = state.current.clone() else {
            return Ok(None);
        };
        if state.intent.is_some() {
            debug!("🗳️ {} is already ending in guild {}", song.title(), self.inner.guild_id);
            return Ok(None);
        }

        let vote = state.votes.vote(voter, song.requested_by());
        if !vote.triggers_skip() {
            debug!("🗳️ Skip vote in guild {}: {:?}", self.inner.guild_id, vote);
            return Ok(Some(vote));
        }

        if let Some(control) = state.control.clone() {
            state.intent = Some(EndIntent::Skip);
            if let Err(e) = control.stop() {
                state.intent = None;
                return Err(e);
            }
        }
        drop(state);

        info!("⏭️ Skipping {} in guild {}", song.title(), self.inner.guild_id);
        self.inner.emit(SessionEvent::SkipTriggered {
            guild_id: self.inner.guild_id,
            song,
            vote,
        });
        Ok(Some(vote))
    }

    /// Tears the session down: cancels the play loop and waits for it, clears
    /// the queue and closes the voice connection.
    pub async fn leave(&self) {
        self.inner.cancel.cancel();

        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("⚠️ Play loop for guild {} ended abnormally: {:?}", self.inner.guild_id, e);
            }
        }

        let sink = {
            let mut state = self.inner.state.lock();
            state.status = PlaybackStatus::Stopped;
            state.current = None;
            state.control = None;
            state.sink.take()
        };
        self.inner.queue.clear();

        if let Some(sink) = sink {
            sink.close().await;
        }
        info!("👋 Voice session closed for guild {}", self.inner.guild_id);
    }
}

impl SessionInner {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn wait_for_sink(&self) -> Option<Arc<dyn AudioSink>> {
        loop {
            let notified = self.sink_attached.notified();
            let sink = self.state.lock().sink.clone();
            if sink.is_some() {
                return sink;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = notified => {}
            }
        }
    }

    /// Takes the next song together with the stop generation it was taken in.
    async fn next_song(&self) -> Option<(Song, u64)> {
        loop {
            let notified = self.queue.notified();
            let next = {
                let state = self.state.lock();
                self.queue
                    .dequeue_front()
                    .map(|song| (song, state.stop_generation))
            };
            if next.is_some() {
                return next;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = notified => {}
            }
        }
    }

    /// Plays one song to completion. Returns `false` once the session is
    /// cancelled.
    async fn play_song(&self, sink: Arc<dyn AudioSink>, song: Song, generation: u64) -> bool {
        let volume = self.state.lock().volume;

        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            opened = sink.open(song.handle(), volume) => opened,
        };
        let mut track = match opened {
            Ok(track) => track,
            Err(e) => {
                warn!("❌ Could not start {} in guild {}: {}", song.title(), self.guild_id, e);
                self.emit(SessionEvent::PlaybackError {
                    guild_id: self.guild_id,
                    song,
                    error: e.to_string(),
                });
                return true;
            }
        };

        let stopped_meanwhile = {
            let mut state = self.state.lock();
            if state.stop_generation != generation {
                true
            } else {
                state.status = PlaybackStatus::Playing;
                state.current = Some(song.clone());
                state.control = Some(track.control.clone());
                state.intent = None;
                state.votes.reset();
                false
            }
        };
        if stopped_meanwhile {
            debug!("⏹️ Dropping {} dequeued before a stop", song.title());
            let _ = track.control.stop();
            self.emit(SessionEvent::SongFinished {
                guild_id: self.guild_id,
                song,
            });
            return true;
        }

        info!("🎵 Now playing in guild {}: {}", self.guild_id, song.title());
        self.emit(SessionEvent::SongStarted {
            guild_id: self.guild_id,
            song: song.clone(),
        });

        let end = tokio::select! {
            _ = self.cancel.cancelled() => {
                let _ = track.control.stop();
                return false;
            }
            end = track.finished() => end,
        };

        let intent = {
            let mut state = self.state.lock();
            state.status = PlaybackStatus::Idle;
            state.current = None;
            state.control = None;
            state.votes.reset();
            let intent = state.intent.take();
            if end == PlaybackEnd::Finished && intent.is_none() && state.loop_current {
                self.queue.push_front(song.clone());
            }
            intent
        };

        match end {
            PlaybackEnd::Errored(error) => {
                warn!("❌ Playback failed in guild {} for {}: {}", self.guild_id, song.title(), error);
                self.emit(SessionEvent::PlaybackError {
                    guild_id: self.guild_id,
                    song,
                    error,
                });
            }
            PlaybackEnd::Finished => {
                match intent {
                    Some(EndIntent::Stop) => debug!("⏹️ {} stopped", song.title()),
                    Some(EndIntent::Skip) => debug!("⏭️ {} skipped", song.title()),
                    None => debug!("✅ {} finished", song.title()),
                }
                self.emit(SessionEvent::SongFinished {
                    guild_id: self.guild_id,
                    song,
                });
            }
        }

        true
    }

    fn shut_down(&self) {
        {
            let mut state = self.state.lock();
            state.status = PlaybackStatus::Stopped;
            state.current = None;
            state.control = None;
            state.votes.reset();
        }
        self.queue.clear();
    }
}

async fn play_loop(inner: Arc<SessionInner>) {
    debug!("▶️ Play loop started for guild {}", inner.guild_id);

    loop {
        let Some(sink) = inner.wait_for_sink().await else {
            break;
        };
        let Some((song, generation)) = inner.next_song().await else {
            break;
        };
        if !inner.play_song(sink, song, generation).await {
            break;
        }
    }

    inner.shut_down();
    debug!("⏹️ Play loop exited for guild {}", inner.guild_id);
}
