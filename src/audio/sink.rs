use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

use super::song::AudioHandle;
use crate::error::MusicResult;

/// How a track left the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// Reached the end of the stream, or was stopped on request.
    Finished,
    /// The transport failed mid-playback.
    Errored(String),
}

/// Live controls over the track currently streaming into a sink.
pub trait TrackControl: Send + Sync {
    fn set_volume(&self, volume: f32) -> MusicResult<()>;
    fn pause(&self) -> MusicResult<()>;
    fn resume(&self) -> MusicResult<()>;
    fn stop(&self) -> MusicResult<()>;
}

/// A track opened on a sink: its controls plus a one-shot end notification.
pub struct ActiveTrack {
    pub control: Arc<dyn TrackControl>,
    ended: oneshot::Receiver<PlaybackEnd>,
}

impl ActiveTrack {
    pub fn new(control: Arc<dyn TrackControl>, ended: oneshot::Receiver<PlaybackEnd>) -> Self {
        Self { control, ended }
    }

    /// Waits for the sink to report the end of the track.
    ///
    /// A sink that goes away without reporting counts as an error.
    pub async fn finished(&mut self) -> PlaybackEnd {
        (&mut self.ended)
            .await
            .unwrap_or_else(|_| PlaybackEnd::Errored("audio sink dropped the track".into()))
    }
}

/// Transport that streams songs into a voice connection.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Starts streaming `handle` at `volume` (0.0..=1.0).
    async fn open(&self, handle: &AudioHandle, volume: f32) -> MusicResult<ActiveTrack>;

    /// Stops everything and disconnects.
    async fn close(&self);
}
