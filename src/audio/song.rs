use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{fmt, time::Duration};

/// Locator for the audio behind a song.
///
/// The handle is resolved lazily by the sink when the song starts, so a song
/// can be replayed (loop mode) without holding a live stream while it waits
/// in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AudioHandle {
    /// A page URL streamed through yt-dlp.
    Ytdl(String),
    /// A direct media URL fetched over HTTP.
    Http(String),
}

impl AudioHandle {
    pub fn locator(&self) -> &str {
        match self {
            Self::Ytdl(url) | Self::Http(url) => url,
        }
    }
}

/// A resolved track ready to be queued.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    handle: AudioHandle,
    title: String,
    url: String,
    uploader: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    requested_by: UserId,
    requested_at: DateTime<Utc>,
}

impl Song {
    pub fn new(handle: AudioHandle, title: impl Into<String>, url: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            handle,
            title: title.into(),
            url: url.into(),
            uploader: None,
            duration: None,
            thumbnail: None,
            requested_by,
            requested_at: Utc::now(),
        }
    }

    // Getters
    pub fn handle(&self) -> &AudioHandle {
        &self.handle
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn uploader(&self) -> Option<&str> {
        self.uploader.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// `None` for live streams and sources that do not report a length.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.duration.map(|d| d.as_secs())
    }

    // Builders
    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.uploader {
            Some(uploader) => write!(f, "**{}** by **{}**", self.title, uploader),
            None => write!(f, "**{}**", self.title),
        }
    }
}
