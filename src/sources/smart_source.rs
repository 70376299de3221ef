use async_trait::async_trait;
use serenity::model::id::UserId;
use std::{future::Future, time::Duration};
use tokio::time::timeout;
use tracing::{debug, info};
use url::Url;

use super::{
    is_playlist_url,
    spotify::{self, SpotifyClient},
    PlaylistEntry, TrackResolver, YtDlpResolver,
};
use crate::{
    audio::{AudioHandle, Song},
    error::{MusicError, MusicResult, ResolveErrorKind},
};

const DIRECT_AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "opus", "flac", "wav", "m4a", "aac", "webm"];

/// A link straight to an audio file, streamed over HTTP without yt-dlp.
pub fn direct_audio_url(query: &str) -> Option<Url> {
    let url = Url::parse(query).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let extension = url.path().rsplit_once('.')?.1.to_ascii_lowercase();
    DIRECT_AUDIO_EXTENSIONS.contains(&extension.as_str()).then_some(url)
}

fn direct_song(url: Url, requester: UserId) -> Song {
    let title = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("audio")
        .to_string();
    Song::new(AudioHandle::Http(url.to_string()), title, url.to_string(), requester)
}

/// Routes each query to the source that understands it.
///
/// - Spotify links: metadata from the Web API, audio searched through yt-dlp
/// - Direct audio file links: streamed as-is
/// - Everything else: yt-dlp (links and plain-text searches)
pub struct SmartSource {
    youtube: YtDlpResolver,
    spotify: Option<SpotifyClient>,
    timeout: Duration,
}

impl SmartSource {
    pub fn new(youtube: YtDlpResolver, spotify: Option<SpotifyClient>, timeout: Duration) -> Self {
        if spotify.is_none() {
            info!("ℹ️ Spotify credentials not set; Spotify links are disabled");
        }
        Self {
            youtube,
            spotify,
            timeout,
        }
    }

    pub fn youtube(&self) -> &YtDlpResolver {
        &self.youtube
    }

    fn spotify(&self) -> MusicResult<&SpotifyClient> {
        self.spotify.as_ref().ok_or_else(|| {
            MusicError::resolution(
                ResolveErrorKind::NotFound,
                "Spotify links are not enabled on this bot",
            )
        })
    }

    async fn limited<T>(&self, what: &str, fut: impl Future<Output = MusicResult<T>>) -> MusicResult<T> {
        timeout(self.timeout, fut).await.map_err(|_| {
            MusicError::resolution(
                ResolveErrorKind::NetworkFailure,
                format!("{what} timed out after {:?}", self.timeout),
            )
        })?
    }
}

#[async_trait]
impl TrackResolver for SmartSource {
    async fn resolve(&self, query: &str, requester: UserId) -> MusicResult<Song> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::InvalidArgument("empty search".into()));
        }

        if spotify::is_spotify_url(query) {
            let entry = self.limited("Spotify lookup", self.spotify()?.track(query)).await?;
            debug!("🎧 Spotify track {} -> search `{}`", query, entry.query);
            return self
                .limited("yt-dlp search", self.youtube.resolve(&entry.query, requester))
                .await;
        }

        if let Some(url) = direct_audio_url(query) {
            debug!("🔗 Direct audio link: {}", url);
            return Ok(direct_song(url, requester));
        }

        self.limited("yt-dlp lookup", self.youtube.resolve(query, requester))
            .await
    }

    async fn resolve_playlist(&self, url: &str, limit: usize) -> MusicResult<Vec<PlaylistEntry>> {
        if spotify::is_spotify_url(url) {
            return self
                .limited("Spotify playlist", self.spotify()?.playlist(url, limit))
                .await;
        }
        self.limited("yt-dlp playlist", self.youtube.resolve_playlist(url, limit))
            .await
    }

    fn is_playlist(&self, query: &str) -> bool {
        is_playlist_url(query.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn offline_source() -> SmartSource {
        SmartSource::new(
            YtDlpResolver::with_program("definitely-not-yt-dlp-binary"),
            None,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn detects_direct_audio_links() {
        assert!(direct_audio_url("https://cdn.example.com/music/track.MP3").is_some());
        assert!(direct_audio_url("https://cdn.example.com/stream.ogg?token=1").is_some());
        assert!(direct_audio_url("https://www.youtube.com/watch?v=abc").is_none());
        assert!(direct_audio_url("file:///tmp/song.mp3").is_none());
        assert!(direct_audio_url("song.mp3").is_none());
    }

    #[tokio::test]
    async fn direct_links_skip_yt_dlp() {
        let song = offline_source()
            .resolve("https://cdn.example.com/music/track.mp3", UserId::new(3))
            .await
            .unwrap();
        assert_eq!(song.title(), "track.mp3");
        assert_eq!(song.handle(), &AudioHandle::Http("https://cdn.example.com/music/track.mp3".into()));
    }

    #[tokio::test]
    async fn spotify_links_need_credentials() {
        let err = offline_source()
            .resolve("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC", UserId::new(3))
            .await
            .unwrap_err();
        assert!(matches!(err, MusicError::Resolution { kind: ResolveErrorKind::NotFound, .. }));
    }

    #[tokio::test]
    async fn blank_queries_are_rejected() {
        let err = offline_source().resolve("   ", UserId::new(3)).await.unwrap_err();
        assert!(matches!(err, MusicError::InvalidArgument(_)));
    }

    #[test]
    fn playlist_detection_covers_both_services() {
        let source = offline_source();
        assert!(source.is_playlist("https://www.youtube.com/playlist?list=PL123"));
        assert!(source.is_playlist("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"));
        assert!(!source.is_playlist("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"));
    }
}
