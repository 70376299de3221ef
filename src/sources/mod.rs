//! Track resolution: turning user queries and links into playable songs.

pub mod smart_source;
pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::time::Duration;
use tracing::{info, warn};

pub use smart_source::SmartSource;
pub use spotify::SpotifyClient;
pub use youtube::YtDlpResolver;

use crate::{
    audio::{Song, VoiceSession},
    error::{MusicError, MusicResult},
};

/// A playlist item that has not been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub title: String,
    /// What to hand to [`TrackResolver::resolve`] for this entry.
    pub query: String,
}

/// Common interface for everything that can produce songs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resolves a search string or URL into a single song.
    async fn resolve(&self, query: &str, requester: UserId) -> MusicResult<Song>;

    /// Lists up to `limit` entries of a playlist without resolving them.
    async fn resolve_playlist(&self, url: &str, limit: usize) -> MusicResult<Vec<PlaylistEntry>>;

    /// Whether `query` names a playlist rather than a single track.
    fn is_playlist(&self, query: &str) -> bool;
}

pub fn is_url(query: &str) -> bool {
    url::Url::parse(query)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

pub fn is_playlist_url(query: &str) -> bool {
    is_url(query) && query.contains("playlist")
}

/// Outcome of a bulk playlist import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub queued: usize,
    pub failed: Vec<(PlaylistEntry, MusicError)>,
    /// The session closed before every entry was processed.
    pub interrupted: bool,
}

/// Resolves playlist entries one at a time and queues each success.
///
/// Resolutions are spaced by `delay` to stay under the resolver's rate
/// limits. A failed entry is recorded and skipped; the import goes on.
pub async fn import_playlist(
    resolver: &dyn TrackResolver,
    session: &VoiceSession,
    entries: Vec<PlaylistEntry>,
    requester: UserId,
    delay: Duration,
) -> ImportReport {
    let mut report = ImportReport::default();
    let total = entries.len();

    for (i, entry) in entries.into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if session.is_closed() {
            report.interrupted = true;
            break;
        }

        match resolver.resolve(&entry.query, requester).await {
            Ok(song) => match session.enqueue(song) {
                Ok(_) => report.queued += 1,
                Err(_) => {
                    report.interrupted = true;
                    break;
                }
            },
            Err(e) => {
                warn!("⚠️ Could not queue {}: {}", entry.title, e);
                report.failed.push((entry, e));
            }
        }
    }

    info!(
        "📋 Playlist import for guild {}: {}/{} queued, {} failed",
        session.guild_id(),
        report.queued,
        total,
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{AudioHandle, SessionRegistry},
        error::ResolveErrorKind,
    };
    use pretty_assertions::assert_eq;
    use serenity::model::id::GuildId;

    fn entry(title: &str) -> PlaylistEntry {
        PlaylistEntry {
            title: title.to_string(),
            query: format!("https://youtu.be/{title}"),
        }
    }

    #[test]
    fn url_detection() {
        assert!(is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("ftp://example.com/song.mp3"));
        assert!(is_playlist_url("https://www.youtube.com/playlist?list=PL123"));
        assert!(is_playlist_url("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"));
        assert!(!is_playlist_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_playlist_url("lofi playlist"));
    }

    #[tokio::test]
    async fn import_skips_failures_and_keeps_order() {
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve()
            .withf(|_, requester| *requester == UserId::new(9))
            .times(3)
            .returning(|query, requester| {
                let title = query.trim_start_matches("https://youtu.be/");
                if title == "bad" {
                    return Err(MusicError::resolution(ResolveErrorKind::Restricted, "age gate"));
                }
                Ok(Song::new(AudioHandle::Ytdl(query.to_string()), title, query, requester))
            });

        let registry = SessionRegistry::default();
        let session = registry.get_or_create(GuildId::new(1));
        let entries = vec![entry("one"), entry("bad"), entry("two")];

        let report = import_playlist(&resolver, &session, entries, UserId::new(9), Duration::ZERO).await;

        assert_eq!(report.queued, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.title, "bad");
        assert!(!report.interrupted);

        let queued: Vec<String> = session
            .queue()
            .snapshot(1, 10)
            .items
            .iter()
            .map(|s| s.title().to_string())
            .collect();
        assert_eq!(queued, vec!["one", "two"]);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn import_stops_when_the_session_closes() {
        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().never();

        let registry = SessionRegistry::default();
        let session = registry.get_or_create(GuildId::new(2));
        registry.leave(GuildId::new(2)).await;

        let report = import_playlist(&resolver, &session, vec![entry("one")], UserId::new(1), Duration::ZERO).await;
        assert_eq!(report.queued, 0);
        assert!(report.interrupted);
    }
}
