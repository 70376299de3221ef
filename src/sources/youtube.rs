use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::{sync::LazyLock, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{is_playlist_url, is_url, PlaylistEntry, TrackResolver};
use crate::{
    audio::{AudioHandle, Song},
    error::{MusicError, MusicResult, ResolveErrorKind},
};

static RESTRICTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(sign in to confirm your age|age[- ]restricted|inappropriate for some users|not available in your country|blocked it in your country|geo[- ]?restrict|private video|members[- ]only|requires payment)",
    )
    .expect("static regex")
});

static NETWORK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(unable to download (webpage|api page|json metadata)|urlopen error|timed out|connection (reset|refused|aborted)|temporary failure in name resolution|name or service not known|network is unreachable|http error 5\d\d|http error 429)",
    )
    .expect("static regex")
});

/// Maps yt-dlp stderr to the failure category shown to users.
pub fn classify_failure(stderr: &str) -> ResolveErrorKind {
    if RESTRICTED.is_match(stderr) {
        ResolveErrorKind::Restricted
    } else if NETWORK.is_match(stderr) {
        ResolveErrorKind::NetworkFailure
    } else {
        ResolveErrorKind::NotFound
    }
}

/// Last `ERROR:` line of yt-dlp's stderr, or the whole thing trimmed.
fn failure_reason(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| stderr.trim().to_string())
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    webpage_url: String,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    is_live: Option<bool>,
}

impl YtDlpInfo {
    fn into_song(self, requester: UserId) -> Song {
        let mut song = Song::new(
            AudioHandle::Ytdl(self.webpage_url.clone()),
            self.title,
            self.webpage_url,
            requester,
        );
        if let Some(uploader) = self.uploader.or(self.channel) {
            song = song.with_uploader(uploader);
        }
        if let Some(secs) = self.duration.filter(|d| *d > 0.0 && !self.is_live.unwrap_or(false)) {
            song = song.with_duration(Duration::from_secs_f64(secs));
        }
        if let Some(thumbnail) = self.thumbnail {
            song = song.with_thumbnail(thumbnail);
        }
        song
    }
}

/// Entrada de `--flat-playlist`
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: String,
    title: Option<String>,
    url: Option<String>,
}

impl From<FlatEntry> for PlaylistEntry {
    fn from(entry: FlatEntry) -> Self {
        let query = entry
            .url
            .filter(|u| is_url(u))
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", entry.id));
        Self {
            title: entry.title.unwrap_or(entry.id),
            query,
        }
    }
}

/// Resolves searches and links through the `yt-dlp` binary.
pub struct YtDlpResolver {
    program: String,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self::with_program("yt-dlp")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Checks that yt-dlp can be executed and returns its version.
    pub async fn verify(&self) -> MusicResult<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error(&self.program, e))?;

        if !output.status.success() {
            return Err(MusicError::resolution(
                ResolveErrorKind::NetworkFailure,
                format!("{} --version exited with {}", self.program, output.status),
            ));
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("✅ yt-dlp version: {}", version);
        Ok(version)
    }

    /// Runs yt-dlp and returns stdout, classifying failures from stderr.
    async fn run(&self, args: &[&str]) -> MusicResult<String> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| MusicError::resolution(ResolveErrorKind::NetworkFailure, e.to_string()))?;

        // Un timeout del llamador suelta este future: el proceso muere con él
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error(&self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let kind = classify_failure(&stderr);
            let reason = failure_reason(&stderr);
            warn!("❌ yt-dlp failed ({}): {}", kind, reason);
            return Err(MusicError::resolution(kind, reason));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> MusicError {
    MusicError::resolution(
        ResolveErrorKind::NetworkFailure,
        format!("could not run {program}: {e}"),
    )
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requester: UserId) -> MusicResult<Song> {
        let target = if is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        };
        info!("🔍 Resolving: {}", query);

        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                target.as_str(),
            ])
            .await?;

        let info = stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .find_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok())
            .ok_or_else(|| MusicError::not_found(format!("nothing matched `{query}`")))?;

        let song = info.into_song(requester);
        debug!("✅ Resolved {} -> {}", query, song.title());
        Ok(song)
    }

    async fn resolve_playlist(&self, url: &str, limit: usize) -> MusicResult<Vec<PlaylistEntry>> {
        let end = limit.max(1).to_string();
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-json",
                "--no-warnings",
                "--playlist-end",
                end.as_str(),
                url,
            ])
            .await?;

        let entries: Vec<PlaylistEntry> = stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<FlatEntry>(line).ok())
            .map(PlaylistEntry::from)
            .take(limit)
            .collect();

        if entries.is_empty() {
            return Err(MusicError::not_found(format!("playlist `{url}` has no playable entries")));
        }
        info!("📋 Playlist {} listed {} entries", url, entries.len());
        Ok(entries)
    }

    fn is_playlist(&self, query: &str) -> bool {
        is_playlist_url(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_restricted_videos() {
        let stderr = "ERROR: [youtube] abc: Sign in to confirm your age. This video may be inappropriate for some users.";
        assert_eq!(classify_failure(stderr), ResolveErrorKind::Restricted);
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: This video is not available in your country"),
            ResolveErrorKind::Restricted
        );
        assert_eq!(classify_failure("ERROR: [youtube] abc: Private video"), ResolveErrorKind::Restricted);
    }

    #[test]
    fn classifies_network_failures() {
        let stderr = "ERROR: [youtube] abc: Unable to download webpage: <urlopen error [Errno -3] Temporary failure in name resolution>";
        assert_eq!(classify_failure(stderr), ResolveErrorKind::NetworkFailure);
        assert_eq!(classify_failure("ERROR: HTTP Error 503: Service Unavailable"), ResolveErrorKind::NetworkFailure);
    }

    #[test]
    fn unknown_failures_are_not_found() {
        assert_eq!(classify_failure("ERROR: [youtube] abc: Video unavailable"), ResolveErrorKind::NotFound);
        assert_eq!(classify_failure(""), ResolveErrorKind::NotFound);
    }

    #[test]
    fn failure_reason_prefers_the_error_line() {
        let stderr = "WARNING: something\nERROR: [youtube] abc: Private video\n";
        assert_eq!(failure_reason(stderr), "[youtube] abc: Private video");
        assert_eq!(failure_reason("  boom \n"), "boom");
    }

    #[test]
    fn info_becomes_a_song() {
        let json = r#"{"title":"Song","webpage_url":"https://www.youtube.com/watch?v=x","duration":212.0,"channel":"Chan","thumbnail":"https://i.ytimg.com/x.jpg"}"#;
        let info: YtDlpInfo = serde_json::from_str(json).unwrap();
        let song = info.into_song(UserId::new(5));

        assert_eq!(song.title(), "Song");
        assert_eq!(song.uploader(), Some("Chan"));
        assert_eq!(song.duration(), Some(Duration::from_secs(212)));
        assert_eq!(song.requested_by(), UserId::new(5));
        assert_eq!(song.handle(), &AudioHandle::Ytdl("https://www.youtube.com/watch?v=x".into()));
    }

    #[test]
    fn live_streams_have_no_duration() {
        let json = r#"{"title":"Live","webpage_url":"https://www.youtube.com/watch?v=l","duration":5.0,"is_live":true}"#;
        let info: YtDlpInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.into_song(UserId::new(1)).duration(), None);
    }

    #[test]
    fn flat_entries_fall_back_to_watch_urls() {
        let entry: FlatEntry = serde_json::from_str(r#"{"id":"abc123","title":null,"url":"abc123"}"#).unwrap();
        assert_eq!(
            PlaylistEntry::from(entry),
            PlaylistEntry {
                title: "abc123".into(),
                query: "https://www.youtube.com/watch?v=abc123".into(),
            }
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_network_failure() {
        let resolver = YtDlpResolver::with_program("definitely-not-yt-dlp-binary");
        let err = resolver.resolve("anything", UserId::new(1)).await.unwrap_err();
        assert!(matches!(
            err,
            MusicError::Resolution { kind: ResolveErrorKind::NetworkFailure, .. }
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_lookups_kill_the_process() {
        let marker = std::env::temp_dir().join(format!("rocku-ytdlp-{}", std::process::id()));
        let _ = std::fs::remove_file(&marker);
        let script = format!("sleep 1 && touch {}", marker.display());

        let resolver = YtDlpResolver::with_program("sh");
        let args = ["-c", script.as_str()];
        let run = resolver.run(&args);
        assert!(tokio::time::timeout(Duration::from_millis(200), run).await.is_err());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "yt-dlp kept running after its lookup was dropped");
        assert_eq!(resolver.rate_limiter.available_permits(), 3);
    }
}
