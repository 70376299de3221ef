use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use super::PlaylistEntry;
use crate::error::{MusicError, MusicResult, ResolveErrorKind};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";
const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyLink {
    Track,
    Playlist,
}

/// Splits an `open.spotify.com` link into its kind and id.
pub fn parse_link(link: &str) -> Option<(SpotifyLink, String)> {
    let url = Url::parse(link).ok()?;
    if url.host_str()? != "open.spotify.com" {
        return None;
    }

    // Localized links look like /intl-es/track/<id>
    let mut segments = url
        .path_segments()?
        .filter(|s| !s.is_empty() && !s.starts_with("intl-"));
    let kind = match segments.next()? {
        "track" => SpotifyLink::Track,
        "playlist" => SpotifyLink::Playlist,
        _ => return None,
    };
    let id = segments.next()?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((kind, id.to_string()))
}

pub fn is_spotify_url(query: &str) -> bool {
    parse_link(query).is_some()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

impl SpotifyTrack {
    /// Search text handed to the audio resolver: "name artist".
    fn into_entry(self) -> PlaylistEntry {
        let query = match self.artists.first() {
            Some(artist) => format!("{} {}", self.name, artist.name),
            None => self.name.clone(),
        };
        PlaylistEntry {
            title: self.name,
            query,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    // Local files and removed tracks come back as null
    track: Option<SpotifyTrack>,
}

/// Spotify Web API client using the client-credentials flow.
///
/// Spotify only supplies metadata; each track becomes a search query that
/// the yt-dlp resolver turns into audio.
pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String, http: reqwest::Client) -> Self {
        Self {
            client_id,
            client_secret,
            http,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> MusicResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {credentials}"))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response)?;
        let token: TokenResponse = response.json().await.map_err(network_error)?;

        // Renovar un minuto antes de que expire
        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        debug!("🔑 Spotify token refreshed, valid for {:?}", lifetime);
        Ok(token.access_token)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> MusicResult<T> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(network_error)?;
        check_status(response)?.json().await.map_err(network_error)
    }

    /// Looks up a track link and returns the search entry for it.
    pub async fn track(&self, link: &str) -> MusicResult<PlaylistEntry> {
        let id = match parse_link(link) {
            Some((SpotifyLink::Track, id)) => id,
            _ => return Err(MusicError::not_found(format!("`{link}` is not a Spotify track link"))),
        };
        let track: SpotifyTrack = self.get(&format!("{API_URL}/tracks/{id}")).await?;
        Ok(track.into_entry())
    }

    /// Lists up to `limit` tracks of a playlist link, following pagination.
    pub async fn playlist(&self, link: &str, limit: usize) -> MusicResult<Vec<PlaylistEntry>> {
        let id = match parse_link(link) {
            Some((SpotifyLink::Playlist, id)) => id,
            _ => return Err(MusicError::not_found(format!("`{link}` is not a Spotify playlist link"))),
        };

        let mut entries = Vec::new();
        let mut next = Some(format!(
            "{API_URL}/playlists/{id}/tracks?limit={}&fields=items(track(name,artists(name))),next",
            PAGE_SIZE.min(limit.max(1))
        ));

        while let Some(url) = next.take() {
            let page: PlaylistPage = self.get(&url).await?;
            entries.extend(page.items.into_iter().filter_map(|item| item.track).map(SpotifyTrack::into_entry));
            if entries.len() >= limit {
                entries.truncate(limit);
                break;
            }
            next = page.next;
        }

        if entries.is_empty() {
            return Err(MusicError::not_found(format!("Spotify playlist {id} is empty")));
        }
        info!("🎧 Spotify playlist {} listed {} tracks", id, entries.len());
        Ok(entries)
    }
}

fn network_error(e: reqwest::Error) -> MusicError {
    MusicError::resolution(ResolveErrorKind::NetworkFailure, format!("Spotify request failed: {e}"))
}

fn check_status(response: reqwest::Response) -> MusicResult<reqwest::Response> {
    let status = response.status();
    let kind = match status {
        s if s.is_success() => return Ok(response),
        StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => ResolveErrorKind::NotFound,
        StatusCode::FORBIDDEN => ResolveErrorKind::Restricted,
        _ => ResolveErrorKind::NetworkFailure,
    };
    Err(MusicError::resolution(kind, format!("Spotify answered {status}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_track_and_playlist_links() {
        assert_eq!(
            parse_link("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            Some((SpotifyLink::Track, "4uLU6hMCjMI75M1A2tKUQC".to_string()))
        );
        assert_eq!(
            parse_link("https://open.spotify.com/intl-es/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            Some((SpotifyLink::Playlist, "37i9dQZF1DXcBWIGoYBM5M".to_string()))
        );
    }

    #[test]
    fn rejects_other_links() {
        assert_eq!(parse_link("https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3"), None);
        assert_eq!(parse_link("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(parse_link("https://open.spotify.com/track/"), None);
        assert_eq!(parse_link("spotify track please"), None);
        assert!(!is_spotify_url("https://example.com/track/abc"));
    }

    #[test]
    fn tracks_become_name_artist_queries() {
        let track: SpotifyTrack = serde_json::from_str(
            r#"{"name":"Bohemian Rhapsody","artists":[{"name":"Queen"},{"name":"Other"}]}"#,
        )
        .unwrap();
        assert_eq!(
            track.into_entry(),
            PlaylistEntry {
                title: "Bohemian Rhapsody".into(),
                query: "Bohemian Rhapsody Queen".into(),
            }
        );
    }

    #[test]
    fn playlist_pages_skip_null_tracks() {
        let page: PlaylistPage = serde_json::from_str(
            r#"{"items":[{"track":{"name":"A","artists":[{"name":"X"}]}},{"track":null}],"next":null}"#,
        )
        .unwrap();
        let entries: Vec<PlaylistEntry> = page
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .map(SpotifyTrack::into_entry)
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].query, "A X");
        assert!(page.next.is_none());
    }
}
