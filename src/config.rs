use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serenity::model::id::ApplicationId;
use std::{num::NonZeroU64, str::FromStr, time::Duration};

use crate::audio::SessionSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub skip_votes_required: usize,
    pub queue_page_size: usize,

    // Resolución
    pub playlist_import_delay_ms: u64,
    pub max_playlist_size: usize,
    pub resolve_timeout_secs: u64,

    // APIs (Opcionales)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

/// Reads an optional variable, falling back to `default` when unset or blank.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {val}")),
        _ => Ok(default),
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID is not set")?
                .parse()
                .context("APPLICATION_ID must be a number")?,
            guild_id: env_opt("GUILD_ID").and_then(|s| s.parse().ok()),

            // Audio
            default_volume: env_or("DEFAULT_VOLUME", defaults.default_volume)?,
            skip_votes_required: env_or("SKIP_VOTES_REQUIRED", defaults.skip_votes_required)?,
            queue_page_size: env_or("QUEUE_PAGE_SIZE", defaults.queue_page_size)?,

            // Resolución
            playlist_import_delay_ms: env_or("PLAYLIST_IMPORT_DELAY_MS", defaults.playlist_import_delay_ms)?,
            max_playlist_size: env_or("MAX_PLAYLIST_SIZE", defaults.max_playlist_size)?,
            resolve_timeout_secs: env_or("RESOLVE_TIMEOUT_SECS", defaults.resolve_timeout_secs)?,

            // APIs
            spotify_client_id: env_opt("SPOTIFY_ID"),
            spotify_client_secret: env_opt("SPOTIFY_CLIENT_SECRET"),
        };

        config.validate()?;
        config.discord_application_id()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Skip votes, page size, playlist size and resolve timeout must be > 0
    /// - Spotify credentials come in pairs
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if self.skip_votes_required == 0 {
            anyhow::bail!("Skip votes required must be greater than 0");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    /// The application id for the gateway client; Discord ids are never 0.
    pub fn discord_application_id(&self) -> Result<ApplicationId> {
        NonZeroU64::new(self.application_id)
            .map(ApplicationId::from)
            .context("APPLICATION_ID must not be 0")
    }

    /// Per-session defaults handed to the session registry.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            default_volume: self.default_volume,
            skip_votes_required: self.skip_votes_required,
        }
    }

    pub fn playlist_import_delay(&self) -> Duration {
        Duration::from_millis(self.playlist_import_delay_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Both Spotify credentials, when configured.
    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        self.spotify_client_id.clone().zip(self.spotify_client_secret.clone())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the bot token and the Spotify secret.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, {} skip votes, {} songs per queue page\n  \
            Playlists: up to {} entries, {}ms between resolutions, {}s resolve timeout\n  \
            Spotify: {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0).round() as u32,
            self.skip_votes_required,
            self.queue_page_size,
            self.max_playlist_size,
            self.playlist_import_delay_ms,
            self.resolve_timeout_secs,
            if self.spotify_credentials().is_some() { "enabled" } else { "disabled" },
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Audio defaults
            default_volume: 0.5,
            skip_votes_required: 3,
            queue_page_size: 10,

            // Resolution defaults
            playlist_import_delay_ms: 5000,
            max_playlist_size: 100,
            resolve_timeout_secs: 60,

            spotify_client_id: None,
            spotify_client_secret: None,
        }
    }
}
