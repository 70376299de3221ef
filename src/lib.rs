//! # ROCKU
//!
//! Discord music bot built around a per-guild voice playback scheduler.
//!
//! - [`audio`]: queue, skip votes, voice sessions and their registry
//! - [`sources`]: turning searches and links into playable songs
//! - [`bot`]: the serenity slash-command front-end
//! - [`ui`]: embeds shown in Discord

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod ui;
