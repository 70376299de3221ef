//! # Audio Module
//!
//! Per-guild voice playback: the song queue, skip votes, the session state
//! machine and its play loop, and the registry that owns one session per
//! guild.
//!
//! ## Architecture
//!
//! ### [`session`] - Voice Session
//! - One background play loop per guild, the only writer of "now playing"
//! - Pause/resume/volume/loop/skip/stop controls, safe to call from any task
//! - Broadcasts [`SessionEvent`]s for the chat front-end
//!
//! ### [`queue`] - Song Queue
//! - FIFO with 1-based removal, shuffle and paginated snapshots
//! - Wakes the play loop when a song arrives
//!
//! ### [`sink`] - Audio Sink
//! - Transport abstraction the loop streams into
//! - [`songbird_sink`] implements it over a songbird voice call
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rocku::audio::{registry::SessionRegistry, session::SessionSettings};
//! use serenity::all::GuildId;
//!
//! # async fn example() {
//! let registry = SessionRegistry::new(SessionSettings::default());
//! let session = registry.get_or_create(GuildId::new(123456789));
//!
//! session.toggle_loop();
//! session.set_volume(0.8).unwrap();
//! registry.leave(session.guild_id()).await;
//! # }
//! ```

pub mod queue;
pub mod registry;
pub mod session;
pub mod sink;
pub mod song;
pub mod songbird_sink;
pub mod votes;

pub use queue::{QueuePage, SongQueue};
pub use registry::SessionRegistry;
pub use session::{PlaybackStatus, SessionEvent, SessionSettings, VoiceSession};
pub use sink::{ActiveTrack, AudioSink, PlaybackEnd, TrackControl};
pub use song::{AudioHandle, Song};
pub use votes::{SkipVote, SkipVoteTracker};
