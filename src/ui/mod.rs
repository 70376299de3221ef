//! Discord message rendering: embeds and user-facing wording.

pub mod embeds;
