//! Discord jukebox: per-guild playback sessions fed from YouTube urls.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod ui;
