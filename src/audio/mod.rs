//! # Audio Module
//!
//! Per-guild playback engine for the jukebox.
//!
//! ## Architecture
//!
//! ### [`player`] - Command Facade
//! - `play`/`playlist` entry points used by the slash commands
//! - Creates sessions on demand and joins them to a voice channel
//!
//! ### [`registry`] - Session Registry
//! - Concurrent map from guild id to live session
//! - Stopped sessions remove themselves
//!
//! ### [`session`] - Playback Session
//! - `NotStarted -> Running -> Stopped` state machine
//! - One event loop task per guild for track completions and idle timeout
//! - Playlist entries are queued in the background as they resolve
//!
//! ### [`queue`] - Song Queue
//! - FIFO with unique titles and push-to-front
//!
//! ### [`retry`] - Retry Executor
//! - Bounded retries with capped exponential backoff
//!
//! ### [`sink`] / [`songbird_sink`] - Audio Output
//! - Sink abstraction and its Songbird voice implementation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use jukebox::{
//!     audio::{player::AudioPlayer, sink::AudioSink},
//!     config::Config,
//!     sources::{ResolverAdapter, YtDlpSource},
//! };
//! use std::sync::Arc;
//!
//! # async fn example(sink: Arc<dyn AudioSink>) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let settings = config.player_settings();
//! let resolver = ResolverAdapter::new(
//!     Arc::new(YtDlpSource::new(&config.ytdlp_path)),
//!     settings.retry_attempts,
//!     settings.backoff,
//! );
//! let player = AudioPlayer::new(resolver, settings);
//!
//! let outcome = player
//!     .play(123456789, "https://www.youtube.com/watch?v=dQw4w9WgXcQ", sink)
//!     .await?;
//! println!("Now playing {:?}", outcome.now_playing);
//! # Ok(())
//! # }
//! ```

pub mod player;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod session;
pub mod sink;
pub mod songbird_sink;

#[cfg(test)]
pub(crate) mod testing;
