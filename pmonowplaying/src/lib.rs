//! Now-playing client for Icecast and SHOUTcast streaming servers
//!
//! This crate asks a streaming server what it is currently playing and how
//! many people are listening, and returns the answer in one canonical
//! [`NowPlaying`] shape whatever the server family.
//!
//! # Features
//!
//! - **Three protocols**: Icecast 2, SHOUTcast 1.x and SHOUTcast 2.x behind a
//!   single [`Adapter`] trait
//! - **Admin-first fetching**: with admin credentials the detailed admin
//!   pages are used, falling back to the public pages on failure
//! - **Client rosters**: per-listener IP, user agent and connection time,
//!   deduplicated by `(ip, user agent)`
//! - **Never fails on now-playing**: unreachable servers give a blank result
//! - **Configuration Extension**: stations, timeout and User-Agent stored in
//!   pmoconfig (feature `pmoconfig`, enabled by default)
//!
//! # Example
//!
//! ```no_run
//! use pmonowplaying::{Adapter, AdapterBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = AdapterBuilder::shoutcast2("http://radio.example:8000")
//!         .admin_password("changeme")
//!         .build()?;
//!
//!     let np = adapter.now_playing(Some("1"), true).await;
//!     println!("Now: {} - {}", np.current_song.artist, np.current_song.title);
//!     println!("Listeners: {}", np.listeners.total);
//!
//!     match adapter.clients(Some("1"), true).await {
//!         Ok(clients) => println!("{} unique clients", clients.len()),
//!         Err(e) if e.is_unsupported() => println!("No client roster on this server"),
//!         Err(e) => return Err(e.into()),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Combining results
//!
//! Results from several mounts or servers fold into one with
//! [`NowPlaying::merge`] / [`NowPlaying::aggregate`]: listener counts add up,
//! the first known song wins and `online` is true if any input is online.

pub mod adapter;
pub mod error;
pub mod factory;
pub mod http;
pub mod listeners;
pub mod models;
pub mod song;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

// Re-exports
pub use adapter::{Adapter, AdapterType, Icecast, Shoutcast1, Shoutcast2};
pub use error::{Error, Result};
pub use factory::{AdapterBuilder, Station};
pub use http::{Credentials, Endpoint, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use listeners::{reconcile, Listeners};
pub use models::{parse_count, unique_clients, Client, Meta, NowPlaying};
pub use song::{split_text, CurrentSong, DEFAULT_DELIMITER};

#[cfg(feature = "pmoconfig")]
pub use config_ext::NowPlayingConfigExt;
