//! Model module - Session data types and provider seams
//!
//! - `types`: devices, tracks, tokens and the playback status machine
//! - `playback`: playback snapshot and sequence-tagged reconciliation
//! - `cache`: durable key/value session storage
//! - `clock`: wall-clock source for token expiry
//! - `spotify_client`: Web API seam and the rspotify implementation

mod types;
mod playback;
mod cache;
mod clock;
mod spotify_client;

pub use types::{
    AccessToken, DeviceRef, DeviceStatus, PlaybackStatus, PlaylistEntry, TrackRef,
};

pub use playback::{PlaybackSnapshot, Reconciler};

pub use cache::{FileStorage, MemoryStorage, Storage, StorageError};

/// Storage keys shared by the auth session and the controller
pub mod keys {
    pub use super::cache::{ACCESS_TOKEN, AUTH_STATE, CODE_VERIFIER, DEVICE_ID, TOKEN_EXPIRATION};
}

pub use clock::{Clock, SystemClock};

pub use spotify_client::{ApiError, PlaybackApi, SpotifyClient};
