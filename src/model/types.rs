//! Core type definitions shared by the auth session and the controller

use std::fmt;

use chrono::{DateTime, Utc};

/// A provider-registered playback endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceRef {
    pub device_id: String,
    pub name: String,
    pub is_active: bool,
}

/// A playable track as listed in a playlist
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRef {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub artist_names: Vec<String>,
    pub duration_ms: u32,
}

impl TrackRef {
    pub fn artists(&self) -> String {
        self.artist_names.join(", ")
    }
}

/// One raw playlist row; `track` is `None` for local files, removed
/// tracks and podcast episodes the listing could not resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub track: Option<TrackRef>,
}

/// Bearer token handed out by the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// Keep the secret out of logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Whether a device is known to accept transport commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceStatus {
    NoDevice,
    Ready,
}

/// Playback status as seen by the UI
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    LoggedOut,
    Authenticating,
    Authenticated(DeviceStatus),
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn is_authenticated(self) -> bool {
        !matches!(self, PlaybackStatus::LoggedOut | PlaybackStatus::Authenticating)
    }

    /// Status after a device list came back empty
    pub fn device_lost(self) -> Self {
        if self.is_authenticated() {
            PlaybackStatus::Authenticated(DeviceStatus::NoDevice)
        } else {
            self
        }
    }

    /// Status after a usable device was found
    pub fn device_found(self) -> Self {
        match self {
            PlaybackStatus::Authenticated(DeviceStatus::NoDevice) => {
                PlaybackStatus::Authenticated(DeviceStatus::Ready)
            }
            other => other,
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::LoggedOut => write!(f, "logged out"),
            PlaybackStatus::Authenticating => write!(f, "authenticating"),
            PlaybackStatus::Authenticated(DeviceStatus::NoDevice) => write!(f, "no device"),
            PlaybackStatus::Authenticated(DeviceStatus::Ready) => write!(f, "ready"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
        }
    }
}
