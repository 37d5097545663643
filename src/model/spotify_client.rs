//! Web API seam and its rspotify-backed implementation

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use rspotify::{
    http::HttpError,
    model::{CurrentPlaybackContext, PlayableId, PlayableItem, PlaylistId, TrackId},
    prelude::*,
    AuthCodeSpotify, ClientError, Config as ClientConfig, Token,
};
use thiserror::Error;

use super::playback::PlaybackSnapshot;
use super::types::{AccessToken, DeviceRef, PlaylistEntry, TrackRef};

/// Provider failures, classified by what the controller does about them
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("provider rejected the access token")]
    Unauthorized,

    #[error("provider refused the action")]
    Forbidden,

    #[error("no active device or item found")]
    NotFound,

    #[error("rate limited by provider")]
    RateLimited,

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("{0}")]
    Transport(String),
}

impl ApiError {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound,
            429 => ApiError::RateLimited,
            code => ApiError::Transport(format!("unexpected status {code}")),
        }
    }
}

/// Remote-control surface of the provider Web API
#[async_trait]
pub trait PlaybackApi: Send + Sync {
    async fn devices(&self, token: &AccessToken) -> Result<Vec<DeviceRef>, ApiError>;

    async fn playlist_entries(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistEntry>, ApiError>;

    async fn start_playback(
        &self,
        token: &AccessToken,
        uris: &[String],
        device_id: &str,
    ) -> Result<(), ApiError>;

    async fn resume(&self, token: &AccessToken, device_id: Option<&str>) -> Result<(), ApiError>;

    async fn pause(&self, token: &AccessToken, device_id: Option<&str>) -> Result<(), ApiError>;

    async fn next(&self, token: &AccessToken, device_id: Option<&str>) -> Result<(), ApiError>;

    async fn previous(&self, token: &AccessToken, device_id: Option<&str>) -> Result<(), ApiError>;

    async fn set_volume(
        &self,
        token: &AccessToken,
        percent: u8,
        device_id: Option<&str>,
    ) -> Result<(), ApiError>;

    async fn transfer_playback(
        &self,
        token: &AccessToken,
        device_id: &str,
        play: bool,
    ) -> Result<(), ApiError>;

    async fn current_playback(
        &self,
        token: &AccessToken,
    ) -> Result<Option<PlaybackSnapshot>, ApiError>;
}

/// rspotify client that takes its bearer token from the caller on every request
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
}

impl SpotifyClient {
    pub fn new() -> Self {
        let client = AuthCodeSpotify::with_config(
            Default::default(),
            Default::default(),
            ClientConfig {
                token_cached: false,
                token_refreshing: false,
                ..Default::default()
            },
        );
        tracing::debug!("rspotify client initialized");

        Self {
            client: Arc::new(client),
        }
    }

    /// Install `token` in the rspotify client unless it is already there.
    async fn authorize(&self, token: &AccessToken) -> Result<(), ApiError> {
        let mut current = self
            .client
            .token
            .lock()
            .await
            .map_err(|_| ApiError::Transport("token lock unavailable".to_string()))?;

        let up_to_date = current
            .as_ref()
            .is_some_and(|t| t.access_token == token.secret());
        if !up_to_date {
            *current = Some(Token {
                access_token: token.secret().to_string(),
                expires_in: token.expires_at() - Utc::now(),
                expires_at: Some(token.expires_at()),
                scopes: HashSet::new(),
                refresh_token: None,
            });
            tracing::trace!("rspotify token replaced");
        }
        Ok(())
    }

    fn track_ref(item: Option<PlayableItem>) -> Option<TrackRef> {
        match item {
            Some(PlayableItem::Track(track)) => {
                let id = track.id.as_ref()?.id().to_string();
                Some(TrackRef {
                    uri: format!("spotify:track:{}", id),
                    id,
                    name: track.name,
                    artist_names: track.artists.into_iter().map(|a| a.name).collect(),
                    duration_ms: track.duration.num_milliseconds().max(0) as u32,
                })
            }
            _ => None,
        }
    }

    fn snapshot(context: CurrentPlaybackContext) -> PlaybackSnapshot {
        let position_ms = context
            .progress
            .map(|d| d.num_milliseconds().max(0) as u32)
            .unwrap_or(0);
        PlaybackSnapshot {
            current_track: Self::track_ref(context.item).map(|t| t.uri),
            is_paused: !context.is_playing,
            position_ms,
            device_id: context.device.id,
        }
    }
}

impl Default for SpotifyClient {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ClientError> for ApiError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Http(http) => match *http {
                HttpError::StatusCode(response) => ApiError::from_status(response.status().as_u16()),
                other => ApiError::Transport(other.to_string()),
            },
            other => ApiError::Transport(other.to_string()),
        }
    }
}

#[async_trait]
impl PlaybackApi for SpotifyClient {
    async fn devices(&self, token: &AccessToken) -> Result<Vec<DeviceRef>, ApiError> {
        self.authorize(token).await?;
        tracing::debug!("API: devices");
        let devices = self.client.device().await?;
        let devices: Vec<DeviceRef> = devices
            .into_iter()
            .filter_map(|d| {
                d.id.map(|device_id| DeviceRef {
                    device_id,
                    name: d.name,
                    is_active: d.is_active,
                })
            })
            .collect();
        tracing::debug!(count = devices.len(), "Found devices");
        Ok(devices)
    }

    async fn playlist_entries(
        &self,
        token: &AccessToken,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistEntry>, ApiError> {
        self.authorize(token).await?;
        tracing::debug!(playlist_id, "API: playlist_items");
        let id = PlaylistId::from_id_or_uri(playlist_id)
            .map_err(|e| ApiError::InvalidId(e.to_string()))?;

        let items: Vec<_> = self.client.playlist_items(id, None, None).try_collect().await?;

        Ok(items
            .into_iter()
            .map(|item| PlaylistEntry {
                track: Self::track_ref(item.track),
            })
            .collect())
    }

    async fn start_playback(
        &self,
        token: &AccessToken,
        uris: &[String],
        device_id: &str,
    ) -> Result<(), ApiError> {
        self.authorize(token).await?;
        tracing::debug!(?uris, device_id, "API: start_uris_playback");
        let ids = uris
            .iter()
            .map(|uri| {
                TrackId::from_id_or_uri(uri)
                    .map(PlayableId::Track)
                    .map_err(|e| ApiError::InvalidId(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .start_uris_playback(ids, Some(device_id), None, None)
            .await?;
        Ok(())
    }

    async fn resume(&self, token: &AccessToken, device_id: Option<&str>) -> Result<(), ApiError> {
        self.authorize(token).await?;
        tracing::debug!(device_id = ?device_id, "API: resume_playback");
        self.client.resume_playback(device_id, None).await?;
        Ok(())
    }

    async fn pause(&self, token: &AccessToken, device_id: Option<&str>) -> Result<(), ApiError> {
        self.authorize(token).await?;
        tracing::debug!(device_id = ?device_id, "API: pause_playback");
        self.client.pause_playback(device_id).await?;
        Ok(())
    }

    async fn next(&self, token: &AccessToken, device_id: Option<&str>) -> Result<(), ApiError> {
        self.authorize(token).await?;
        tracing::debug!(device_id = ?device_id, "API: next_track");
        self.client.next_track(device_id).await?;
        Ok(())
    }

    async fn previous(&self, token: &AccessToken, device_id: Option<&str>) -> Result<(), ApiError> {
        self.authorize(token).await?;
        tracing::debug!(device_id = ?device_id, "API: previous_track");
        self.client.previous_track(device_id).await?;
        Ok(())
    }

    async fn set_volume(
        &self,
        token: &AccessToken,
        percent: u8,
        device_id: Option<&str>,
    ) -> Result<(), ApiError> {
        self.authorize(token).await?;
        tracing::debug!(percent, device_id = ?device_id, "API: volume");
        self.client.volume(percent, device_id).await?;
        Ok(())
    }

    async fn transfer_playback(
        &self,
        token: &AccessToken,
        device_id: &str,
        play: bool,
    ) -> Result<(), ApiError> {
        self.authorize(token).await?;
        tracing::debug!(device_id, play, "API: transfer_playback");
        self.client.transfer_playback(device_id, Some(play)).await?;
        Ok(())
    }

    async fn current_playback(
        &self,
        token: &AccessToken,
    ) -> Result<Option<PlaybackSnapshot>, ApiError> {
        self.authorize(token).await?;
        tracing::trace!("API: current_playback");
        let context = self.client.current_playback(None, None::<Vec<_>>).await?;
        Ok(context.map(Self::snapshot))
    }
}
