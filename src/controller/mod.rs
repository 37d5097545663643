//! Controller module - Remote playback on top of the Web API
//!
//! The controller owns the session context (token, device, playlist,
//! reconciled playback snapshot). It is cheap to clone; every clone drives
//! the same session. It is organized into submodules by responsibility:
//!
//! - `playback`: device resolution and transport control
//! - `playlist`: playlist loading, shuffled order and index bookkeeping
//! - `player_events`: inbound device-handle events

mod playback;
mod playlist;
mod player_events;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{AuthError, Error, PlaybackError, Result};
use crate::model::{
    keys, AccessToken, ApiError, Clock, DeviceStatus, PlaybackApi, PlaybackSnapshot,
    PlaybackStatus, Reconciler, Storage, TrackRef,
};

pub use player_events::PlayerEvent;

/// Everything tied to one authenticated session. Reset on logout.
#[derive(Default)]
pub(crate) struct SessionContext {
    status: PlaybackStatus,
    token: Option<AccessToken>,
    device_id: Option<String>,
    playlist_id: Option<String>,
    playlist: Vec<TrackRef>,
    /// Active play order: the shuffled playlist once computed, else `playlist`.
    queue: Vec<TrackRef>,
    track_index: usize,
    reconciler: Reconciler,
}

impl SessionContext {
    /// Record `uri` as the selected track and follow it in the queue.
    fn select(&mut self, uri: &str) -> u64 {
        if let Some(index) = self.queue.iter().position(|t| t.uri == uri) {
            self.track_index = index;
        }
        self.reconciler.apply_local(|s| {
            s.current_track = Some(uri.to_string());
            s.position_ms = 0;
        })
    }

    fn set_transport(&mut self, paused: bool) {
        if matches!(
            self.status,
            PlaybackStatus::Playing
                | PlaybackStatus::Paused
                | PlaybackStatus::Authenticated(DeviceStatus::Ready)
        ) {
            self.status = if paused {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Playing
            };
        }
    }
}

#[derive(Clone)]
pub struct PlaybackController {
    api: Arc<dyn PlaybackApi>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    context: Arc<Mutex<SessionContext>>,
    /// Shuffled orders by playlist id, kept for the life of the controller
    shuffles: Arc<Mutex<HashMap<String, playlist::ShuffledOrder>>>,
}

impl PlaybackController {
    pub fn new(api: Arc<dyn PlaybackApi>, storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api,
            storage,
            clock,
            context: Arc::new(Mutex::new(SessionContext::default())),
            shuffles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Login has been started and the redirect is pending
    pub async fn mark_authenticating(&self) {
        let mut ctx = self.context.lock().await;
        if ctx.status == PlaybackStatus::LoggedOut {
            ctx.status = PlaybackStatus::Authenticating;
        }
    }

    /// Arm the controller with a fresh token. The last known device id is
    /// restored as a hint, but the device counts as unknown until resolved.
    pub async fn arm(&self, token: AccessToken) {
        let cached_device = self.storage.get(keys::DEVICE_ID).await;
        let mut ctx = self.context.lock().await;
        *ctx = SessionContext::default();
        ctx.token = Some(token);
        ctx.device_id = cached_device;
        ctx.status = PlaybackStatus::Authenticated(DeviceStatus::NoDevice);
        tracing::info!(device_hint = ?ctx.device_id, "Playback controller armed");
    }

    /// Drop the session: cached playback state in memory and the stored token.
    pub async fn logout(&self) {
        *self.context.lock().await = SessionContext::default();

        for key in [keys::ACCESS_TOKEN, keys::TOKEN_EXPIRATION] {
            if let Err(e) = self.storage.remove(key).await {
                tracing::warn!(error = %e, key, "Could not drop stored token");
            }
        }
        tracing::info!("Playback session discarded");
    }

    pub async fn status(&self) -> PlaybackStatus {
        self.context.lock().await.status
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        self.context.lock().await.reconciler.snapshot().clone()
    }

    pub async fn is_playing(&self) -> bool {
        self.context.lock().await.reconciler.snapshot().is_playing()
    }

    pub async fn selected_track(&self) -> Option<String> {
        self.context
            .lock()
            .await
            .reconciler
            .snapshot()
            .current_track
            .clone()
    }

    pub async fn device_id(&self) -> Option<String> {
        self.context.lock().await.device_id.clone()
    }

    /// Token for the next request; an expired token ends the session.
    async fn token(&self) -> Result<AccessToken> {
        let token = self.context.lock().await.token.clone();
        match token {
            Some(token) if !token.is_expired(self.clock.now()) => Ok(token),
            Some(_) => {
                tracing::info!("Access token expired, login required");
                self.logout().await;
                Err(AuthError::Unauthenticated.into())
            }
            None => Err(AuthError::Unauthenticated.into()),
        }
    }

    /// Turn a provider failure into a crate error; a rejected token ends
    /// the session.
    async fn api_failure(&self, operation: &str, error: ApiError) -> Error {
        match error {
            ApiError::Unauthorized => {
                tracing::warn!(operation, "Provider rejected access token");
                self.logout().await;
                AuthError::Unauthenticated.into()
            }
            other => {
                tracing::error!(operation, error = %other, "API request failed");
                PlaybackError::from(other).into()
            }
        }
    }

    async fn remember_device(&self, device_id: &str) {
        {
            let mut ctx = self.context.lock().await;
            ctx.device_id = Some(device_id.to_string());
            ctx.status = ctx.status.device_found();
        }
        if let Err(e) = self.storage.set(keys::DEVICE_ID, device_id).await {
            tracing::warn!(error = %e, "Could not persist device id");
        }
    }

    async fn forget_device(&self) {
        let mut ctx = self.context.lock().await;
        ctx.device_id = None;
        ctx.status = ctx.status.device_lost();
    }

    /// Reconcile provider state into the snapshot and follow it with the
    /// status machine.
    async fn apply_remote(&self, seq: Option<u64>, snapshot: PlaybackSnapshot) -> bool {
        let device_id = snapshot.device_id.clone();
        let paused = snapshot.is_paused;
        let has_track = snapshot.current_track.is_some();

        let applied = {
            let mut ctx = self.context.lock().await;
            let applied = ctx.reconciler.apply_remote(seq, snapshot);
            if applied && has_track && device_id.is_some() {
                ctx.status = ctx.status.device_found();
                ctx.set_transport(paused);
            }
            applied
        };

        if applied {
            if let Some(device_id) = device_id {
                self.remember_device(&device_id).await;
            }
        }
        applied
    }
}
