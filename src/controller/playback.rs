//! Playback control methods

use std::future::Future;

use crate::error::{PlaybackError, Result, ValidationError};
use crate::model::{ApiError, DeviceRef, PlaybackSnapshot, PlaybackStatus};

use super::PlaybackController;

impl PlaybackController {
    /// Pick the device to control: the active one, else the first listed.
    pub async fn resolve_active_device(&self) -> Result<Option<DeviceRef>> {
        let token = self.token().await?;
        let devices = match self.api.devices(&token).await {
            Ok(devices) => devices,
            Err(e) => return Err(self.api_failure("devices", e).await),
        };

        let chosen = devices
            .iter()
            .find(|d| d.is_active)
            .or_else(|| devices.first())
            .cloned();

        match &chosen {
            Some(device) => {
                tracing::debug!(
                    device_name = %device.name,
                    device_id = %device.device_id,
                    is_active = device.is_active,
                    "Resolved playback device"
                );
                self.remember_device(&device.device_id).await;
            }
            None => {
                tracing::warn!("No playback devices available");
                self.forget_device().await;
            }
        }
        Ok(chosen)
    }

    /// Start `track_uri`, or resume the current item when `None`.
    ///
    /// The selection is recorded before the request goes out, so it stays
    /// visible even when no device can take it.
    pub async fn play(&self, track_uri: Option<&str>, device_id: Option<&str>) -> Result<()> {
        let token = self.token().await?;

        if let Some(uri) = track_uri {
            let seq = self.context.lock().await.select(uri);
            tracing::debug!(uri, seq, "Track selected");
        }

        let first_device = match device_id {
            Some(device_id) => Some(device_id.to_string()),
            None => self.resolve_active_device().await?.map(|d| d.device_id),
        };

        let uris: Vec<String> = track_uri.map(|u| vec![u.to_string()]).unwrap_or_default();
        let api = self.api.clone();
        let device = self
            .with_device_retry(first_device, move |device| {
                let api = api.clone();
                let token = token.clone();
                let uris = uris.clone();
                async move {
                    if uris.is_empty() {
                        api.resume(&token, Some(device.as_str())).await
                    } else {
                        api.start_playback(&token, &uris, &device).await
                    }
                }
            })
            .await?;

        self.remember_device(&device).await;
        {
            let mut ctx = self.context.lock().await;
            ctx.reconciler.apply_local(|s| {
                s.is_paused = false;
                s.device_id = Some(device.clone());
            });
            ctx.set_transport(false);
        }
        tracing::info!(device_id = %device, uri = ?track_uri, "Playback started");
        Ok(())
    }

    /// Run `operation` against `device`; on a not-found answer (or with no
    /// device at all) re-resolve once and try again. Returns the device the
    /// operation succeeded on.
    async fn with_device_retry<F, Fut>(&self, device: Option<String>, operation: F) -> Result<String>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = std::result::Result<(), ApiError>>,
    {
        match device {
            Some(device) => match operation(device.clone()).await {
                Ok(()) => return Ok(device),
                Err(ApiError::NotFound) => {
                    tracing::info!(device_id = %device, "Device not found, re-resolving devices");
                }
                Err(e) => return Err(self.api_failure("play", e).await),
            },
            None => tracing::info!("No device to play on, re-resolving devices"),
        }

        let Some(device) = self.resolve_active_device().await?.map(|d| d.device_id) else {
            return Err(PlaybackError::NoDevice.into());
        };

        match operation(device.clone()).await {
            Ok(()) => {
                tracing::info!(device_id = %device, "Playback succeeded after device re-resolution");
                Ok(device)
            }
            Err(ApiError::NotFound) => {
                tracing::warn!(device_id = %device, "Device still not found, giving up");
                self.forget_device().await;
                Err(PlaybackError::NoDevice.into())
            }
            Err(e) => Err(self.api_failure("play", e).await),
        }
    }

    pub async fn pause(&self) -> Result<()> {
        self.set_paused(true).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.set_paused(false).await
    }

    /// Flip the local flag first; the UI never waits for the provider.
    async fn set_paused(&self, paused: bool) -> Result<()> {
        let token = self.token().await?;
        let device = {
            let mut ctx = self.context.lock().await;
            ctx.reconciler.apply_local(|s| s.is_paused = paused);
            ctx.set_transport(paused);
            ctx.device_id.clone()
        };

        let result = if paused {
            self.api.pause(&token, device.as_deref()).await
        } else {
            self.api.resume(&token, device.as_deref()).await
        };

        match result {
            Ok(()) => {
                tracing::info!(action = if paused { "paused" } else { "resumed" }, "Playback toggled");
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(self.api_failure("toggle", ApiError::Unauthorized).await),
            Err(e) => {
                tracing::warn!(error = %e, paused, "Transport change failed, keeping local state");
                Ok(())
            }
        }
    }

    pub async fn skip_next(&self) -> Result<()> {
        self.skip(true).await
    }

    pub async fn skip_previous(&self) -> Result<()> {
        self.skip(false).await
    }

    /// Index bookkeeping is advisory: it moves whether or not the provider
    /// accepted the skip.
    async fn skip(&self, forward: bool) -> Result<()> {
        let token = self.token().await?;
        let device = {
            let mut ctx = self.context.lock().await;
            if let Some(index) = ctx.step(forward) {
                tracing::debug!(index, forward, "Track index moved");
            }
            ctx.device_id.clone()
        };

        let result = if forward {
            self.api.next(&token, device.as_deref()).await
        } else {
            self.api.previous(&token, device.as_deref()).await
        };

        match result {
            Ok(()) => Ok(()),
            Err(ApiError::Unauthorized) => Err(self.api_failure("skip", ApiError::Unauthorized).await),
            Err(e) => {
                tracing::warn!(error = %e, forward, "Skip failed on provider");
                Ok(())
            }
        }
    }

    /// Forward a volume change. No local echo: the provider value is
    /// re-settable at any time.
    pub async fn set_volume(&self, percent: i32) -> Result<()> {
        if !(0..=100).contains(&percent) {
            return Err(ValidationError::OutOfRange {
                field: "volume",
                value: percent.into(),
                min: 0,
                max: 100,
            }
            .into());
        }

        let token = self.token().await?;
        let device = self.context.lock().await.device_id.clone();
        match self.api.set_volume(&token, percent as u8, device.as_deref()).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.api_failure("volume", e).await),
        }
    }

    /// Move the session to `device_id`, optionally starting playback there.
    pub async fn transfer_playback(&self, device_id: &str, play: bool) -> Result<()> {
        let token = self.token().await?;
        if let Err(e) = self.api.transfer_playback(&token, device_id, play).await {
            return Err(self.api_failure("transfer", e).await);
        }

        self.remember_device(device_id).await;
        if play {
            let mut ctx = self.context.lock().await;
            ctx.reconciler.apply_local(|s| {
                s.is_paused = false;
                s.device_id = Some(device_id.to_string());
            });
            ctx.set_transport(false);
        }
        tracing::info!(device_id, play, "Playback transferred");
        Ok(())
    }

    /// Pull provider state and reconcile it. Mutations made while the
    /// request was in flight take precedence over the answer.
    pub async fn sync_state(&self) -> Result<PlaybackSnapshot> {
        let token = self.token().await?;
        let seq = self.context.lock().await.reconciler.sequence();

        let remote = match self.api.current_playback(&token).await {
            Ok(remote) => remote,
            Err(e) => return Err(self.api_failure("current_playback", e).await),
        };

        match remote {
            Some(snapshot) => {
                if !self.apply_remote(Some(seq), snapshot).await {
                    tracing::debug!(seq, "Provider state superseded by local changes");
                }
            }
            None => {
                tracing::debug!("No active playback session on provider");
                let mut ctx = self.context.lock().await;
                let mut idle = ctx.reconciler.snapshot().clone();
                idle.is_paused = true;
                if ctx.reconciler.apply_remote(Some(seq), idle) {
                    if ctx.status == PlaybackStatus::Playing {
                        ctx.status = PlaybackStatus::Paused;
                    }
                } else {
                    tracing::debug!(seq, "Idle provider state superseded by local changes");
                }
            }
        }
        Ok(self.snapshot().await)
    }
}
