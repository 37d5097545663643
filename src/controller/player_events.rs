//! Player event listener for the local device handle

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::model::PlaybackSnapshot;

use super::PlaybackController;

/// Events pushed by the local playback device handle.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    /// The handle registered with the provider and can take playback.
    Ready { device_id: String },
    /// The handle went offline.
    NotReady { device_id: String },
    /// Provider playback state. `seq` is the local mutation sequence the
    /// state answers to; `None` for unsolicited pushes.
    StateChanged {
        seq: Option<u64>,
        snapshot: PlaybackSnapshot,
    },
    /// The handle's credentials were rejected.
    AuthenticationError { message: String },
}

impl PlaybackController {
    pub async fn handle_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::Ready { device_id } => {
                tracing::info!(device_id = %device_id, "PlayerEvent::Ready");
                self.remember_device(&device_id).await;
            }
            PlayerEvent::NotReady { device_id } => {
                tracing::info!(device_id = %device_id, "PlayerEvent::NotReady");
                if self.device_id().await.as_deref() == Some(device_id.as_str()) {
                    self.forget_device().await;
                }
            }
            PlayerEvent::StateChanged { seq, snapshot } => {
                tracing::trace!(?seq, track = ?snapshot.current_track, "PlayerEvent::StateChanged");
                if !self.apply_remote(seq, snapshot).await {
                    tracing::debug!(?seq, "Stale player state dropped");
                }
            }
            PlayerEvent::AuthenticationError { message } => {
                tracing::warn!(message = %message, "PlayerEvent::AuthenticationError");
                self.logout().await;
            }
        }
    }

    /// Drain `events` on a background task until every sender is gone.
    pub fn spawn_event_listener(&self, mut events: UnboundedReceiver<PlayerEvent>) -> JoinHandle<()> {
        let controller = self.clone();
        tracing::info!("Starting player event listener");

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.handle_event(event).await;
            }
            tracing::debug!("Player event listener shutting down");
        })
    }
}
