//! Playlist loading, shuffled order and index bookkeeping

use rand::seq::SliceRandom;

use crate::error::{Result, ValidationError};
use crate::model::TrackRef;

use super::{PlaybackController, SessionContext};

/// Cached shuffle of one playlist, with the sorted track uris it was made from
pub(super) struct ShuffledOrder {
    members: Vec<String>,
    order: Vec<TrackRef>,
}

impl SessionContext {
    /// Advance the track index one step with wrap-around in both
    /// directions and select the track under it.
    pub(super) fn step(&mut self, forward: bool) -> Option<usize> {
        let len = self.queue.len();
        if len == 0 {
            return None;
        }

        let current = self.track_index % len;
        self.track_index = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };

        let uri = self.queue[self.track_index].uri.clone();
        self.reconciler.apply_local(|s| {
            s.current_track = Some(uri);
            s.position_ms = 0;
        });
        Some(self.track_index)
    }
}

impl PlaybackController {
    /// Fetch a playlist and make it the canonical order. Entries without a
    /// resolvable track are dropped.
    pub async fn load_playlist(&self, playlist_id: &str) -> Result<Vec<TrackRef>> {
        let token = self.token().await?;
        let entries = match self.api.playlist_entries(&token, playlist_id).await {
            Ok(entries) => entries,
            Err(e) => return Err(self.api_failure("playlist_items", e).await),
        };

        let listed = entries.len();
        let tracks: Vec<TrackRef> = entries.into_iter().filter_map(|e| e.track).collect();
        if tracks.len() < listed {
            tracing::debug!(
                playlist_id,
                dropped = listed - tracks.len(),
                "Skipped playlist entries without a track"
            );
        }

        let mut ctx = self.context.lock().await;
        ctx.playlist_id = Some(playlist_id.to_string());
        ctx.playlist = tracks.clone();
        ctx.queue = tracks.clone();
        ctx.track_index = 0;
        tracing::info!(playlist_id, count = tracks.len(), "Playlist loaded");

        Ok(tracks)
    }

    /// Shuffled order of the loaded playlist.
    ///
    /// Computed once per playlist id with a fresh seed and reused afterwards,
    /// also across logins, so re-displaying the playlist never reshuffles it.
    /// A reload that changed the set of tracks gets a new order.
    /// Becomes the active play order.
    pub async fn shuffled_playlist(&self) -> Vec<TrackRef> {
        let (playlist_id, playlist) = {
            let ctx = self.context.lock().await;
            (ctx.playlist_id.clone(), ctx.playlist.clone())
        };
        let Some(playlist_id) = playlist_id else {
            return Vec::new();
        };

        let mut members: Vec<String> = playlist.iter().map(|t| t.uri.clone()).collect();
        members.sort_unstable();

        let shuffled = {
            let mut shuffles = self.shuffles.lock().await;
            let order = match shuffles.get(&playlist_id) {
                Some(cached) if cached.members == members => cached.order.clone(),
                cached => {
                    if cached.is_some() {
                        tracing::debug!(playlist_id = %playlist_id, "Playlist contents changed, reshuffling");
                    }
                    let mut order = playlist;
                    order.shuffle(&mut rand::rng());
                    tracing::debug!(playlist_id = %playlist_id, "Playlist shuffled");
                    order
                }
            };
            shuffles.insert(
                playlist_id.clone(),
                ShuffledOrder {
                    members,
                    order: order.clone(),
                },
            );
            order
        };

        let mut ctx = self.context.lock().await;
        if ctx.playlist_id.as_deref() == Some(playlist_id.as_str()) {
            let current = ctx.reconciler.snapshot().current_track.clone();
            ctx.track_index = current
                .and_then(|uri| shuffled.iter().position(|t| t.uri == uri))
                .unwrap_or(0);
            ctx.queue = shuffled.clone();
        }
        shuffled
    }

    /// The active play order
    pub async fn queue(&self) -> Vec<TrackRef> {
        self.context.lock().await.queue.clone()
    }

    pub async fn playlist(&self) -> Vec<TrackRef> {
        self.context.lock().await.playlist.clone()
    }

    pub async fn track_index(&self) -> usize {
        self.context.lock().await.track_index
    }

    /// Play entry `index` of the active order.
    pub async fn play_index(&self, index: usize) -> Result<()> {
        let uri = {
            let mut ctx = self.context.lock().await;
            let len = ctx.queue.len();
            let Some(track) = ctx.queue.get(index) else {
                return Err(ValidationError::OutOfRange {
                    field: "track index",
                    value: index as i64,
                    min: 0,
                    max: len as i64 - 1,
                }
                .into());
            };
            let uri = track.uri.clone();
            ctx.track_index = index;
            uri
        };
        self.play(Some(&uri), None).await
    }
}
