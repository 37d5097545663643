//! Playback snapshot and sequence-tagged reconciliation
//!
//! Local mutations are applied eagerly and stamped with a monotonically
//! increasing sequence number. Provider observations carry the sequence
//! number that was current when they were requested; anything older than
//! the newest local mutation is stale and dropped.

/// Best-effort local view of the remote transport
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub current_track: Option<String>,
    pub is_paused: bool,
    pub position_ms: u32,
    pub device_id: Option<String>,
}

impl PlaybackSnapshot {
    pub fn is_playing(&self) -> bool {
        self.current_track.is_some() && !self.is_paused
    }
}

#[derive(Debug, Default)]
pub struct Reconciler {
    snapshot: PlaybackSnapshot,
    local_seq: u64,
    confirmed_seq: u64,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &PlaybackSnapshot {
        &self.snapshot
    }

    /// Sequence number of the newest local mutation
    pub fn sequence(&self) -> u64 {
        self.local_seq
    }

    /// Whether the provider has confirmed the newest local mutation
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_seq >= self.local_seq
    }

    pub fn apply_local<F>(&mut self, mutate: F) -> u64
    where
        F: FnOnce(&mut PlaybackSnapshot),
    {
        self.local_seq += 1;
        mutate(&mut self.snapshot);
        self.local_seq
    }

    /// Replace the snapshot with provider state. `seq` is `None` for
    /// unsolicited pushes, which are always current.
    pub fn apply_remote(&mut self, seq: Option<u64>, snapshot: PlaybackSnapshot) -> bool {
        if let Some(seq) = seq {
            if seq < self.local_seq {
                tracing::debug!(
                    seq,
                    local_seq = self.local_seq,
                    "Dropping stale provider state"
                );
                return false;
            }
        }

        self.snapshot = snapshot;
        self.confirmed_seq = self.local_seq;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(track: &str, paused: bool) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_track: Some(track.to_string()),
            is_paused: paused,
            position_ms: 1200,
            device_id: Some("dev".to_string()),
        }
    }

    #[test]
    fn local_mutations_bump_sequence() {
        let mut reconciler = Reconciler::new();
        let first = reconciler.apply_local(|s| s.is_paused = true);
        let second = reconciler.apply_local(|s| s.is_paused = false);
        assert_eq!((first, second), (1, 2));
        assert!(!reconciler.is_confirmed());
    }

    #[test]
    fn stale_confirmation_is_ignored() {
        let mut reconciler = Reconciler::new();
        let seq = reconciler.apply_local(|s| s.current_track = Some("a".into()));
        reconciler.apply_local(|s| s.current_track = Some("b".into()));

        assert!(!reconciler.apply_remote(Some(seq), remote("a", false)));
        assert_eq!(reconciler.snapshot().current_track.as_deref(), Some("b"));
    }

    #[test]
    fn current_confirmation_wins() {
        let mut reconciler = Reconciler::new();
        let seq = reconciler.apply_local(|s| s.current_track = Some("a".into()));

        assert!(reconciler.apply_remote(Some(seq), remote("a", true)));
        assert!(reconciler.snapshot().is_paused);
        assert!(reconciler.is_confirmed());
    }

    #[test]
    fn untagged_push_always_applies() {
        let mut reconciler = Reconciler::new();
        reconciler.apply_local(|s| s.current_track = Some("a".into()));
        assert!(reconciler.apply_remote(None, remote("c", false)));
        assert_eq!(reconciler.snapshot().current_track.as_deref(), Some("c"));
    }
}
