#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use spotify_widget::auth::{TokenEndpoint, TokenRequest, TokenResponse};
use spotify_widget::model::{
    AccessToken, ApiError, Clock, DeviceRef, MemoryStorage, PlaybackApi, PlaybackSnapshot,
    PlaylistEntry, TrackRef,
};
use spotify_widget::{AuthError, PlaybackController};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Clock the test moves by hand
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Token endpoint that records requests and answers from a script
#[derive(Default)]
pub struct MockTokenEndpoint {
    pub requests: Mutex<Vec<TokenRequest>>,
    pub responses: Mutex<VecDeque<Result<TokenResponse, AuthError>>>,
}

impl MockTokenEndpoint {
    pub fn granting(access_token: &str, expires_in: i64) -> Self {
        let endpoint = Self::default();
        endpoint.responses.lock().unwrap().push_back(Ok(TokenResponse {
            access_token: access_token.to_string(),
            expires_in,
            token_type: Some("Bearer".to_string()),
            scope: None,
            refresh_token: None,
        }));
        endpoint
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn exchange(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(AuthError::ExchangeFailed {
                    detail: "HTTP 400: unscripted".to_string(),
                })
            })
    }
}

/// Scripted Web API. Each method pops its next answer from a queue and
/// succeeds when the queue is empty; every call is counted by name.
#[derive(Default)]
pub struct MockApi {
    pub device_lists: Mutex<VecDeque<Result<Vec<DeviceRef>, ApiError>>>,
    pub default_devices: Mutex<Vec<DeviceRef>>,
    pub playlist: Mutex<Vec<PlaylistEntry>>,
    pub start_results: Mutex<VecDeque<Result<(), ApiError>>>,
    pub transport_results: Mutex<VecDeque<Result<(), ApiError>>>,
    pub current: Mutex<Option<PlaybackSnapshot>>,
    pub started: Mutex<Vec<(Vec<String>, String)>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockApi {
    pub fn with_devices(devices: Vec<DeviceRef>) -> Self {
        let api = Self::default();
        *api.default_devices.lock().unwrap() = devices;
        api
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
    }

    fn transport(&self, method: &'static str) -> Result<(), ApiError> {
        self.record(method);
        self.transport_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

#[async_trait]
impl PlaybackApi for MockApi {
    async fn devices(&self, _token: &AccessToken) -> Result<Vec<DeviceRef>, ApiError> {
        self.record("devices");
        let scripted = self.device_lists.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.default_devices.lock().unwrap().clone()))
    }

    async fn playlist_entries(
        &self,
        _token: &AccessToken,
        _playlist_id: &str,
    ) -> Result<Vec<PlaylistEntry>, ApiError> {
        self.record("playlist_entries");
        Ok(self.playlist.lock().unwrap().clone())
    }

    async fn start_playback(
        &self,
        _token: &AccessToken,
        uris: &[String],
        device_id: &str,
    ) -> Result<(), ApiError> {
        self.record("start_playback");
        self.started
            .lock()
            .unwrap()
            .push((uris.to_vec(), device_id.to_string()));
        self.start_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn resume(&self, _token: &AccessToken, _device_id: Option<&str>) -> Result<(), ApiError> {
        self.transport("resume")
    }

    async fn pause(&self, _token: &AccessToken, _device_id: Option<&str>) -> Result<(), ApiError> {
        self.transport("pause")
    }

    async fn next(&self, _token: &AccessToken, _device_id: Option<&str>) -> Result<(), ApiError> {
        self.transport("next")
    }

    async fn previous(&self, _token: &AccessToken, _device_id: Option<&str>) -> Result<(), ApiError> {
        self.transport("previous")
    }

    async fn set_volume(
        &self,
        _token: &AccessToken,
        _percent: u8,
        _device_id: Option<&str>,
    ) -> Result<(), ApiError> {
        self.transport("set_volume")
    }

    async fn transfer_playback(
        &self,
        _token: &AccessToken,
        _device_id: &str,
        _play: bool,
    ) -> Result<(), ApiError> {
        self.transport("transfer_playback")
    }

    async fn current_playback(
        &self,
        _token: &AccessToken,
    ) -> Result<Option<PlaybackSnapshot>, ApiError> {
        self.record("current_playback");
        Ok(self.current.lock().unwrap().clone())
    }
}

pub fn device(id: &str, is_active: bool) -> DeviceRef {
    DeviceRef {
        device_id: id.to_string(),
        name: format!("{id} speaker"),
        is_active,
    }
}

pub fn track(n: usize) -> TrackRef {
    TrackRef {
        id: format!("t{n}"),
        uri: format!("spotify:track:t{n}"),
        name: format!("Track {n}"),
        artist_names: vec!["Artist".to_string()],
        duration_ms: 180_000,
    }
}

pub struct Harness {
    pub api: Arc<MockApi>,
    pub storage: MemoryStorage,
    pub clock: ManualClock,
    pub controller: PlaybackController,
}

impl Harness {
    pub fn new(api: MockApi) -> Self {
        let api = Arc::new(api);
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(epoch());
        let controller = PlaybackController::new(
            api.clone(),
            Arc::new(storage.clone()),
            Arc::new(clock.clone()),
        );
        Self {
            api,
            storage,
            clock,
            controller,
        }
    }

    /// A harness with a one-hour token already armed
    pub async fn armed(api: MockApi) -> Self {
        let harness = Self::new(api);
        harness
            .controller
            .arm(AccessToken::new("tok1", epoch() + Duration::hours(1)))
            .await;
        harness
    }

    pub async fn with_playlist(api: MockApi, len: usize) -> Self {
        *api.playlist.lock().unwrap() = (0..len)
            .map(|n| PlaylistEntry {
                track: Some(track(n)),
            })
            .collect();
        let harness = Self::armed(api).await;
        harness.controller.load_playlist("pl1").await.unwrap();
        harness
    }
}
