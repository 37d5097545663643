//! Runtime configuration with environment overrides

use std::env;
use std::path::PathBuf;

use url::Url;

const SPOTIFY_CLIENT_ID: &str = "492e1e45ea814fa3ac555fe1576aaf5b";
const SPOTIFY_REDIRECT_URI: &str = "http://127.0.0.1:8898/callback";
const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SCOPES: &str =
    "streaming user-read-email user-read-private user-read-playback-state user-modify-playback-state";

const CACHE: &str = ".cache";
const LOGS: &str = ".logs";
const SESSION_FILE: &str = "session.json";

#[derive(Clone, Debug)]
pub struct Config {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: Url,
    pub token_url: Url,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub playlist_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: SPOTIFY_CLIENT_ID.to_string(),
            redirect_uri: SPOTIFY_REDIRECT_URI.to_string(),
            scopes: split_scopes(SCOPES),
            authorize_url: Url::parse(AUTHORIZE_URL).expect("authorize url constant"),
            token_url: Url::parse(TOKEN_URL).expect("token url constant"),
            cache_dir: PathBuf::from(CACHE),
            log_dir: PathBuf::from(LOGS),
            playlist_id: None,
        }
    }
}

impl Config {
    /// Defaults overridden by `SPOTIFY_*` / `WIDGET_*` variables. A `.env`
    /// file in the working directory is loaded first when present.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }

        let mut config = Self::default();
        if let Ok(client_id) = env::var("SPOTIFY_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Ok(redirect_uri) = env::var("SPOTIFY_REDIRECT_URI") {
            config.redirect_uri = redirect_uri;
        }
        if let Ok(scopes) = env::var("SPOTIFY_SCOPES") {
            config.scopes = split_scopes(&scopes);
        }
        if let Ok(playlist_id) = env::var("SPOTIFY_PLAYLIST_ID") {
            config.playlist_id = Some(playlist_id).filter(|id| !id.is_empty());
        }
        if let Ok(dir) = env::var("WIDGET_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("WIDGET_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn session_file(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

fn split_scopes(scopes: &str) -> Vec<String> {
    scopes.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scope_is_space_joined() {
        let config = Config::default();
        assert!(config.scope().starts_with("streaming "));
        assert!(config.scopes.iter().any(|s| s == "user-modify-playback-state"));
        assert_eq!(config.session_file(), PathBuf::from(".cache/session.json"));
    }
}
