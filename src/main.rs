use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use url::Url;

use spotify_widget::auth::HttpTokenEndpoint;
use spotify_widget::logging;
use spotify_widget::model::{FileStorage, SpotifyClient, SystemClock};
use spotify_widget::{AuthSession, CallbackParams, Config, PlaybackController};

const HELP: &str = "commands: play [uri] | track <n> | pause | resume | next | prev | \
vol <0-100> | device | transfer <id> | sync | list | status | logout | quit";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::from_env());

    let _log_guard = match logging::init_logging(&config.log_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("=== Spotify widget starting ===");

    let storage = Arc::new(
        FileStorage::open(config.session_file())
            .await
            .context("opening session storage")?,
    );
    let clock = Arc::new(SystemClock);
    let endpoint = Arc::new(HttpTokenEndpoint::new(&config)?);
    let auth = AuthSession::new(config.clone(), storage.clone(), endpoint, clock.clone());
    let controller = PlaybackController::new(Arc::new(SpotifyClient::new()), storage, clock);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if !login(&auth, &controller, &config, &mut lines).await? {
        tracing::info!("Spotify widget shutting down before login");
        return Ok(());
    }

    println!("{HELP}");
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let arg = words.next();

        let result = match (command, arg) {
            ("quit" | "exit", _) => break,
            ("help", _) => {
                println!("{HELP}");
                Ok(())
            }
            ("play", uri) => controller.play(uri, None).await,
            ("track", Some(n)) => match n.parse::<usize>() {
                Ok(index) => controller.play_index(index).await,
                Err(_) => {
                    println!("track needs an index");
                    Ok(())
                }
            },
            ("pause", _) => controller.pause().await,
            ("resume", _) => controller.resume().await,
            ("next", _) => controller.skip_next().await,
            ("prev", _) => controller.skip_previous().await,
            ("vol", Some(v)) => match v.parse::<i32>() {
                Ok(percent) => controller.set_volume(percent).await,
                Err(_) => {
                    println!("vol needs a number");
                    Ok(())
                }
            },
            ("device", _) => controller.resolve_active_device().await.map(|device| match device {
                Some(d) => println!("{} ({})", d.name, d.device_id),
                None => println!("no device"),
            }),
            ("transfer", Some(id)) => controller.transfer_playback(id, true).await,
            ("sync", _) => controller.sync_state().await.map(|s| println!("{s:?}")),
            ("list", _) => {
                let current = controller.track_index().await;
                for (i, track) in controller.queue().await.iter().enumerate() {
                    let marker = if i == current { ">" } else { " " };
                    println!("{marker} {i:>3} {} - {}", track.artists(), track.name);
                }
                Ok(())
            }
            ("status", _) => {
                print_status(&controller).await;
                Ok(())
            }
            ("logout", _) => {
                controller.logout().await;
                auth.logout().await?;
                if !login(&auth, &controller, &config, &mut lines).await? {
                    break;
                }
                Ok(())
            }
            _ => {
                println!("{HELP}");
                Ok(())
            }
        };

        match result {
            Ok(()) => print_status(&controller).await,
            Err(e) if e.is_unauthenticated() => {
                println!("session ended: {e}");
                if !login(&auth, &controller, &config, &mut lines).await? {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(command, error = %e, "Command failed");
                println!("error: {e}");
            }
        }
    }

    tracing::info!("Spotify widget shutting down");
    Ok(())
}

/// Reuse a stored token or walk the user through the redirect. Returns
/// false when stdin closed before a login finished.
async fn login(
    auth: &AuthSession,
    controller: &PlaybackController,
    config: &Config,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<bool> {
    let token = loop {
        if let Some(token) = auth.access_token().await {
            break token;
        }

        controller.mark_authenticating().await;
        let url = auth.begin_login().await?;
        println!("Open this URL to log in:\n\n{url}\n");
        println!("Then paste the URL you were redirected to:");

        let Some(line) = lines.next_line().await? else {
            return Ok(false);
        };
        let redirected = match Url::parse(line.trim()) {
            Ok(url) => url,
            Err(e) => {
                println!("not a URL: {e}");
                continue;
            }
        };

        match auth.complete_login(&CallbackParams::from_url(&redirected)).await {
            Ok(token) => break token,
            Err(e) => {
                controller.logout().await;
                println!("login failed: {e}");
            }
        }
    };

    controller.arm(token).await;
    if let Err(e) = controller.resolve_active_device().await {
        tracing::warn!(error = %e, "Device lookup failed");
    }

    if let Some(playlist_id) = &config.playlist_id {
        match controller.load_playlist(playlist_id).await {
            Ok(_) => {
                let shuffled = controller.shuffled_playlist().await;
                println!("playlist ready: {} tracks", shuffled.len());
            }
            Err(e) => println!("could not load playlist: {e}"),
        }
    }

    print_status(controller).await;
    Ok(true)
}

async fn print_status(controller: &PlaybackController) {
    let snapshot = controller.snapshot().await;
    println!(
        "[{}] track: {} device: {}",
        controller.status().await,
        snapshot.current_track.as_deref().unwrap_or("-"),
        controller.device_id().await.as_deref().unwrap_or("-"),
    );
}
