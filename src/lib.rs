//! Authentication and playback core of the music widget
//!
//! - `auth`: PKCE login against the accounts service
//! - `controller`: remote playback over the Web API
//! - `model`: session data, storage and provider seams
//! - `config`, `logging`, `error`: ambient plumbing

pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod model;

pub use auth::{AuthSession, CallbackParams};
pub use config::Config;
pub use controller::{PlaybackController, PlayerEvent};
pub use error::{AuthError, Error, PlaybackError, Result, ValidationError};
