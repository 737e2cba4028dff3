//! Command-line arguments and application configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use pictonote_core::sync::{DEFAULT_RECONNECT_DELAY, parse_endpoint};
use pictonote_core::{
    ComposeError, SettingsError, SurfaceSize, Swatch, TransportError, UserSettings,
};
use thiserror::Error;
use url::Url;

/// Relay used when none is configured.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server URL: {0}")]
    Url(#[from] TransportError),
    #[error("Invalid surface: {0}")]
    Surface(#[from] ComposeError),
    #[error("Invalid user settings: {0}")]
    Settings(#[from] SettingsError),
}

/// Command-line arguments for pictonote.
#[derive(Debug, Clone, Parser)]
#[command(name = "pictonote")]
#[command(about = "Sticky-note chat client: type lines, send them as drawn notes")]
#[command(version)]
pub struct CliArgs {
    /// Relay WebSocket URL (plain ws://)
    #[arg(long, env = "PICTONOTE_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server_url: String,

    /// Display name shown to other participants
    #[arg(long, env = "PICTONOTE_NAME")]
    pub name: String,

    /// Channel to join
    #[arg(long, env = "PICTONOTE_CHANNEL", default_value = "A")]
    pub channel: String,

    /// Palette colour as a hex swatch (e.g. #ff0000)
    #[arg(long, env = "PICTONOTE_COLOR", default_value_t = Swatch::default())]
    pub color: Swatch,

    /// Compose surface width in pixels
    #[arg(long, default_value_t = 400)]
    pub width: u32,

    /// Compose surface height in pixels (multiple of 5)
    #[arg(long, default_value_t = 180)]
    pub height: u32,

    /// Delay before reconnecting, in milliseconds
    #[arg(long, env = "PICTONOTE_RECONNECT_MS", default_value_t = 500)]
    pub reconnect_ms: u64,

    /// Directory received notes are saved to as PNG
    #[arg(long, env = "PICTONOTE_SAVE_DIR")]
    pub save_dir: Option<PathBuf>,

    /// Do not save received notes
    #[arg(long)]
    pub no_save: bool,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_url: String,
    pub name: String,
    pub channel: String,
    pub color: Swatch,
    pub surface: SurfaceSize,
    pub reconnect_delay: Duration,
    /// Where received notes are written. `None` disables saving.
    pub save_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            name: "guest".to_string(),
            channel: "A".to_string(),
            color: Swatch::default(),
            surface: SurfaceSize::default(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            save_dir: default_save_dir(),
        }
    }
}

impl From<CliArgs> for AppConfig {
    fn from(args: CliArgs) -> Self {
        let save_dir = if args.no_save {
            None
        } else {
            args.save_dir.or_else(default_save_dir)
        };
        Self {
            server_url: args.server_url,
            name: args.name,
            channel: args.channel,
            color: args.color,
            surface: SurfaceSize::new(args.width, args.height),
            reconnect_delay: Duration::from_millis(args.reconnect_ms),
            save_dir,
        }
    }
}

impl AppConfig {
    /// Check the configuration and derive the relay URL and user settings.
    pub fn validate(&self) -> Result<(Url, UserSettings), ConfigError> {
        let url = parse_endpoint(&self.server_url)?;
        self.surface.validate()?;
        let settings = UserSettings::new(&self.name, &self.channel, self.color)?;
        Ok((url, settings))
    }
}

/// Default directory for received notes.
///
/// On Unix: `~/.local/share/pictonote/received/`
/// On Windows: `%LOCALAPPDATA%\pictonote\received\`
pub fn default_save_dir() -> Option<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|base| base.join("pictonote").join("received"))
}
