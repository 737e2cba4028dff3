//! PictoNote Application
//!
//! Terminal shell around the core: command-line configuration, the poll
//! loop that drives the transport, and a PNG sink for received notes.

mod app;
mod config;
mod sink;

pub use app::{App, AppError, LineOutcome, spawn_stdin_reader};
pub use config::{AppConfig, CliArgs, ConfigError, DEFAULT_SERVER_URL, default_save_dir};
pub use sink::{PngSink, SinkError};
