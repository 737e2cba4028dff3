//! Main application entry point.

use clap::Parser;
use pictonote_app::{App, AppConfig, CliArgs, spawn_stdin_reader};
use pictonote_core::NativeConnector;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from(CliArgs::parse());
    log::info!(
        "Starting PictoNote as {} on channel {} via {}",
        config.name,
        config.channel,
        config.server_url
    );

    App::new(config, NativeConnector)?.run(spawn_stdin_reader())?;
    Ok(())
}
