use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use tts_mcp::config::AUTO_ENGINE;
use tts_mcp::server::Server;
use tts_mcp::{Config, PlaybackController, Quality, Router};

#[derive(Parser, Debug)]
#[command(name = "tts-mcp")]
#[command(version, about = "Local text-to-speech tools over MCP stdio", long_about = None)]
struct Args {
    /// Directory for synthesized audio files
    #[arg(long, env = "TTS_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for generated engine scripts
    #[arg(long, env = "TTS_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Engine used when a request names none: kokoro, system or auto
    #[arg(long, env = "TTS_DEFAULT_ENGINE", default_value = AUTO_ENGINE)]
    default_engine: String,

    /// Quality recorded when a request names none: fast, balanced or high
    #[arg(long, env = "TTS_DEFAULT_QUALITY", default_value = "balanced")]
    default_quality: Quality,

    /// Python interpreter to try first for Kokoro
    #[arg(long, env = "TTS_PYTHON_PATH")]
    python_path: Option<PathBuf>,

    /// Override for the native speech command (say / espeak-ng)
    #[arg(long, env = "TTS_NATIVE_COMMAND")]
    native_command: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            temp_dir: self.temp_dir.unwrap_or(defaults.temp_dir),
            default_engine: self.default_engine,
            default_quality: self.default_quality,
            python_path: self.python_path,
            native_command: self.native_command,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol, so logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = Args::parse().into_config();
    config.ensure_dirs()?;
    log::info!(
        "Writing audio to {} (default engine: {})",
        config.output_dir.display(),
        config.default_engine
    );

    let router = Arc::new(Router::with_default_engines(&config));
    router.initialize_all().await;

    let server = Arc::new(Server::new(
        router,
        Arc::new(PlaybackController::new()),
        config.default_quality,
    ));
    server.serve().await?;
    Ok(())
}
