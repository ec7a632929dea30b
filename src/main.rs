use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod display;
mod error;
mod filters;
mod server;
mod session;
mod source;

#[derive(Parser, Debug)]
#[command(name = "imgtune")]
#[command(about = "Denoise and sharpen images with a side-by-side preview")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "IMGTUNE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "IMGTUNE_PORT", default_value = "9393")]
    pub port: u16,

    /// Width of each preview pane in pixels
    #[arg(long, env = "IMGTUNE_FRAME_WIDTH", default_value = "400",
          value_parser = clap::value_parser!(u32).range(1..))]
    pub frame_width: u32,

    /// Height of each preview pane in pixels
    #[arg(long, env = "IMGTUNE_FRAME_HEIGHT", default_value = "400",
          value_parser = clap::value_parser!(u32).range(1..))]
    pub frame_height: u32,

    /// Maximum image size in bytes for uploads, files and URLs (default: 50MB)
    #[arg(long, env = "IMGTUNE_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Directory for relative save paths (defaults to the user's pictures folder)
    #[arg(long, env = "IMGTUNE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from(args);

    tracing::info!("Starting imgtune v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Preview frames {}x{}, saving to {}",
        config.frame_width,
        config.frame_height,
        config.output_dir.display()
    );

    server::run(config).await
}
