use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

use reverser::{Canceller, Pacing, ReverseConfig, Reverser};

#[derive(Parser, Debug)]
#[command(name = "reverser")]
#[command(about = "Reverse the picture and sound of a video clip")]
struct Args {
    /// Clip to reverse
    input: PathBuf,

    /// Directory the reversed clip is published to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How produced frames are timestamped
    #[arg(long, value_enum)]
    pacing: Option<Pacing>,

    /// Draw a progress bar over the reversed video
    #[arg(long)]
    progress_bar: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    configure_tracing(args.verbose)?;

    let mut config = match &args.config {
        Some(path) => ReverseConfig::load(path)?,
        None => ReverseConfig::default(),
    };
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(pacing) = args.pacing {
        config.pacing = pacing;
    }
    config.progress_bar |= args.progress_bar;

    let canceller = Canceller::new();
    let cancel = canceller.flag();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            canceller.cancel();
        }
    });

    let outcome = Reverser::new(config)
        .reverse(&args.input, cancel)
        .await
        .with_context(|| format!("Failed to reverse {}", args.input.display()))?;

    info!(
        frames = outcome.video.frames_produced,
        audio_samples = outcome.merge.audio_samples,
        "done"
    );
    println!("{}", outcome.output.display());
    Ok(())
}

fn configure_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))
}
