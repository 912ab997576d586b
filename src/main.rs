mod cli;
mod crypto;
mod error;
mod network;
mod progress;
mod protocol;
mod session;
mod transfer;

use anyhow::Result;
use cli::Cli;
use session::Session;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    tracing::debug!(
        ip = %cli.ip,
        port = cli.port,
        file = %cli.file.display(),
        spiffs = cli.spiffs,
        auth = cli.auth.is_some(),
        "options"
    );

    let mut session = Session::new(cli.request(), cli.session_config());
    let outcome = session.run().await;
    tracing::debug!(state = %session.state(), "session ended");
    let summary = outcome?;

    println!(
        "✓ Uploaded {} bytes in {} chunks to {}",
        summary.bytes_sent, summary.chunks_sent, summary.device
    );

    Ok(())
}

/// `RUST_LOG` wins; otherwise warnings only, or everything with `--debug`
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}
