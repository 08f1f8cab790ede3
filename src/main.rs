use std::path::PathBuf;

use logfetcher::init_observability;
use logfetcher::Connection;
use logfetcher::Error;
use logfetcher::FnSink;
use logfetcher::Result;
use logfetcher::Settings;
use logfetcher::TailHandler;
use logfetcher::TailRequest;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::error;
use tracing::info;

const USAGE: &str = "usage: logfetcher <path> [lines]";

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    // Initializing Logs
    let _guard = init_observability(&settings.log)?;

    let (path, line_offset) = parse_args(std::env::args().skip(1))?;

    let handler = TailHandler::new(settings.tail.clone())?;
    let connection = Connection::new();

    let stdout = FnSink(|line: String| -> Result<()> {
        println!("{line}");
        Ok(())
    });
    let request = TailRequest::new(path, stdout).with_line_offset(line_offset);

    let ack = handler.tail(request, &connection).await?;
    info!(
        path = %ack.path.display(),
        replayed = ack.replayed,
        "Tailing started. Waiting for CTRL+C signal..."
    );

    // Listen on Shutdown Signal
    if let Err(e) = graceful_shutdown().await {
        error!("Failed to listen for shutdown: {:?}", e);
    }

    handler.disconnect(&connection);
    handler.shutdown();

    info!("Exiting program.");
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<(PathBuf, usize)> {
    let path = args.next().ok_or_else(|| Error::InvalidConfig(USAGE.into()))?;
    let line_offset = match args.next() {
        Some(n) => n
            .parse::<usize>()
            .map_err(|e| Error::InvalidConfig(format!("invalid line count {n:?}: {e}. {USAGE}")))?,
        None => 0,
    };
    if args.next().is_some() {
        return Err(Error::InvalidConfig(USAGE.into()));
    }
    Ok((PathBuf::from(path), line_offset))
}

async fn graceful_shutdown() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown completed");
    Ok(())
}
