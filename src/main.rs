mod app;
mod host;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use app::App;
use mangaflow::ReaderOptions;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mangaflow=info".parse().context("Invalid log directive")?),
        )
        .with_writer(std::io::stderr)
        .init();

    let dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("Usage: mangaflow <chapter-directory>")?;

    let options = ReaderOptions::from_env();
    let workers = host::probe::workers_from_env();
    info!(?dir, ?options, workers, "Starting reader");

    // The reader is single-threaded; keep everything on this thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    runtime.block_on(async {
        let mut app = App::new(&dir, options, workers)?;
        app.run().await
    })
}
