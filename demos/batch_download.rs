//! List a podcast feed, select every episode, and download the batch with
//! live progress on stdout.
//!
//! Usage:
//!   cargo run --example batch_download -- <source-url> [download-dir]
//!
//! The source URL may be an Apple Podcasts page URL or a direct RSS/Atom
//! feed URL.

use std::io::Write;
use std::sync::Arc;
use stream_harvester::{
    BatchState, Config, DownloadCoordinator, HttpFetcher, ProviderRegistry, SelectionModel,
    utils::format_duration,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let source_url = args
        .next()
        .ok_or("usage: batch_download <source-url> [download-dir]")?;

    let mut config = Config::default();
    if let Some(dir) = args.next() {
        config.download.download_dir = dir.into();
    }

    println!("listing {source_url} ...");
    let registry = ProviderRegistry::with_default_providers()?;
    let episodes = registry.list(&source_url).await?;
    println!("found {} episodes:", episodes.len());
    for episode in &episodes {
        let duration = episode
            .duration
            .map(format_duration)
            .unwrap_or_else(|| "??:??".to_string());
        println!("  [{duration}] {}", episode.title);
    }

    let mut selection = SelectionModel::new();
    selection.set_episodes(episodes);
    selection.select_all();
    let tasks = selection.build_tasks(&config.download.download_dir);

    let fetcher = Arc::new(HttpFetcher::new(&config.network)?);
    let coordinator = DownloadCoordinator::new(config, fetcher);
    let mut progress = coordinator.progress();

    let handle = coordinator.start_batch(tasks).await?;

    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow().clone();
            print!("\r{}        ", snapshot.status_line());
            std::io::stdout().flush().ok();
            if snapshot.state == BatchState::Finished {
                break;
            }
        }
        println!();
    });

    let summary = handle.wait().await?;
    reporter.await?;

    println!(
        "{} succeeded, {} failed, {} cancelled (of {})",
        summary.succeeded, summary.failed, summary.cancelled, summary.total
    );
    Ok(())
}
