//! `strata watch`: load with hot reload and report each reload.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use strata_config::{Config, LoadOptions, WatchCallback};
use strata_core::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub(super) async fn cmd_watch(cfg: Config, entry: &Path, options: LoadOptions) -> Result<()> {
    let token = CancellationToken::new();
    let reloads = Arc::new(AtomicU64::new(0));

    let callback: WatchCallback = {
        let cfg = cfg.clone();
        let reloads = Arc::clone(&reloads);
        Arc::new(move |event: &notify::Event| {
            let n = reloads.fetch_add(1, Ordering::Relaxed) + 1;
            let changed: Vec<String> = event
                .paths
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            println!(
                "reload #{n}: {} ({} keys)",
                changed.join(", "),
                cfg.all_keys().len()
            );
        })
    };

    let options = options
        .with_watch(Some(callback))
        .with_cancel_token(token.clone());
    cfg.load_from_file(entry, &options)?;
    println!(
        "watching {} ({} keys), press Ctrl-C to stop",
        entry.display(),
        cfg.all_keys().len()
    );

    tokio::signal::ctrl_c().await?;
    token.cancel();
    info!(reloads = reloads.load(Ordering::Relaxed), "stopped watching config");
    Ok(())
}
