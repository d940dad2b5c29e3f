//! Filesystem subscription behind watch-reload.
//!
//! The parent directory of every watched file is watched non-recursively so
//! editors that save through a temp file and rename are still seen; events
//! are then filtered down to the watched files and coalesced per burst.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use strata_core::{Result, StrataError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How often the event loop checks for cancellation while idle.
const CANCEL_POLL: Duration = Duration::from_millis(200);

/// Quiet period that ends a burst of change events.
const COALESCE_QUIET: Duration = Duration::from_millis(100);

/// Upper bound on one burst, so a file rewritten continuously still reloads.
const COALESCE_MAX: Duration = Duration::from_secs(1);

/// What the event loop does after handling one change.
#[derive(Debug)]
pub enum WatchControl {
    Continue,
    /// Switch the subscription to a new file set.
    Retarget(Vec<PathBuf>),
    Stop,
}

/// Watch `paths` on a background thread, calling `on_change` for every
/// create/modify event naming one of them.
///
/// Returns once the OS-level watch is armed. The loop runs until `cancel`
/// fires or `on_change` returns [`WatchControl::Stop`].
pub fn spawn<F>(paths: &[PathBuf], cancel: CancellationToken, on_change: F) -> Result<()>
where
    F: FnMut(&Event) -> WatchControl + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)
        .map_err(|e| StrataError::Watch(format!("create watcher: {e}")))?;

    let mut target = WatchTarget::default();
    target.retarget(&mut watcher, paths)?;
    debug!(files = ?paths, "watching config files");

    std::thread::Builder::new()
        .name("strata-watch".into())
        .spawn(move || event_loop(watcher, rx, target, cancel, on_change))
        .map_err(|e| StrataError::Watch(format!("spawn watch thread: {e}")))?;

    Ok(())
}

fn event_loop<F>(
    mut watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    mut target: WatchTarget,
    cancel: CancellationToken,
    mut on_change: F,
) where
    F: FnMut(&Event) -> WatchControl,
{
    while !cancel.is_cancelled() {
        let event = match rx.recv_timeout(CANCEL_POLL) {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                warn!(error = %e, "file watcher error");
                continue;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if !target.matches(&event) {
            continue;
        }

        let (event, disconnected) = coalesce(&rx, &target, event);
        if cancel.is_cancelled() {
            break;
        }

        match on_change(&event) {
            WatchControl::Continue => {}
            WatchControl::Retarget(paths) => {
                if let Err(e) = target.retarget(&mut watcher, &paths) {
                    warn!(error = %e, "failed to retarget config watch");
                }
            }
            WatchControl::Stop => break,
        }
        if disconnected {
            break;
        }
    }
    debug!("config watch stopped");
}

/// Absorb the rest of a burst that started with `first`, returning the last
/// matching event. The burst ends after [`COALESCE_QUIET`] without a
/// matching event, or after [`COALESCE_MAX`] in total.
fn coalesce(
    rx: &Receiver<notify::Result<Event>>,
    target: &WatchTarget,
    first: Event,
) -> (Event, bool) {
    let started = Instant::now();
    let mut last = first;
    let mut absorbed = 0usize;

    while started.elapsed() < COALESCE_MAX {
        match rx.recv_timeout(COALESCE_QUIET) {
            Ok(Ok(event)) if target.matches(&event) => {
                last = event;
                absorbed += 1;
            }
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => return (last, true),
        }
    }
    if absorbed > 0 {
        debug!(absorbed, "coalesced config change events");
    }
    (last, false)
}

#[derive(Debug, Default)]
struct WatchTarget {
    dirs: HashSet<PathBuf>,
    /// Chain files as given, plus the same files under their canonical
    /// parent directory, since some backends report resolved paths.
    files: HashSet<PathBuf>,
}

impl WatchTarget {
    fn retarget(&mut self, watcher: &mut impl Watcher, paths: &[PathBuf]) -> Result<()> {
        let dirs: HashSet<PathBuf> = paths.iter().map(|p| parent_dir(p)).collect();

        for dir in dirs.difference(&self.dirs) {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| StrataError::Watch(format!("watch {}: {e}", dir.display())))?;
        }
        for stale in self.dirs.difference(&dirs) {
            if let Err(e) = watcher.unwatch(stale) {
                debug!(dir = %stale.display(), error = %e, "unwatch failed");
            }
        }

        self.dirs = dirs;
        self.files = tracked_paths(paths);
        Ok(())
    }

    fn matches(&self, event: &Event) -> bool {
        let relevant_kind = match event.kind {
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(_) | EventKind::Create(_) => true,
            _ => false,
        };
        relevant_kind && event.paths.iter().any(|p| self.files.contains(p))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn tracked_paths(paths: &[PathBuf]) -> HashSet<PathBuf> {
    let mut files = HashSet::new();
    for path in paths {
        files.insert(path.clone());
        let canonical = std::fs::canonicalize(parent_dir(path))
            .ok()
            .zip(path.file_name())
            .map(|(dir, name)| dir.join(name));
        if let Some(canonical) = canonical {
            files.insert(canonical);
        }
    }
    files
}
