//! Debounced watch-and-regenerate loop.
//!
//! ```text
//!            tracked event, >= 1s since last accept
//!   ┌──────┐ ─────────────────────────────────────▶ ┌──────────┐
//!   │ Idle │                                        │ Cooldown │── tracked event < 1s: dropped
//!   └──────┘ ◀───────────── 1s elapses ──────────── └──────────┘
//! ```
//!
//! Accepting an event reloads the specification, regenerates the zone set
//! and triggers a nameserver reload. Events are drained one at a time from a
//! channel, so regenerations never overlap. Edits dropped during the
//! cooldown are not replayed. The window starts when an event is accepted,
//! even if that cycle then fails: an editor that truncates the file before
//! writing it can trigger a failed parse of the empty file, and the write
//! that follows within the window is dropped. Replace the file atomically
//! (write elsewhere, then rename) to avoid this.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::WatchdogError;
use crate::generator::{GenerationReport, ZoneSetGenerator};
use crate::metrics::{self, WatchEventOutcome};
use crate::reload::{self, ReloadTrigger};
use crate::source;

/// Minimum spacing between accepted events.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Debounce state at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// The next tracked event will be accepted.
    Idle,
    /// An event was accepted less than one window ago.
    Cooldown,
}

/// Accepts at most one event per window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    /// Create a debouncer with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// State as of `now`.
    pub fn state(&self, now: Instant) -> DebounceState {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) < self.window => {
                DebounceState::Cooldown
            }
            _ => DebounceState::Idle,
        }
    }

    /// Accept an event arriving at `now`, recording it, or reject it if
    /// still cooling down.
    pub fn try_accept(&mut self, now: Instant) -> bool {
        if self.state(now) == DebounceState::Cooldown {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

/// What happened to one filesystem event.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Not a modification of the tracked file.
    Ignored,
    /// Arrived during the cooldown window.
    Debounced,
    /// Zone set regenerated.
    Regenerated(GenerationReport),
    /// The cycle failed; the previous output may still be in place.
    Failed(WatchdogError),
}

/// Watches one specification file and regenerates on change.
pub struct ChangeWatcher {
    tracked: PathBuf,
    generator: ZoneSetGenerator,
    reload: Box<dyn ReloadTrigger>,
    debouncer: Debouncer,
}

impl ChangeWatcher {
    /// Create a watcher for `tracked`.
    pub fn new(
        tracked: impl Into<PathBuf>,
        generator: ZoneSetGenerator,
        reload: Box<dyn ReloadTrigger>,
    ) -> Self {
        Self {
            tracked: tracked.into(),
            generator,
            reload,
            debouncer: Debouncer::default(),
        }
    }

    /// Override the debounce window.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debouncer = Debouncer::new(window);
        self
    }

    /// The file being watched.
    pub fn tracked_path(&self) -> &Path {
        &self.tracked
    }

    /// Debounce state as of `now`.
    pub fn state(&self, now: Instant) -> DebounceState {
        self.debouncer.state(now)
    }

    /// Handle a raw notify event received at `now`.
    pub fn handle_event(&mut self, event: &Event, now: Instant) -> CycleOutcome {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            trace!(kind = ?event.kind, "Ignoring non-modification event");
            metrics::record_watch_event(WatchEventOutcome::Ignored);
            return CycleOutcome::Ignored;
        }

        match event.paths.iter().find(|p| **p == self.tracked) {
            Some(path) => {
                let path = path.clone();
                self.handle_path(&path, now)
            }
            None => {
                trace!(paths = ?event.paths, "Ignoring event for untracked path");
                metrics::record_watch_event(WatchEventOutcome::Ignored);
                CycleOutcome::Ignored
            }
        }
    }

    /// Handle a modification of `path` observed at `now`.
    ///
    /// Paths other than the tracked file never touch the debounce timer.
    pub fn handle_path(&mut self, path: &Path, now: Instant) -> CycleOutcome {
        if path != self.tracked {
            metrics::record_watch_event(WatchEventOutcome::Ignored);
            return CycleOutcome::Ignored;
        }

        if !self.debouncer.try_accept(now) {
            debug!(path = %path.display(), "Change inside debounce window, dropped");
            metrics::record_watch_event(WatchEventOutcome::Debounced);
            return CycleOutcome::Debounced;
        }

        metrics::record_watch_event(WatchEventOutcome::Accepted);
        info!(path = %path.display(), "Zone specification changed, regenerating");

        match self.regenerate() {
            Ok(report) => CycleOutcome::Regenerated(report),
            Err(e) => {
                error!("Regeneration failed, keeping watch: {}", e);
                CycleOutcome::Failed(e)
            }
        }
    }

    fn regenerate(&self) -> Result<GenerationReport, WatchdogError> {
        let timer = metrics::Timer::start();
        let spec = source::load_file(&self.tracked).inspect_err(|e| {
            metrics::record_regeneration_error(e, timer.elapsed());
        })?;
        let report = self.generator.generate_today(&spec)?;
        // Reload failures are logged inside; the zone set stays written.
        let _ = reload::run(self.reload.as_ref());
        Ok(report)
    }

    /// Watch until `shutdown` is cancelled.
    ///
    /// The tracked file's parent directory is watched non-recursively so
    /// editors that replace the file are still observed.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), WatchdogError> {
        let (dir, file_name) = match (self.tracked.parent(), self.tracked.file_name()) {
            (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_os_string()),
            _ => {
                return Err(WatchdogError::Config(format!(
                    "cannot watch {}",
                    self.tracked.display()
                )))
            }
        };
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir
        };
        let dir = dir.canonicalize().map_err(|e| WatchdogError::fs(&dir, e))?;
        self.tracked = dir.join(file_name);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        info!(
            tracked = %self.tracked.display(),
            zone_dir = %self.generator.layout().zone_dir().display(),
            "Watching zone specification"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Watcher received shutdown signal");
                    break;
                }

                msg = rx.recv() => match msg {
                    Some(Ok(event)) => {
                        self.handle_event(&event, Instant::now());
                    }
                    Some(Err(e)) => {
                        warn!("File watch error: {}", e);
                    }
                    None => {
                        warn!("File watch channel closed");
                        break;
                    }
                }
            }
        }

        drop(watcher);
        info!("Watcher stopped");
        Ok(())
    }
}
