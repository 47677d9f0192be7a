//! Polling watcher.
//!
//! Each tick pings connected clients, finds the newest file modification
//! time under the watched directories and rebuilds when it is newer than the
//! last build.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use walkdir::WalkDir;

use mortar_static::{BuildError, BuildReport, StaticBuilder};

use crate::events::{LiveEvent, LiveHub};

/// Name of the file that persists the last-seen modification time.
pub const STATE_FILE: &str = ".modified_time";

/// Something the watcher can rebuild.
pub trait Rebuild {
    fn rebuild(&self) -> Result<BuildReport, BuildError>;
}

impl Rebuild for StaticBuilder {
    fn rebuild(&self) -> Result<BuildReport, BuildError> {
        self.build()
    }
}

/// Timestamps tracked between ticks (unix seconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchState {
    /// Newest modification time seen so far
    pub last_modified: u64,

    /// Modification time the last build covered
    pub last_run: u64,
}

/// Plain-text file holding the last-seen modification time.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored timestamp, writing `0` first if the file is absent.
    pub fn load_or_init(&self) -> io::Result<u64> {
        if !self.path.exists() {
            self.store(0)?;
            return Ok(0);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content.trim().parse().unwrap_or(0))
    }

    pub fn store(&self, timestamp: u64) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, timestamp.to_string())
    }
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing newer than the last build
    Idle,

    /// Rebuilt successfully
    Built { timestamp: u64, pages: usize },

    /// Rebuild failed; timestamps still advanced
    Failed { timestamp: u64, error: String },
}

/// Polling watcher.
pub struct Watcher<R> {
    builder: R,
    dirs: Vec<PathBuf>,
    state_file: StateFile,
    state: WatchState,
    interval: Duration,
}

impl<R: Rebuild> Watcher<R> {
    /// Create a watcher over `dirs`.
    pub fn new(builder: R, dirs: Vec<PathBuf>, state_file: StateFile, interval: Duration) -> Self {
        Self {
            builder,
            dirs,
            state_file,
            state: WatchState::default(),
            interval,
        }
    }

    /// Replace the tracked timestamps.
    pub fn with_state(mut self, state: WatchState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Initial build on start.
    ///
    /// Restores the last-seen time from the state file and marks "now" as
    /// the last build, so only later edits trigger a rebuild.
    pub fn prime(&mut self) -> Result<BuildReport, BuildError> {
        match self.state_file.load_or_init() {
            Ok(timestamp) => self.state.last_modified = timestamp,
            Err(e) => tracing::warn!(
                "Couldn't read state file {}: {}",
                self.state_file.path().display(),
                e
            ),
        }

        let result = self.builder.rebuild();
        self.state.last_run = unix_now();
        result
    }

    /// Run one poll cycle.
    pub fn tick(&mut self, hub: &LiveHub) -> TickOutcome {
        hub.send(LiveEvent::Ping);

        let exclude = OsStr::new(STATE_FILE);
        let newest = self
            .dirs
            .iter()
            .map(|dir| directory_mtime(dir, exclude))
            .max()
            .unwrap_or(0);

        if newest > self.state.last_modified {
            self.state.last_modified = newest;
        }

        if self.state.last_modified <= self.state.last_run {
            return TickOutcome::Idle;
        }

        let timestamp = self.state.last_modified;
        tracing::info!("Change detected, rebuilding");

        let result = self.builder.rebuild();

        self.state.last_run = timestamp;
        if let Err(e) = self.state_file.store(timestamp) {
            tracing::warn!(
                "Couldn't write state file {}: {}",
                self.state_file.path().display(),
                e
            );
        }

        match result {
            Ok(report) => {
                tracing::info!(
                    "Rebuilt {} pages in {}ms",
                    report.pages,
                    report.duration_ms
                );
                hub.send(LiveEvent::BuildComplete { timestamp });
                TickOutcome::Built {
                    timestamp,
                    pages: report.pages,
                }
            }
            Err(e) => {
                tracing::error!("Rebuild failed: {}", e);
                TickOutcome::Failed {
                    timestamp,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Tick until `stop` is set, sleeping the configured interval between
    /// ticks.
    pub fn run(mut self, hub: &LiveHub, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.tick(hub);
            thread::sleep(self.interval);
        }
        tracing::debug!("Watcher stopped");
    }
}

impl<R: Rebuild + Send + 'static> Watcher<R> {
    /// Run the watcher on its own thread.
    pub fn spawn(self, hub: LiveHub, stop: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("mortar-watch".to_string())
            .spawn(move || self.run(&hub, &stop))
    }
}

/// Newest modification time (unix seconds) of any file under `dir`,
/// skipping files named `exclude`. Unreadable entries are ignored; an empty
/// or missing directory yields 0.
pub fn directory_mtime(dir: &Path, exclude: &OsStr) -> u64 {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry under {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && entry.file_name() != exclude)
        .filter_map(|entry| entry.metadata().ok()?.modified().ok())
        .filter_map(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs())
        .max()
        .unwrap_or(0)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
