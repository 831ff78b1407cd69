//! Debounced file watching that maps changes to task series.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use derive_more::Debug;
use notify::{Config, Event, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher as _};
use rustc_hash::FxHashSet;

use crate::error::{Chainable, Result};
use crate::glob::Globs;

/// A set of globs and the task series to run when a matching file changes.
#[derive(Debug, Clone)]
pub struct WatchRule {
    /// Globs relative to the project root.
    pub globs: Globs,
    pub series: Vec<String>,
    /// Whether browsers should reload once the series finishes.
    pub reload: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Poll for changes instead of relying on OS notifications.
    pub poll: bool,
    pub poll_interval: Duration,
    /// How long the tree must be quiet before a batch of changes fires.
    pub debounce: Duration,
}

/// Changes seen since the last batch fired.
#[derive(Debug)]
pub struct WatchState {
    pending: FxHashSet<PathBuf>,
    last_change: Option<Instant>,
    debounce: Duration,
}

/// A running watch. Stops when dropped.
#[derive(Debug)]
pub struct Watcher {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    #[debug(ignore)]
    _inner: Box<dyn notify::Watcher>,
}

impl WatchRule {
    pub fn new<I, S, T>(globs: I, series: T, reload: bool) -> Result<Self>
        where I: IntoIterator<Item = S>, S: AsRef<str>, T: IntoIterator, T::Item: Into<String>
    {
        let series = series.into_iter().map(Into::into).collect();
        Ok(WatchRule { globs: Globs::new(globs)?, series, reload })
    }

    /// Whether any of the root-relative `changed` paths matches.
    pub fn matches(&self, changed: &[PathBuf]) -> bool {
        changed.iter().any(|path| self.globs.matches(path))
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            poll: true,
            poll_interval: Duration::from_millis(300),
            debounce: Duration::from_millis(100),
        }
    }
}

impl WatchState {
    pub fn new(debounce: Duration) -> Self {
        WatchState { pending: FxHashSet::default(), last_change: None, debounce }
    }

    pub fn add(&mut self, path: PathBuf) {
        self.pending.insert(path);
        self.last_change = Some(Instant::now());
    }

    /// Whether changes are pending and none arrived within the debounce window.
    pub fn should_fire(&self) -> bool {
        self.last_change.map_or(false, |last| {
            !self.pending.is_empty() && last.elapsed() >= self.debounce
        })
    }

    /// Takes the pending changes, sorted.
    pub fn take(&mut self) -> Vec<PathBuf> {
        let mut changes: Vec<_> = self.pending.drain().collect();
        changes.sort();
        self.last_change = None;
        changes
    }
}

impl Watcher {
    /// Watches `dir` recursively. Once changes settle, every rule matching a
    /// changed path, taken relative to `root`, is passed to `on_change`, in
    /// rule order and once per batch. Failures are logged.
    pub fn spawn<F>(
        root: &Path,
        dir: &Path,
        rules: Vec<WatchRule>,
        options: WatchOptions,
        on_change: F,
    ) -> Result<Watcher>
        where F: Fn(&WatchRule) -> Result<()> + Send + 'static
    {
        let root = root.canonicalize()
            .chain_with(|| error!("invalid project root", "root" => root.display()))?;

        let dir = dir.canonicalize()
            .chain_with(|| error!("invalid watch directory", "directory" => dir.display()))?;

        let (tx, rx) = channel();
        let handler = move |result: notify::Result<Event>| match result {
            Ok(event) => event.paths.into_iter().for_each(|path| { let _ = tx.send(path); }),
            Err(e) => tracing::warn!("file watch error: {e}"),
        };

        let mut inner: Box<dyn notify::Watcher> = match options.poll {
            true => {
                let config = Config::default().with_poll_interval(options.poll_interval);
                Box::new(PollWatcher::new(handler, config)?)
            }
            false => Box::new(RecommendedWatcher::new(handler, Config::default())?),
        };

        inner.watch(&dir, RecursiveMode::Recursive)
            .chain_with(|| error!("failed to watch directory", "directory" => dir.display()))?;

        tracing::info!(directory = %dir.display(), poll = options.poll, "watching for changes");
        let running = Arc::new(AtomicBool::new(true));
        let thread = std::thread::Builder::new()
            .name("spindle-watch".into())
            .spawn({
                let running = running.clone();
                move || {
                    let mut state = WatchState::new(options.debounce);
                    while running.load(Ordering::SeqCst) {
                        match rx.recv_timeout(Duration::from_millis(25)) {
                            Ok(path) => state.add(path),
                            Err(RecvTimeoutError::Timeout) => {}
                            Err(RecvTimeoutError::Disconnected) => break,
                        }

                        while let Ok(path) = rx.try_recv() {
                            state.add(path);
                        }

                        if state.should_fire() {
                            let changed: Vec<_> = state.take()
                                .into_iter()
                                .filter_map(|p| p.strip_prefix(&root).ok().map(Path::to_path_buf))
                                .collect();

                            fire(&rules, &changed, &on_change);
                        }
                    }
                }
            })?;

        Ok(Watcher { running, thread: Some(thread), _inner: inner })
    }

    /// Stops watching, waiting for a running series to finish.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn fire<F>(rules: &[WatchRule], changed: &[PathBuf], on_change: &F)
    where F: Fn(&WatchRule) -> Result<()>
{
    for rule in rules.iter().filter(|rule| rule.matches(changed)) {
        tracing::debug!(series = ?rule.series, changes = changed.len(), "change detected");
        if let Err(e) = on_change(rule) {
            tracing::error!("rebuild failed\n{e}");
        }
    }
}
