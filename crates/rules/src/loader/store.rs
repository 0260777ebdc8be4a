//! [`RuleChainStore`]: owns the active rule set and keeps it in sync with the file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use std::time::{Duration, Instant, SystemTime};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::error::Result;
use super::rule_set::RuleSet;
use super::watcher::is_rules_file_event;

/// Bookkeeping for modification-time polling.
#[derive(Debug, Default)]
struct PollState {
    last_check: Option<Instant>,
    /// Modification time of the file the active set was built from.
    marker: Option<SystemTime>,
}

/// Holds the active [`RuleSet`] behind an `Arc` swap.
///
/// Readers take a cheap `Arc` clone via [`current()`](Self::current) and
/// evaluate without holding any lock. Every reload goes through the
/// `writer` mutex for the whole stat, parse and swap sequence, so two
/// reloads never interleave; readers only touch the `RwLock` for the
/// pointer swap.
pub struct RuleChainStore {
    path: PathBuf,
    reload_interval: Duration,
    active: RwLock<Arc<RuleSet>>,
    poll: Mutex<PollState>,
    writer: Mutex<()>,
    /// Active filesystem watcher (held to keep it alive).
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl RuleChainStore {
    /// Load the rules file once and remember its modification time.
    pub fn open(path: impl Into<PathBuf>, reload_interval: Duration) -> Self {
        let path = path.into();
        let (set, marker) = Self::load(&path);
        Self {
            path,
            reload_interval,
            active: RwLock::new(Arc::new(set)),
            poll: Mutex::new(PollState {
                last_check: Some(Instant::now()),
                marker,
            }),
            writer: Mutex::new(()),
            watcher: Mutex::new(None),
        }
    }

    /// Lenient load. A missing or unparsable file yields an empty rule set,
    /// logged as a warning. The returned marker is the file's modification
    /// time when it could be read, so an unparsable file is not re-parsed
    /// until it changes.
    pub fn load(path: &Path) -> (RuleSet, Option<SystemTime>) {
        let marker = modified(path).ok();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rules file unreadable, using empty rule set");
                return (RuleSet::empty(), marker);
            }
        };
        match RuleSet::from_yaml(&content) {
            Ok(set) => {
                for w in set.warnings() {
                    warn!(path = %path.display(), warning = %w, "rule load warning");
                }
                info!(
                    path = %path.display(),
                    rules = set.rules().len(),
                    enabled = set.enabled_count(),
                    threshold = set.score_reject_threshold(),
                    "loaded rule chain"
                );
                (set, marker)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse rules file, using empty rule set");
                (RuleSet::empty(), marker)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reload_interval(&self) -> Duration {
        self.reload_interval
    }

    /// The active rule set. Always complete; never a partial update.
    pub fn current(&self) -> Arc<RuleSet> {
        self.active.read().expect("rule set lock poisoned").clone()
    }

    /// Forced reload. If the file has disappeared the current set is kept.
    /// Waits for any reload already in progress.
    pub fn reload(&self) -> Arc<RuleSet> {
        let _writer = self.writer.lock().expect("rule writer lock poisoned");
        if !self.path.exists() {
            warn!(path = %self.path.display(), "rules file missing, keeping current rule set");
            return self.current();
        }
        self.load_and_swap()
    }

    /// Whether the next [`maybe_reload()`](Self::maybe_reload) would look at
    /// the file at all. Cheap; takes no writer lock.
    pub fn reload_due(&self) -> bool {
        let poll = self.poll.lock().expect("rule poll lock poisoned");
        poll.last_check
            .map_or(true, |last| last.elapsed() >= self.reload_interval)
    }

    /// Reload if the file changed since the last load. The modification time
    /// is checked at most once per reload interval. Returns `true` when a
    /// new rule set was installed.
    ///
    /// Skips when another reload holds the writer lock; that reload leaves
    /// the marker of what it loaded, so a later poll still sees any newer
    /// change.
    pub fn maybe_reload(&self) -> bool {
        {
            let mut poll = self.poll.lock().expect("rule poll lock poisoned");
            let now = Instant::now();
            if let Some(last) = poll.last_check {
                if now.duration_since(last) < self.reload_interval {
                    return false;
                }
            }
            poll.last_check = Some(now);
        }

        let _writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return false,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
        };

        let current = match modified(&self.path) {
            Ok(m) => m,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "rules file not stat-able, keeping current rule set");
                return false;
            }
        };
        if self.poll.lock().expect("rule poll lock poisoned").marker == Some(current) {
            return false;
        }

        self.load_and_swap();
        info!(path = %self.path.display(), "rules file changed, rule chain reloaded");
        true
    }

    /// Caller holds the writer lock.
    fn load_and_swap(&self) -> Arc<RuleSet> {
        let (set, marker) = Self::load(&self.path);
        self.poll.lock().expect("rule poll lock poisoned").marker = marker;
        self.swap(set)
    }

    fn swap(&self, set: RuleSet) -> Arc<RuleSet> {
        let set = Arc::new(set);
        *self.active.write().expect("rule set lock poisoned") = Arc::clone(&set);
        set
    }

    /// Start a `notify` watcher on the rules file's directory. Changes to the
    /// rules file trigger an immediate [`reload()`](Self::reload).
    pub fn watch(self: &Arc<Self>) -> Result<()> {
        let store = Arc::downgrade(self);
        let target = self.path.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) if is_rules_file_event(&event, &target) => {
                    if let Some(store) = store.upgrade() {
                        debug!(path = %target.display(), kind = ?event.kind, "rules file event");
                        store.reload();
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "rules watcher error"),
            }
        })?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!(dir = %dir.display(), "watching rules directory");

        *self.watcher.lock().expect("rule watcher lock poisoned") = Some(watcher);
        Ok(())
    }

    /// Stop the file watcher, if one is running.
    pub fn unwatch(&self) {
        if self
            .watcher
            .lock()
            .expect("rule watcher lock poisoned")
            .take()
            .is_some()
        {
            info!(path = %self.path.display(), "stopped watching rules file");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .expect("rule watcher lock poisoned")
            .is_some()
    }
}

fn modified(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}
