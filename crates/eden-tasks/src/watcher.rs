//! File watching for watch units

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Errors starting a file watcher
#[derive(Debug, Error)]
pub enum WatchError {
    /// A pattern is not a valid glob
    #[error("invalid watch pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// The OS watcher could not be created or attached
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The working directory could not be read to absolutize patterns
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compiled set of watch patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: GlobSet,
}

impl PatternSet {
    /// Compile patterns; `*` does not cross directory separators
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, WatchError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(GlobBuilder::new(pattern.as_ref()).literal_separator(true).build()?);
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    /// Whether a path matches any pattern
    pub fn is_match(&self, path: &Path) -> bool {
        self.set.is_match(path)
    }
}

/// Longest leading directory of a pattern without glob metacharacters
pub fn literal_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    if pattern.starts_with('/') {
        prefix.push("/");
    }

    let components: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();
    for (i, component) in components.iter().enumerate() {
        if i + 1 == components.len() || component.contains(['*', '?', '[', '{']) {
            break;
        }
        prefix.push(component);
    }
    prefix
}

/// Existing directories to watch recursively for a set of patterns.
///
/// Directories nested inside another root are dropped.
pub fn watch_roots<S: AsRef<str>>(patterns: &[S]) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = patterns
        .iter()
        .map(|p| literal_prefix(p.as_ref()))
        .filter(|p| p.is_dir())
        .collect();
    candidates.sort();
    candidates.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        if !roots.iter().any(|root| candidate.starts_with(root)) {
            roots.push(candidate);
        }
    }
    roots
}

/// Drops repeated events for the same path inside a time window
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    /// Create a debouncer with the given window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    /// Whether an event for `path` observed at `now` should be emitted.
    ///
    /// Paths whose window has passed are forgotten.
    pub fn should_emit(&mut self, path: &Path, now: Instant) -> bool {
        let window = self.window;
        self.last
            .retain(|_, last| now.saturating_duration_since(*last) < window);
        if self.last.contains_key(path) {
            return false;
        }
        self.last.insert(path.to_path_buf(), now);
        true
    }

    /// Number of paths still inside their window
    pub fn tracked(&self) -> usize {
        self.last.len()
    }
}

/// Stream of debounced changes to files matching a pattern set
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<PathBuf>,
    debouncer: Debouncer,
}

impl FileWatcher {
    /// Start watching.
    ///
    /// Relative patterns are resolved against the current directory. Only
    /// create, modify and remove events are forwarded.
    pub fn start<S: AsRef<str>>(patterns: &[S], debounce: Duration) -> Result<Self, WatchError> {
        let cwd = std::env::current_dir()?;
        let patterns: Vec<String> = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                if Path::new(p).is_absolute() {
                    p.to_string()
                } else {
                    cwd.join(p).to_string_lossy().to_string()
                }
            })
            .collect();

        let matcher = PatternSet::new(&patterns)?;
        let (tx, rx) = mpsc::channel(256);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let Ok(event) = res else {
                    return;
                };
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }
                for path in event.paths {
                    if matcher.is_match(&path) {
                        trace!(path = %path.display(), "watched file changed");
                        let _ = tx.blocking_send(path);
                    }
                }
            },
            Config::default(),
        )?;

        let roots = watch_roots(&patterns);
        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }
        debug!(roots = roots.len(), patterns = patterns.len(), "file watcher started");

        Ok(Self {
            _watcher: watcher,
            rx,
            debouncer: Debouncer::new(debounce),
        })
    }

    /// Wait for the next change that passes the debounce window
    pub async fn next(&mut self) -> Option<PathBuf> {
        loop {
            let path = self.rx.recv().await?;
            if self.debouncer.should_emit(&path, Instant::now()) {
                return Some(path);
            }
        }
    }
}
