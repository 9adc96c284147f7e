//! Recursive webroot watcher.
//!
//! Wraps `notify` and turns raw OS events into debounced [`PathChange`]s on a
//! channel with a single consumer.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::debouncer::{EventDebouncer, FsEventKind};

/// Capacity of the change channel.
const CHANNEL_CAPACITY: usize = 100;

/// Watcher settings.
#[derive(Clone, Debug)]
pub(crate) struct WatchOptions {
    /// Quiet period before a path's change is reported.
    pub debounce: Duration,
    /// Paths (relative to the root) that are never reported.
    pub ignore: Vec<glob::Pattern>,
}

impl WatchOptions {
    /// Build options, compiling ignore globs.
    pub(crate) fn new(debounce: Duration, ignore: &[String]) -> Result<Self, glob::PatternError> {
        let ignore = ignore
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<Result<_, _>>()?;
        Ok(Self { debounce, ignore })
    }
}

/// A reported change below the watched root.
#[derive(Clone, Debug)]
pub(crate) struct PathChange {
    /// Absolute path of the changed entry.
    pub path: PathBuf,
    /// `/`-separated path relative to the root.
    pub relative: String,
    pub kind: FsEventKind,
}

/// Running watch on a directory tree.
///
/// Dropping the watcher releases the OS watch and stops reporting.
pub(crate) struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Start watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS watch cannot be established.
    pub(crate) fn start(
        root: &Path,
        options: WatchOptions,
    ) -> Result<(Self, mpsc::Receiver<PathChange>), notify::Error> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the watcher is shutting down
            let _ = raw_tx.send(res);
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(run(root.to_path_buf(), options, raw_rx, tx));

        tracing::debug!(root = %root.display(), "Watching for changes");

        Ok((
            Self {
                _watcher: watcher,
                task,
            },
            rx,
        ))
    }

    /// Stop watching.
    pub(crate) fn stop(self) {
        drop(self);
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Debounce raw events and forward them until either channel closes.
async fn run(
    root: PathBuf,
    options: WatchOptions,
    mut raw: mpsc::UnboundedReceiver<notify::Result<Event>>,
    changes: mpsc::Sender<PathChange>,
) {
    let mut debouncer = EventDebouncer::new(options.debounce);

    loop {
        let deadline = debouncer.next_deadline();

        tokio::select! {
            received = raw.recv() => match received {
                Some(Ok(event)) => record_event(&event, &root, &options.ignore, &mut debouncer),
                Some(Err(err)) => tracing::warn!(error = %err, "File watch error"),
                None => break,
            },
            () = sleep_until(deadline) => {
                for event in debouncer.drain_ready(Instant::now()) {
                    let Some(relative) = relative_url(&event.path, &root) else {
                        continue;
                    };
                    let change = PathChange {
                        path: event.path,
                        relative,
                        kind: event.kind,
                    };
                    if changes.send(change).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Sleep until `deadline`, or forever when nothing is pending.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Feed a raw notify event into the debouncer.
fn record_event(
    event: &Event,
    root: &Path,
    ignore: &[glob::Pattern],
    debouncer: &mut EventDebouncer,
) {
    let kind = match event.kind {
        EventKind::Create(_) => FsEventKind::Created,
        EventKind::Modify(_) => FsEventKind::Modified,
        EventKind::Remove(_) => FsEventKind::Removed,
        _ => return,
    };

    let now = Instant::now();
    for path in &event.paths {
        let Some(relative) = relative_url(path, root) else {
            continue;
        };
        if is_ignored(&relative, ignore) {
            continue;
        }

        tracing::debug!(path = %relative, ?kind, "Recorded filesystem event");
        debouncer.record(path.clone(), kind, now);
    }
}

fn is_ignored(relative: &str, ignore: &[glob::Pattern]) -> bool {
    ignore.iter().any(|pattern| pattern.matches(relative))
}

/// Path relative to `root` with `/` separators; `None` outside the root or
/// for the root itself.
pub(crate) fn relative_url(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let segments: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_relative_url_nested() {
        let root = PathBuf::from("/site");

        assert_eq!(
            relative_url(&root.join("css").join("main.css"), &root),
            Some("css/main.css".to_owned())
        );
    }

    #[test]
    fn test_relative_url_outside_root() {
        assert_eq!(
            relative_url(Path::new("/other/main.css"), Path::new("/site")),
            None
        );
        assert_eq!(relative_url(Path::new("/site"), Path::new("/site")), None);
    }

    #[test]
    fn test_ignore_patterns() {
        let options = WatchOptions::new(Duration::ZERO, &["**/*.swp".to_owned()]).unwrap();

        assert!(is_ignored("docs/.index.html.swp", &options.ignore));
        assert!(!is_ignored("docs/index.html", &options.ignore));
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        assert!(WatchOptions::new(Duration::ZERO, &["[".to_owned()]).is_err());
    }

    #[test]
    fn test_record_event_skips_access_and_ignored() {
        let root = PathBuf::from("/site");
        let ignore = vec![glob::Pattern::new("*.tmp").unwrap()];
        let mut debouncer = EventDebouncer::new(Duration::ZERO);

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(root.join("a.css"));
        let ignored = Event::new(EventKind::Create(notify::event::CreateKind::File))
            .add_path(root.join("x.tmp"));
        let modified = Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(root.join("b.css"));

        for event in [&access, &ignored, &modified] {
            record_event(event, &root, &ignore, &mut debouncer);
        }

        let events = debouncer.drain_ready(Instant::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, root.join("b.css"));
    }

    #[tokio::test]
    async fn test_reports_file_change() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("page.html"), "v1").unwrap();

        let options = WatchOptions::new(Duration::from_millis(20), &[]).unwrap();
        let (watcher, mut changes) = ChangeWatcher::start(&root, options).unwrap();

        std::fs::write(root.join("page.html"), "v2").unwrap();

        let change = tokio::time::timeout(Duration::from_secs(5), changes.recv())
            .await
            .expect("change reported in time")
            .expect("channel open");
        assert_eq!(change.relative, "page.html");
        assert_eq!(change.path, root.join("page.html"));

        watcher.stop();
    }

    #[test]
    fn test_start_fails_for_missing_root() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();

        let options = WatchOptions::new(Duration::ZERO, &[]).unwrap();
        let result = ChangeWatcher::start(Path::new("/definitely/not/here"), options);

        assert!(result.is_err());
    }
}
