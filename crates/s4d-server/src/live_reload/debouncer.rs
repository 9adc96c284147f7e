//! Burst coalescing for filesystem events.
//!
//! Editors often emit several events for one save (truncate + write, or write
//! temp file + rename). Events are held per path until the path has been
//! quiet for the debounce window, then emitted once. A path that never goes
//! quiet is still emitted once it has been pending for [`MAX_WAIT_WINDOWS`]
//! windows.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Upper bound on how long an event is held, in debounce windows.
const MAX_WAIT_WINDOWS: u32 = 10;

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FsEventKind {
    Created,
    Modified,
    Removed,
}

/// A coalesced filesystem change.
#[derive(Clone, Debug)]
pub(crate) struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
}

struct Pending {
    kind: FsEventKind,
    first_seen: Instant,
    deadline: Instant,
}

/// Per-path event coalescer.
///
/// Owned by the watcher task, so no locking is needed.
pub(crate) struct EventDebouncer {
    pending: HashMap<PathBuf, Pending>,
    window: Duration,
    max_wait: Duration,
}

impl EventDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            window,
            max_wait: window * MAX_WAIT_WINDOWS,
        }
    }

    /// Record an event, pushing the path's deadline back by one window.
    ///
    /// The deadline never moves past `max_wait` after the first event.
    pub fn record(&mut self, path: PathBuf, kind: FsEventKind, now: Instant) {
        let deadline = now + self.window;

        match self.pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(Pending {
                    kind,
                    first_seen: now,
                    deadline,
                });
            }
            Entry::Occupied(mut entry) => match Self::coalesce(entry.get().kind, kind) {
                Some(merged) => {
                    let pending = entry.get_mut();
                    pending.kind = merged;
                    pending.deadline = deadline.min(pending.first_seen + self.max_wait);
                }
                // A file that came and went inside one window never existed for us
                None => {
                    entry.remove();
                }
            },
        }
    }

    /// Merge a new event kind into a pending one.
    ///
    /// Returns `None` when both cancel out.
    #[allow(clippy::match_same_arms)]
    fn coalesce(existing: FsEventKind, new: FsEventKind) -> Option<FsEventKind> {
        use FsEventKind::{Created, Modified, Removed};

        match (existing, new) {
            (Created, Created | Modified) => Some(Created),
            (Created, Removed) => None,
            (Modified, Created) => Some(Created),
            (Modified, Modified) => Some(Modified),
            (Modified | Removed, Removed) => Some(Removed),
            // Atomic save: old file removed, new one put in place
            (Removed, Created) => Some(Modified),
            (Removed, Modified) => Some(Removed),
        }
    }

    /// Take every event whose deadline has passed, oldest deadline first.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<FsEvent> {
        let mut ready: Vec<(Instant, FsEvent)> = Vec::new();

        self.pending.retain(|path, pending| {
            if pending.deadline <= now {
                ready.push((
                    pending.deadline,
                    FsEvent {
                        path: path.clone(),
                        kind: pending.kind,
                    },
                ));
                false
            } else {
                true
            }
        });

        ready.sort_by_key(|(deadline, _)| *deadline);
        ready.into_iter().map(|(_, event)| event).collect()
    }

    /// Earliest pending deadline, used to schedule the next drain.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }
}
