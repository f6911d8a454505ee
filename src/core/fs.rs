//! Filesystem traversal — walk directories and populate a [`Node`] tree.
//!
//! Every directory is one unit of work.  A unit lists its directory one level
//! deep, appends the entries it finds to its own node, then hands each
//! subdirectory node to the work queue so another worker can explore it.
//! Units are exclusive `&mut Node` borrows, so no two workers ever append to
//! the same children vector and nodes need no locking.  The only shared state
//! is the queue and its outstanding-work counter, which doubles as the
//! barrier: the walk returns once every registered unit has completed.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::tree::{EntryMeta, Node};

/// Configuration knobs for the traversal.
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Number of worker threads exploring directories concurrently.
    pub jobs: usize,
    /// List each directory sorted by file name instead of in the order the
    /// filesystem returns entries.
    pub sort_entries: bool,
}

impl WalkConfig {
    /// Worker count used when none is configured.
    pub fn default_jobs() -> usize {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(4)
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            jobs: Self::default_jobs(),
            sort_entries: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("cannot read root {}: {source}", path.display())]
    Root {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is neither a directory nor a regular file", path.display())]
    UnsupportedRoot { path: PathBuf },

    /// Listing a directory failed part-way; whatever was listed before the
    /// failure is kept.
    #[error("cannot enumerate {}: {source}", path.display())]
    Enumerate {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Everything the walk produced.
#[derive(Debug)]
pub struct WalkOutcome {
    pub root: Node,
    /// Enumeration failures, one per unit of work that stopped early.
    pub errors: Vec<WalkError>,
    /// Units of work that ran (directories listed, root included).
    pub dirs_explored: usize,
}

// ───────────────────────────────────────── work queue ────────

struct QueueState<'t> {
    jobs: VecDeque<&'t mut Node>,
    /// Units registered but not yet completed, queued or running.
    outstanding: usize,
}

/// Pending directory nodes plus the outstanding-work counter.
struct WorkQueue<'t> {
    state: Mutex<QueueState<'t>>,
    ready: Condvar,
}

impl<'t> WorkQueue<'t> {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                outstanding: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Register one more unit of work.
    fn push(&self, node: &'t mut Node) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.outstanding += 1;
        state.jobs.push_back(node);
        self.ready.notify_one();
    }

    /// Block until a unit is available.  Returns `None` once nothing is
    /// queued and nothing is running, i.e. the walk is complete.
    fn next(&self) -> Option<&'t mut Node> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(node) = state.jobs.pop_front() {
                return Some(node);
            }
            if state.outstanding == 0 {
                return None;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Signal completion of a unit taken from [`WorkQueue::next`].
    fn done(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.outstanding == 0 {
            self.ready.notify_all();
        }
    }
}

// ───────────────────────────────────────── walk ──────────────

/// Build the tree rooted at `root`.
///
/// The root's own metadata is read here, before any worker starts; failing
/// to read it is the only fatal error.  Enumeration failures below the root
/// are logged, collected in [`WalkOutcome::errors`] and otherwise ignored.
pub fn build_tree(root: &Path, config: &WalkConfig) -> Result<WalkOutcome, WalkError> {
    let meta = std::fs::metadata(root).map_err(|source| WalkError::Root {
        path: root.to_path_buf(),
        source,
    })?;
    let meta = EntryMeta::from_metadata(&meta).ok_or_else(|| WalkError::UnsupportedRoot {
        path: root.to_path_buf(),
    })?;
    let mut root_node = Node::new(root, meta);

    if !root_node.is_dir() {
        return Ok(WalkOutcome {
            root: root_node,
            errors: Vec::new(),
            dirs_explored: 0,
        });
    }

    let jobs = config.jobs.max(1);
    info!(root = %root.display(), jobs, "starting walk");
    let start = Instant::now();

    let (errors, dirs_explored) = {
        let queue = WorkQueue::new();
        queue.push(&mut root_node);
        drain(&queue, config, jobs)
    };

    info!(
        dirs = dirs_explored,
        errors = errors.len(),
        elapsed = ?start.elapsed(),
        "walk finished"
    );

    Ok(WalkOutcome {
        root: root_node,
        errors,
        dirs_explored,
    })
}

/// Run `jobs` workers over `queue` until every registered unit has completed.
/// Returns the enumeration errors and the number of units that ran.
fn drain<'t>(
    queue: &WorkQueue<'t>,
    config: &WalkConfig,
    jobs: usize,
) -> (Vec<WalkError>, usize) {
    let errors = Mutex::new(Vec::new());
    let explored = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..jobs.max(1) {
            s.spawn(|| {
                while let Some(node) = queue.next() {
                    if let Err(err) = explore(node, config, queue) {
                        warn!("{err}");
                        errors
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(err);
                    }
                    explored.fetch_add(1, Ordering::Relaxed);
                    queue.done();
                }
            });
        }
    });

    let errors = errors.into_inner().unwrap_or_else(PoisonError::into_inner);
    (errors, explored.into_inner())
}

/// One unit of work: list `node`'s directory a single level deep, append
/// what was found, and queue every subdirectory for its own unit.
///
/// Subdirectories are queued only once the listing has finished.  Each queued
/// unit is an exclusive borrow of an element of `node.children`, which cannot
/// be handed out while that vector is still growing.  Subdirectories collected
/// before an enumeration error are still queued.  The subdirectories
/// themselves are never opened here.
fn explore<'t>(
    node: &'t mut Node,
    config: &WalkConfig,
    queue: &WorkQueue<'t>,
) -> Result<(), WalkError> {
    let outcome = list_children(node);
    if config.sort_entries {
        // Siblings share a parent, so path order is file-name order.
        node.children.sort_by(|a, b| a.path.cmp(&b.path));
    }

    for child in node.children.iter_mut().filter(|c| c.is_dir()) {
        queue.push(child);
    }

    outcome
}

/// Append `node`'s immediate entries to its children, stopping at the first
/// failure.  Special entries are skipped.
fn list_children(node: &mut Node) -> Result<(), WalkError> {
    let entries = std::fs::read_dir(&node.path).map_err(|source| WalkError::Enumerate {
        path: node.path.clone(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| WalkError::Enumerate {
            path: node.path.clone(),
            source,
        })?;
        let path = entry.path();
        // Does not follow symlinks, so links classify as special.
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(source) => return Err(WalkError::Enumerate { path, source }),
        };
        let Some(meta) = EntryMeta::from_metadata(&meta) else {
            debug!(path = %path.display(), "skipping special entry");
            continue;
        };
        node.children.push(Node::new(path, meta));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    fn config(jobs: usize) -> WalkConfig {
        WalkConfig {
            jobs,
            sort_entries: true,
        }
    }

    /// root/a.txt (10), root/sub/b.txt (20)
    fn scenario() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), vec![0u8; 10]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.txt"), vec![0u8; 20]).unwrap();
        dir
    }

    fn wide_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..12 {
            let sub = dir.path().join(format!("d{i:02}"));
            fs::create_dir(&sub).unwrap();
            fs::write(sub.join("f"), vec![0u8; i * 3]).unwrap();
            for j in 0..3 {
                let nested = sub.join(format!("n{j}"));
                fs::create_dir(&nested).unwrap();
                fs::write(nested.join("g"), vec![0u8; i + j]).unwrap();
            }
        }
        dir
    }

    #[test]
    fn builds_scenario_tree() {
        let dir = scenario();
        let outcome = build_tree(dir.path(), &config(4)).unwrap();

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.dirs_explored, 2);

        let root = &outcome.root;
        assert_eq!(root.path(), dir.path());
        assert!(root.is_dir());
        assert_eq!(root.children.len(), 2);

        let a = &root.children[0];
        assert_eq!(a.path(), dir.path().join("a.txt"));
        assert_eq!(a.meta, EntryMeta::file(10));

        let sub = &root.children[1];
        assert!(sub.is_dir());
        assert_eq!(sub.children.len(), 1);
        assert_eq!(sub.children[0].path(), dir.path().join("sub/b.txt"));
        assert_eq!(sub.children[0].meta, EntryMeta::file(20));
    }

    #[test]
    fn concurrency_does_not_change_the_tree() {
        let dir = wide_tree();
        let mut serial = build_tree(dir.path(), &config(1)).unwrap().root;
        let mut parallel = build_tree(dir.path(), &config(8)).unwrap().root;

        serial.sort_recursive();
        parallel.sort_recursive();
        assert_eq!(serial, parallel);
        assert_eq!(serial.node_count(), 1 + 12 * (2 + 3 * 2));
    }

    #[test]
    fn zero_jobs_still_walks() {
        let dir = scenario();
        let outcome = build_tree(dir.path(), &config(0)).unwrap();
        assert_eq!(outcome.root.node_count(), 4);
    }

    #[test]
    fn file_root_is_a_single_node() {
        let dir = scenario();
        let file = dir.path().join("a.txt");
        let outcome = build_tree(&file, &config(2)).unwrap();

        assert_eq!(outcome.root, Node::new(&file, EntryMeta::file(10)));
        assert_eq!(outcome.dirs_explored, 0);
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = build_tree(&dir.path().join("nope"), &config(2)).unwrap_err();
        assert!(matches!(err, WalkError::Root { .. }));
    }

    #[test]
    fn vanished_directory_yields_one_error() {
        let dir = TempDir::new().unwrap();
        let mut node = Node::new(dir.path().join("gone"), EntryMeta::dir(0));
        let err = {
            let queue = WorkQueue::new();
            explore(&mut node, &config(1), &queue).unwrap_err()
        };
        assert!(matches!(err, WalkError::Enumerate { .. }));
        assert!(node.children.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn special_entries_are_excluded() {
        let dir = scenario();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("dirlink")).unwrap();

        let outcome = build_tree(dir.path(), &config(2)).unwrap();
        assert_eq!(outcome.root.node_count(), 4);
        assert!(outcome
            .root
            .children
            .iter()
            .all(|c| !c.path().ends_with("link")));
    }

    #[test]
    fn failed_unit_does_not_disturb_the_others() {
        let dir = scenario();
        let mut root = Node::new(dir.path(), EntryMeta::dir(0));
        let mut gone = Node::new(dir.path().join("gone"), EntryMeta::dir(0));

        let (errors, explored) = {
            let queue = WorkQueue::new();
            queue.push(&mut root);
            queue.push(&mut gone);
            drain(&queue, &config(3), 3)
        };

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            WalkError::Enumerate { path, .. } if path.ends_with("gone")
        ));
        // root, sub and gone each ran once.
        assert_eq!(explored, 3);
        assert!(gone.children.is_empty());
        assert_eq!(root.node_count(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn explore_leaves_subdirectories_unopened() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden"), b"x").unwrap();
        fs::write(dir.path().join("f"), b"abc").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let mut node = Node::new(dir.path(), EntryMeta::dir(0));
        let (result, queued) = {
            let queue = WorkQueue::new();
            let result = explore(&mut node, &config(1), &queue);
            let queued: Vec<PathBuf> = std::iter::from_fn(|| {
                let unit = queue.next()?;
                let path = unit.path.clone();
                queue.done();
                Some(path)
            })
            .collect();
            (result, queued)
        };
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(result.is_ok());
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].meta, EntryMeta::file(3));
        assert_eq!(node.children[1].path(), locked);
        assert!(node.children[1].children.is_empty());
        assert_eq!(queued, vec![locked]);
    }

    #[cfg(unix)]
    #[test]
    #[ignore = "permission bits do not stop root; run with --ignored as an unprivileged user"]
    fn unreadable_directory_is_recovered() {
        use std::os::unix::fs::PermissionsExt;

        let dir = scenario();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden"), vec![0u8; 100]).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        assert!(
            fs::read_dir(&locked).is_err(),
            "running with privileges that bypass permission bits"
        );

        let outcome = build_tree(dir.path(), &config(4)).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(outcome.errors.len(), 1);
        let locked_node = outcome
            .root
            .children
            .iter()
            .find(|c| c.path() == locked)
            .unwrap();
        assert!(locked_node.children.is_empty());
        // The sibling subtree is still complete.
        let sub = outcome
            .root
            .children
            .iter()
            .find(|c| c.path().ends_with("sub"))
            .unwrap();
        assert_eq!(sub.children.len(), 1);
    }

    #[test]
    fn queue_drains_when_outstanding_reaches_zero() {
        let mut node = Node::new("/x", EntryMeta::dir(0));
        let queue = WorkQueue::new();
        queue.push(&mut node);

        assert!(queue.next().is_some());
        queue.done();
        assert!(queue.next().is_none());
    }
}
