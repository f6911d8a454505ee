//! Runs the walk on a background thread so the async driver can bound it
//! with a timeout.
//!
//! The walk thread is detached: if the timeout fires, the process exits
//! without waiting for a stuck filesystem.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::sync::oneshot;

use crate::core::fs::{self, WalkConfig, WalkError, WalkOutcome};

/// Run `job` on a detached `std::thread`; the receiver resolves with its
/// result.  Nothing ever joins the thread.
fn spawn_detached<T, F>(job: F) -> oneshot::Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let _ = tx.send(job());
    });
    rx
}

pub fn spawn_walk(
    root: PathBuf,
    walk_config: WalkConfig,
) -> oneshot::Receiver<Result<WalkOutcome, WalkError>> {
    spawn_detached(move || fs::build_tree(&root, &walk_config))
}

/// Wait for a detached job, giving up after `timeout` if set.
async fn finish<T>(rx: oneshot::Receiver<T>, timeout: Option<Duration>) -> anyhow::Result<T> {
    let received = match timeout {
        Some(limit) => tokio::time::timeout(limit, rx)
            .await
            .map_err(|_| anyhow!("walk did not finish within {}s", limit.as_secs()))?,
        None => rx.await,
    };
    received.context("walk thread exited without a result")
}

/// Walk `root` and wait for the tree, giving up after `timeout` if set.
pub async fn walk(
    root: PathBuf,
    walk_config: WalkConfig,
    timeout: Option<Duration>,
) -> anyhow::Result<WalkOutcome> {
    let outcome = finish(spawn_walk(root, walk_config), timeout).await??;
    Ok(outcome)
}
