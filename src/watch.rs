//! Watch mode: re-analyze changed modules and re-link on every burst of edits.
//!
//! File events from `notify` are coalesced by a [`Debouncer`]; once the quiet
//! window passes, the batch invalidates exactly the touched modules in the
//! [`AnalysisContext`] cache and the global phases run again from scratch.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisContext, AnalysisOutput, SourceInput};
use crate::error::AnalyzeError;
use crate::loader::SourceSet;

/// How long the loop sleeps when nothing is pending.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Coalesces bursts of change notifications into one batch.
///
/// A batch is released once no new path has arrived for `window`.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeSet::new(),
            last_event: None,
        }
    }

    /// Record a changed path observed at `now`.
    pub fn push(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path);
        self.last_event = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Time left until the pending batch settles.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_event?;
        Some(self.window.saturating_sub(now.saturating_duration_since(last)))
    }

    /// Take the batch if the quiet window has passed.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        let last = self.last_event?;
        if now.saturating_duration_since(last) < self.window {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.pending).into_iter().collect())
    }
}

/// Applies file batches to an analysis context.
pub struct WatchSession<'a> {
    context: &'a AnalysisContext,
    sources: SourceSet,
}

impl<'a> WatchSession<'a> {
    pub fn new(context: &'a AnalysisContext, sources: SourceSet) -> Self {
        Self { context, sources }
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Invalidate the modules for a batch of changed files.
    ///
    /// Existing files are re-analyzed; vanished ones are dropped from the
    /// cache. Files outside the source set are ignored. Returns the number of
    /// modules touched.
    pub fn apply(&self, batch: &[PathBuf]) -> usize {
        let mut inputs = Vec::new();
        let mut removed = 0;
        for file in batch {
            let Some(path) = self.sources.module_path(file) else {
                continue;
            };
            if !self.sources.matches(&path) {
                continue;
            }
            if file.is_file() {
                inputs.push(SourceInput::File {
                    path,
                    file: file.clone(),
                });
            } else if self.context.remove(&path) {
                debug!(module = %path, "module removed");
                removed += 1;
            }
        }
        let updated = inputs.len();
        if updated > 0 {
            self.context.update(inputs);
        }
        updated + removed
    }

    /// Apply a batch and, if anything changed, re-run the global phases.
    pub fn cycle(&self, batch: &[PathBuf]) -> Option<Result<AnalysisOutput, AnalyzeError>> {
        let touched = self.apply(batch);
        if touched == 0 {
            return None;
        }
        info!(modules = touched, "re-analyzing after change");
        Some(self.context.link())
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

/// Watch the session's root until the watcher shuts down.
///
/// `on_cycle` receives every fresh result; an error returned from it stops
/// the loop.
pub fn watch<F>(session: &WatchSession<'_>, window: Duration, mut on_cycle: F) -> anyhow::Result<()>
where
    F: FnMut(Result<AnalysisOutput, AnalyzeError>) -> anyhow::Result<()>,
{
    let (tx, rx) = channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )?;
    watcher.watch(session.sources().root(), RecursiveMode::Recursive)?;
    info!(root = %session.sources().root().display(), "watching for changes");

    let mut debouncer = Debouncer::new(window);
    loop {
        let wait = debouncer
            .remaining(Instant::now())
            .unwrap_or(IDLE_WAIT);
        match rx.recv_timeout(wait) {
            Ok(Ok(event)) if is_change(&event.kind) => {
                let now = Instant::now();
                for path in event.paths {
                    debouncer.push(path, now);
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("watch error: {}", e),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(batch) = debouncer.poll(Instant::now()) {
            debug!(files = batch.len(), "change batch settled");
            if let Some(result) = session.cycle(&batch) {
                on_cycle(result)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_one_batch() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.push(PathBuf::from("a.js"), start);
        debouncer.push(PathBuf::from("b.js"), start + Duration::from_millis(60));
        debouncer.push(PathBuf::from("a.js"), start + Duration::from_millis(120));

        assert!(debouncer.poll(start + Duration::from_millis(200)).is_none());
        assert_eq!(
            debouncer.remaining(start + Duration::from_millis(200)),
            Some(Duration::from_millis(20))
        );

        let batch = debouncer.poll(start + Duration::from_millis(220)).unwrap();
        assert_eq!(batch, vec![PathBuf::from("a.js"), PathBuf::from("b.js")]);
        assert!(!debouncer.is_pending());
        assert!(debouncer.poll(start + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn test_idle_debouncer() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50));
        assert!(debouncer.remaining(Instant::now()).is_none());
        assert!(debouncer.poll(Instant::now()).is_none());
    }
}
