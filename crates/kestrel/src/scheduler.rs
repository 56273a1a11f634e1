//
// scheduler.rs
//
// Cooperative, time-sliced driver for project indexing
//

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SearchConfig;
use crate::project_index::{ProjectIndex, ScheduleRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    /// Created, not yet invoked
    Idle,
    /// Running the initial continuous burst
    Bursting,
    /// Waiting for the next periodic slice
    SlicePending,
    /// Running a periodic slice
    Draining,
    /// Queue drained; never runs again
    Stopped,
}

/// Remaining-work state for one indexing run.
///
/// The host calls `execute` and waits for the returned delay before calling
/// it again, until it returns `None`.
#[derive(Debug, Clone)]
pub struct IncrementalWork {
    state: WorkState,
    burst: Option<Duration>,
    interval: Duration,
}

impl IncrementalWork {
    pub fn burst_then_slices(burst: Duration, interval: Duration) -> Self {
        Self {
            state: WorkState::Idle,
            burst: Some(burst),
            interval,
        }
    }

    pub fn slices(interval: Duration) -> Self {
        Self {
            state: WorkState::Idle,
            burst: None,
            interval,
        }
    }

    pub fn for_request(request: ScheduleRequest, config: &SearchConfig) -> Option<Self> {
        match request {
            ScheduleRequest::None => None,
            ScheduleRequest::BurstThenSlices => Some(Self::burst_then_slices(
                config.initial_burst(),
                config.slice_interval(),
            )),
            ScheduleRequest::Slices => Some(Self::slices(config.slice_interval())),
        }
    }

    pub fn state(&self) -> WorkState {
        self.state
    }

    /// Advance the work. `step` processes one unit and reports whether more
    /// remains. Returns the delay before the next call, or `None` when done.
    pub fn execute<F>(&mut self, mut step: F) -> Option<Duration>
    where
        F: FnMut() -> bool,
    {
        match self.state {
            WorkState::Idle => match self.burst {
                Some(burst) => {
                    self.state = WorkState::Bursting;
                    let started = Instant::now();
                    loop {
                        if !step() {
                            self.state = WorkState::Stopped;
                            return None;
                        }
                        if started.elapsed() >= burst {
                            break;
                        }
                    }
                    self.state = WorkState::SlicePending;
                    Some(self.interval)
                }
                None => {
                    self.state = WorkState::SlicePending;
                    Some(self.interval)
                }
            },
            WorkState::SlicePending => {
                self.state = WorkState::Draining;
                if step() {
                    self.state = WorkState::SlicePending;
                    Some(self.interval)
                } else {
                    self.state = WorkState::Stopped;
                    None
                }
            }
            WorkState::Bursting | WorkState::Draining | WorkState::Stopped => None,
        }
    }
}

// ============================================================================
// Tokio host
// ============================================================================

/// Shared state that owns a project index.
pub trait IndexHost: Send + Sync + 'static {
    fn project_index_mut(&mut self) -> &mut ProjectIndex;
}

impl IndexHost for ProjectIndex {
    fn project_index_mut(&mut self) -> &mut ProjectIndex {
        self
    }
}

/// Runs `IncrementalWork` on the tokio runtime.
///
/// At most one run is active; scheduling a new one cancels the previous.
/// Each invocation takes the host's write lock for its duration only, so
/// searches interleave with indexing between slices.
pub struct IndexingDriver<H: IndexHost> {
    host: Arc<RwLock<H>>,
    active: Mutex<Option<CancellationToken>>,
}

impl<H: IndexHost> IndexingDriver<H> {
    pub fn new(host: Arc<RwLock<H>>) -> Self {
        Self {
            host,
            active: Mutex::new(None),
        }
    }

    /// Start processing as requested by an enqueue.
    pub fn schedule(&self, request: ScheduleRequest, config: &SearchConfig) -> Option<JoinHandle<()>> {
        let work = IncrementalWork::for_request(request, config)?;
        let token = CancellationToken::new();
        if let Some(previous) = self.replace_active(Some(token.clone())) {
            previous.cancel();
        }
        log::trace!("Scheduling indexing ({request:?})");
        Some(tokio::spawn(run(self.host.clone(), work, token)))
    }

    /// Stop the active run, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.replace_active(None) {
            token.cancel();
            log::trace!("Indexing run cancelled");
        }
    }

    fn replace_active(&self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *active, token)
    }
}

impl<H: IndexHost> Drop for IndexingDriver<H> {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run<H: IndexHost>(host: Arc<RwLock<H>>, mut work: IncrementalWork, token: CancellationToken) {
    let started = Instant::now();
    let mut delay = invoke(&host, &mut work).await;
    while let Some(wait) = delay {
        tokio::select! {
            _ = token.cancelled() => {
                log::trace!("Indexing run stopped by cancellation");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }
        if token.is_cancelled() {
            return;
        }
        delay = invoke(&host, &mut work).await;
    }

    log::info!("Indexing run finished in {:?}", started.elapsed());
}

async fn invoke<H: IndexHost>(host: &Arc<RwLock<H>>, work: &mut IncrementalWork) -> Option<Duration> {
    let mut guard = host.write().await;
    let index = guard.project_index_mut();
    work.execute(|| index.process_one_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FileClassifier;
    use crate::paths::PathAliaser;
    use crate::project_index::{FileIdentity, PendingChange};
    use crate::r_parser::RSourceParser;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn counting_step<'a>(remaining: &'a Cell<usize>, calls: &'a Cell<usize>) -> impl FnMut() -> bool + 'a {
        move || {
            calls.set(calls.get() + 1);
            remaining.set(remaining.get().saturating_sub(1));
            remaining.get() > 0
        }
    }

    #[test]
    fn test_slices_do_not_run_on_first_call() {
        let remaining = Cell::new(3);
        let calls = Cell::new(0);
        let mut work = IncrementalWork::slices(Duration::from_millis(20));

        assert_eq!(work.execute(counting_step(&remaining, &calls)), Some(Duration::from_millis(20)));
        assert_eq!(calls.get(), 0);
        assert_eq!(work.state(), WorkState::SlicePending);

        assert!(work.execute(counting_step(&remaining, &calls)).is_some());
        assert!(work.execute(counting_step(&remaining, &calls)).is_some());
        assert_eq!(work.execute(counting_step(&remaining, &calls)), None);
        assert_eq!(calls.get(), 3);
        assert_eq!(work.state(), WorkState::Stopped);
    }

    #[test]
    fn test_each_slice_runs_exactly_one_step() {
        let remaining = Cell::new(100);
        let calls = Cell::new(0);
        let mut work = IncrementalWork::slices(Duration::from_millis(1));
        work.execute(counting_step(&remaining, &calls));
        for expected in 1..=5 {
            work.execute(counting_step(&remaining, &calls));
            assert_eq!(calls.get(), expected);
        }
    }

    #[test]
    fn test_burst_drains_small_queue_immediately() {
        let remaining = Cell::new(5);
        let calls = Cell::new(0);
        let mut work =
            IncrementalWork::burst_then_slices(Duration::from_secs(10), Duration::from_millis(20));
        assert_eq!(work.execute(counting_step(&remaining, &calls)), None);
        assert_eq!(calls.get(), 5);
        assert_eq!(work.state(), WorkState::Stopped);
    }

    #[test]
    fn test_zero_burst_runs_one_step_then_slices() {
        let remaining = Cell::new(5);
        let calls = Cell::new(0);
        let mut work = IncrementalWork::burst_then_slices(Duration::ZERO, Duration::from_millis(20));
        assert_eq!(work.execute(counting_step(&remaining, &calls)), Some(Duration::from_millis(20)));
        assert_eq!(calls.get(), 1);
        assert_eq!(work.state(), WorkState::SlicePending);
    }

    #[test]
    fn test_stopped_work_never_steps() {
        let remaining = Cell::new(1);
        let calls = Cell::new(0);
        let mut work = IncrementalWork::burst_then_slices(Duration::from_secs(1), Duration::from_millis(1));
        assert_eq!(work.execute(counting_step(&remaining, &calls)), None);
        remaining.set(10);
        assert_eq!(work.execute(counting_step(&remaining, &calls)), None);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_for_request() {
        let config = SearchConfig::default();
        assert!(IncrementalWork::for_request(ScheduleRequest::None, &config).is_none());
        let burst = IncrementalWork::for_request(ScheduleRequest::BurstThenSlices, &config).unwrap();
        assert_eq!(burst.burst, Some(Duration::from_millis(200)));
        let slices = IncrementalWork::for_request(ScheduleRequest::Slices, &config).unwrap();
        assert_eq!(slices.burst, None);
        assert_eq!(slices.interval, Duration::from_millis(20));
    }

    fn project(dir: &TempDir, files: usize) -> (Arc<RwLock<ProjectIndex>>, Vec<FileIdentity>) {
        let classifier = FileClassifier::new(SearchConfig::default(), Some(dir.path().to_path_buf()));
        let index = ProjectIndex::new(classifier, PathAliaser::new(None), Arc::new(RSourceParser));
        let identities = (0..files)
            .map(|i| {
                let path = dir.path().join(format!("f{i}.R"));
                std::fs::write(&path, format!("f{i} <- function() {i}")).unwrap();
                FileIdentity::file(path)
            })
            .collect();
        (Arc::new(RwLock::new(index)), identities)
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_drains_burst_request() {
        let dir = TempDir::new().unwrap();
        let (host, files) = project(&dir, 4);
        let driver = IndexingDriver::new(host.clone());
        let config = SearchConfig::default();

        let request = host.write().await.enqueue_many(files);
        let handle = driver.schedule(request, &config).unwrap();
        handle.await.unwrap();

        let index = host.read().await;
        assert_eq!(index.len(), 4);
        assert!(!index.is_indexing());
        assert_eq!(index.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_processes_changes_in_slices() {
        let dir = TempDir::new().unwrap();
        let (host, files) = project(&dir, 3);
        let driver = IndexingDriver::new(host.clone());
        let config = SearchConfig::default();

        let mut request = ScheduleRequest::None;
        {
            let mut index = host.write().await;
            for file in files {
                let r = index.enqueue_change(PendingChange::added(file));
                if r != ScheduleRequest::None {
                    request = r;
                }
            }
        }
        assert_eq!(request, ScheduleRequest::Slices);
        let handle = driver.schedule(request, &config).unwrap();
        // Nothing runs before the first slice interval elapses
        tokio::task::yield_now().await;
        assert_eq!(host.read().await.len(), 0);

        handle.await.unwrap();
        assert_eq!(host.read().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_clear_stops_run() {
        let dir = TempDir::new().unwrap();
        let (host, files) = project(&dir, 5);
        let driver = IndexingDriver::new(host.clone());
        let config = SearchConfig::default();

        let mut request = ScheduleRequest::None;
        {
            let mut index = host.write().await;
            for file in files {
                let r = index.enqueue_change(PendingChange::added(file));
                if r != ScheduleRequest::None {
                    request = r;
                }
            }
        }
        let handle = driver.schedule(request, &config).unwrap();

        host.write().await.clear();
        driver.cancel();
        handle.await.unwrap();

        let index = host.read().await;
        assert!(index.is_empty());
        assert_eq!(index.pending(), 0);
        assert_eq!(index.metrics().files_indexed, 0);
    }

    #[test]
    fn test_schedule_none_spawns_nothing() {
        let dir = TempDir::new().unwrap();
        let (host, _) = project(&dir, 0);
        let driver = IndexingDriver::new(host);
        assert!(driver
            .schedule(ScheduleRequest::None, &SearchConfig::default())
            .is_none());
    }
}
