use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::Principal;
use crate::external::video_provider::VideoProvider;
use crate::jobs::video_refresh_job::{TickOutcome, VideoRefreshJob};
use crate::services::result_cache::ResultCache;
use crate::services::worker_pool::WorkerPool;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// `start` on a principal that already has a job. Callers must use
    /// `replace` instead; a second handle would leak.
    #[error("a job is already active for {0}")]
    AlreadyActive(Principal),

    #[error("invalid period: {0:?}")]
    InvalidPeriod(Duration),

    #[error("job registry is shut down")]
    ShutDown,
}

/// Serializes ticks of one principal across job generations. Outlives the
/// job handle so that a tick left running by `stop` still blocks the first
/// tick of a later `start`.
type TickGate = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
struct JobStats {
    runs: AtomicU64,
    failures: AtomicU64,
    last_run: Mutex<Option<DateTime<Utc>>>,
}

impl JobStats {
    fn record(&self, outcome: Option<TickOutcome>) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        if !matches!(outcome, Some(TickOutcome::Updated)) {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        *self.last_run.lock() = Some(Utc::now());
    }
}

struct JobHandle {
    period: Duration,
    region: String,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
    stats: Arc<JobStats>,
    started_at: DateTime<Utc>,
}

/// Read-only view of an active job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub principal: Principal,
    pub period_secs: u64,
    pub region: String,
    pub started_at: DateTime<Utc>,
    pub runs: u64,
    pub failures: u64,
    pub last_run: Option<DateTime<Utc>>,
}

/// Counts driver tasks that are still alive.
struct DriverGuard(Arc<AtomicUsize>);

impl DriverGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-user recurring job scheduler.
///
/// Holds at most one active job per principal. `start`, `stop` and
/// `replace` for the same principal are serialized by the map entry of that
/// principal; different principals only share a map shard, never a global
/// lock. None of the operations wait on network I/O.
///
/// Each job is driven by its own task at a fixed rate (first tick
/// immediately). Every tick borrows a worker from the shared pool and runs
/// as a separate task, so a panicking tick does not end the schedule.
pub struct JobRegistry {
    jobs: DashMap<Principal, JobHandle>,
    tick_gates: Arc<DashMap<Principal, TickGate>>,
    pool: WorkerPool,
    provider: Arc<dyn VideoProvider>,
    cache: ResultCache,
    shutdown: CancellationToken,
    live_drivers: Arc<AtomicUsize>,
}

impl JobRegistry {
    pub fn new(provider: Arc<dyn VideoProvider>, cache: ResultCache, pool: WorkerPool) -> Self {
        Self {
            jobs: DashMap::new(),
            tick_gates: Arc::new(DashMap::new()),
            pool,
            provider,
            cache,
            shutdown: CancellationToken::new(),
            live_drivers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Schedule a refresh job for a principal without one.
    pub fn start(
        &self,
        principal: &Principal,
        period: Duration,
        region: &str,
    ) -> Result<(), SchedulerError> {
        self.check_schedulable(period)?;

        match self.jobs.entry(principal.clone()) {
            Entry::Occupied(_) => {
                error!(%principal, "start called while a job is already active");
                Err(SchedulerError::AlreadyActive(principal.clone()))
            }
            Entry::Vacant(slot) => {
                self.check_not_shut_down()?;
                let gate = self.tick_gate(principal);
                slot.insert(self.spawn_job(principal, period, region, gate));
                info!(%principal, period_secs = period.as_secs(), %region, "📅 job started");
                Ok(())
            }
        }
    }

    /// Cancel the principal's job. Returns `false` when there was none.
    ///
    /// A tick already running is left to finish, including its cache write.
    pub fn stop(&self, principal: &Principal) -> bool {
        match self.jobs.remove(principal) {
            Some((_, handle)) => {
                handle.cancel.cancel();
                info!(%principal, "🛑 job stopped");
                true
            }
            None => {
                debug!(%principal, "stop requested but no job is active");
                false
            }
        }
    }

    /// Swap the principal's job for one with a new period and region.
    ///
    /// Cancelling the old handle and installing the new one happen under the
    /// same entry lock. Acts like `start` when no job is active.
    pub fn replace(
        &self,
        principal: &Principal,
        period: Duration,
        region: &str,
    ) -> Result<(), SchedulerError> {
        self.check_schedulable(period)?;

        match self.jobs.entry(principal.clone()) {
            Entry::Occupied(mut slot) => {
                self.check_not_shut_down()?;
                let gate = self.tick_gate(principal);
                slot.get().cancel.cancel();
                let old = slot.insert(self.spawn_job(principal, period, region, gate));
                info!(
                    %principal,
                    old_period_secs = old.period.as_secs(),
                    old_region = %old.region,
                    period_secs = period.as_secs(),
                    %region,
                    "🔁 job replaced"
                );
            }
            Entry::Vacant(slot) => {
                self.check_not_shut_down()?;
                let gate = self.tick_gate(principal);
                slot.insert(self.spawn_job(principal, period, region, gate));
                info!(%principal, period_secs = period.as_secs(), %region, "📅 job started by replace");
            }
        }

        Ok(())
    }

    pub fn is_active(&self, principal: &Principal) -> bool {
        self.jobs.contains_key(principal)
    }

    pub fn active_count(&self) -> usize {
        self.jobs.len()
    }

    /// Driver tasks still running, including cancelled ones that have not
    /// observed their cancellation yet.
    pub fn live_drivers(&self) -> usize {
        self.live_drivers.load(Ordering::SeqCst)
    }

    pub fn summary(&self, principal: &Principal) -> Option<JobSummary> {
        self.jobs.get(principal).map(|handle| JobSummary {
            principal: principal.clone(),
            period_secs: handle.period.as_secs(),
            region: handle.region.clone(),
            started_at: handle.started_at,
            runs: handle.stats.runs.load(Ordering::Relaxed),
            failures: handle.stats.failures.load(Ordering::Relaxed),
            last_run: *handle.stats.last_run.lock(),
        })
    }

    /// Capacity and free workers of the shared pool.
    pub fn pool_usage(&self) -> (usize, usize) {
        (self.pool.capacity(), self.pool.available())
    }

    /// Cancel every job, close the worker pool and wait up to `grace` for
    /// the drivers to finish. The registry refuses new jobs afterwards.
    pub async fn shutdown(&self, grace: Duration) {
        info!("🛑 Stopping job registry...");
        self.shutdown.cancel();
        self.pool.close();

        let principals: Vec<Principal> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        let drivers: Vec<JoinHandle<()>> = principals
            .iter()
            .filter_map(|principal| self.jobs.remove(principal))
            .map(|(_, handle)| handle.driver)
            .collect();
        let count = drivers.len();

        if tokio::time::timeout(grace, join_all(drivers)).await.is_err() {
            warn!(count, "job drivers did not stop within {:?}", grace);
        } else {
            info!(count, "✅ Job registry stopped");
        }
    }

    fn check_schedulable(&self, period: Duration) -> Result<(), SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod(period));
        }
        self.check_not_shut_down()
    }

    // Checked again under the entry lock: `shutdown` collects the keys after
    // cancelling, so nothing may be inserted once the token is cancelled.
    fn check_not_shut_down(&self) -> Result<(), SchedulerError> {
        if self.shutdown.is_cancelled() || self.pool.is_closed() {
            return Err(SchedulerError::ShutDown);
        }
        Ok(())
    }

    fn tick_gate(&self, principal: &Principal) -> TickGate {
        self.tick_gates
            .entry(principal.clone())
            .or_default()
            .clone()
    }

    fn spawn_job(
        &self,
        principal: &Principal,
        period: Duration,
        region: &str,
        tick_gate: TickGate,
    ) -> JobHandle {
        let cancel = self.shutdown.child_token();
        let stats = Arc::new(JobStats::default());
        let job = VideoRefreshJob::new(
            principal.clone(),
            region.to_string(),
            self.provider.clone(),
            self.cache.clone(),
        );

        let driver = tokio::spawn(drive(
            job,
            period,
            self.pool.clone(),
            cancel.clone(),
            tick_gate,
            self.tick_gates.clone(),
            stats.clone(),
            DriverGuard::new(self.live_drivers.clone()),
        ));

        JobHandle {
            period,
            region: region.to_string(),
            cancel,
            driver,
            stats,
            started_at: Utc::now(),
        }
    }
}

// Fixed-rate loop of one job. Each wait point also watches the cancellation
// token, so a cancelled job never dispatches another tick.
async fn drive(
    job: VideoRefreshJob,
    period: Duration,
    pool: WorkerPool,
    cancel: CancellationToken,
    tick_gate: TickGate,
    tick_gates: Arc<DashMap<Principal, TickGate>>,
    stats: Arc<JobStats>,
    _guard: DriverGuard,
) {
    let mut ticker = interval(period);
    // Late ticks are caught up rather than skipped
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            turn = tick_gate.clone().lock_owned() => turn,
        };

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = pool.acquire() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(principal = %job.principal(), "job driver exiting: {}", e);
                    break;
                }
            },
        };

        let tick_job = job.clone();
        let tick = tokio::spawn(async move {
            let _permit = permit;
            let _turn = turn;
            tick_job.run().await
        });

        match tick.await {
            Ok(outcome) => stats.record(Some(outcome)),
            Err(e) => {
                error!(principal = %job.principal(), "❌ tick aborted: {}", e);
                stats.record(None);
            }
        }
    }

    // Forget the gate once no driver or tick of this principal holds it
    drop(tick_gate);
    tick_gates.remove_if(job.principal(), |_, gate| Arc::strong_count(gate) == 1);

    debug!(principal = %job.principal(), region = %job.region(), "job driver stopped");
}
