//! Single-flight guard over the session's job flag

use chrono::Duration;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};
use crate::storage::{Acquire, JobStatusStore};

#[derive(Debug, PartialEq)]
pub enum GuardOutcome<T> {
    Ran(T),
    /// Another cycle holds the flag; this tick did nothing.
    Skipped,
    /// The flag could not be read or flipped; no cycle was started.
    Unavailable(String),
}

/// Marks a cycle of this process as in flight until dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SingleFlightGuard {
    jobs: Arc<dyn JobStatusStore>,
    session_id: String,
    stale_after: Duration,
    in_flight: AtomicBool,
}

impl SingleFlightGuard {
    pub fn new(jobs: Arc<dyn JobStatusStore>, session_id: impl Into<String>, stale_after: Duration) -> Self {
        Self {
            jobs,
            session_id: session_id.into(),
            stale_after,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs `work` only if the flag could be flipped to `running`, renews
    /// the flag while `work` runs and hands it back to `pending` afterwards.
    /// A stale flag is never taken over from a cycle this guard is running.
    pub async fn run_exclusive<F, Fut, T>(&self, work: F) -> GuardOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(_in_flight) = InFlight::enter(&self.in_flight) else {
            debug!(session_id = %self.session_id, "⏭️ Cycle still running, skipping tick");
            return GuardOutcome::Skipped;
        };

        let acquired = match self.jobs.try_acquire(&self.session_id, self.stale_after).await {
            Ok(acquired) => acquired,
            Err(e) => {
                error!(session_id = %self.session_id, "❌ Could not acquire job flag: {}", e);
                return GuardOutcome::Unavailable(e.to_string());
            }
        };
        let lease = match acquired {
            Acquire::Busy => {
                debug!(session_id = %self.session_id, "⏭️ Cycle still running, skipping tick");
                return GuardOutcome::Skipped;
            }
            Acquire::TookOverStale { running_since, lease } => {
                warn!(session_id = %self.session_id, %running_since, "Recovered stalled cycle flag");
                lease
            }
            Acquire::Acquired { lease } => lease,
        };

        let result = self.hold(&lease, work()).await;

        match self.jobs.release(&self.session_id, &lease).await {
            Ok(true) => {}
            Ok(false) => warn!(session_id = %self.session_id, "⚠️ Job flag changed hands during the cycle, leaving it"),
            Err(e) => error!(session_id = %self.session_id, "❌ Failed to release job flag: {}", e),
        }
        GuardOutcome::Ran(result)
    }

    /// Drives `work` to completion, renewing the lease four times per stale
    /// period so other processes never see the flag as stalled.
    async fn hold<Fut, T>(&self, lease: &str, work: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        let period = (self.stale_after / 4)
            .to_std()
            .ok()
            .filter(|p| !p.is_zero())
            .unwrap_or(std::time::Duration::from_millis(1));
        let mut renewal = time::interval_at(Instant::now() + period, period);
        renewal.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(work);
        loop {
            tokio::select! {
                result = &mut work => return result,
                _ = renewal.tick() => {
                    match self.jobs.renew(&self.session_id, lease).await {
                        Ok(true) => {}
                        Ok(false) => warn!(session_id = %self.session_id, "⚠️ Job flag lease lost mid-cycle"),
                        Err(e) => warn!(session_id = %self.session_id, "⚠️ Could not renew job flag: {}", e),
                    }
                }
            }
        }
    }
}
