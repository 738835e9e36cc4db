//! Job status records backing the single-flight guard

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use crate::{
    errors::{BotError, BotResult},
    types::{JobRecord, JobStatus},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    Acquired { lease: String },
    /// The flag had been `running` past the stale limit and was taken over.
    TookOverStale { running_since: DateTime<Utc>, lease: String },
    Busy,
}

impl Acquire {
    /// Token the holder must present to renew or release the flag.
    pub fn lease(&self) -> Option<&str> {
        match self {
            Acquire::Acquired { lease } | Acquire::TookOverStale { lease, .. } => Some(lease),
            Acquire::Busy => None,
        }
    }
}

#[async_trait]
pub trait JobStatusStore: Send + Sync {
    async fn create_job(&self, record: JobRecord) -> BotResult<()>;
    async fn is_running(&self, session_id: &str) -> BotResult<bool>;
    async fn set_status(&self, session_id: &str, status: JobStatus) -> BotResult<()>;
    /// Atomically flips `pending → running`, or takes over a `running` flag
    /// not renewed for `stale_after`. Each success hands out a fresh lease.
    async fn try_acquire(&self, session_id: &str, stale_after: Duration) -> BotResult<Acquire>;
    /// Refreshes `updated_at` if `lease` still holds the flag.
    async fn renew(&self, session_id: &str, lease: &str) -> BotResult<bool>;
    /// Puts the flag back to `pending` if `lease` still holds it. A flag
    /// taken over in the meantime is left to its new holder.
    async fn release(&self, session_id: &str, lease: &str) -> BotResult<bool>;
}

/// Job records held in memory and, when given a path, mirrored to a JSON
/// file after every change so a restarted process sees the same flags.
pub struct LocalJobStatusStore {
    jobs: Mutex<HashMap<String, JobRecord>>,
    path: Option<PathBuf>,
}

impl LocalJobStatusStore {
    pub fn in_memory() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            path: None,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> BotResult<Self> {
        let path = path.into();
        let jobs = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| job_file_error(&path, e.into()))?;
            serde_json::from_str(&raw).map_err(|e| BotError::DataParsing {
                context: format!("job file {}", path.display()),
                source: e.into(),
            })?
        } else {
            HashMap::new()
        };

        Ok(Self {
            jobs: Mutex::new(jobs),
            path: Some(path),
        })
    }

    async fn persist(&self, jobs: &HashMap<String, JobRecord>) -> BotResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = serde_json::to_vec_pretty(jobs).map_err(|e| job_file_error(path, e.into()))?;
        let write = async {
            if let Some(dir) = path.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, &body).await?;
            tokio::fs::rename(&tmp, path).await?;
            anyhow::Ok(())
        };
        write.await.map_err(|e| job_file_error(path, e))
    }
}

fn job_file_error(path: &std::path::Path, source: anyhow::Error) -> BotError {
    BotError::Ledger {
        context: format!("job file {}", path.display()),
        source,
    }
}

fn missing(session_id: &str) -> BotError {
    BotError::JobStatus {
        session_id: session_id.to_string(),
        message: "no job record".to_string(),
    }
}

fn holds(job: &JobRecord, lease: &str) -> bool {
    job.status == JobStatus::Running && job.lease.as_deref() == Some(lease)
}

#[async_trait]
impl JobStatusStore for LocalJobStatusStore {
    async fn create_job(&self, record: JobRecord) -> BotResult<()> {
        let mut jobs = self.jobs.lock().await;
        debug!(session_id = %record.session_id, name = %record.name, "Created job record");
        jobs.insert(record.session_id.clone(), record);
        self.persist(&jobs).await
    }

    async fn is_running(&self, session_id: &str) -> BotResult<bool> {
        let jobs = self.jobs.lock().await;
        jobs.get(session_id)
            .map(|job| job.status == JobStatus::Running)
            .ok_or_else(|| missing(session_id))
    }

    async fn set_status(&self, session_id: &str, status: JobStatus) -> BotResult<()> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(session_id).ok_or_else(|| missing(session_id))?;
        job.status = status;
        job.updated_at = Utc::now();
        if status == JobStatus::Pending {
            job.lease = None;
        }
        self.persist(&jobs).await
    }

    async fn try_acquire(&self, session_id: &str, stale_after: Duration) -> BotResult<Acquire> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(session_id).ok_or_else(|| missing(session_id))?;
        let now = Utc::now();
        let lease = uuid::Uuid::new_v4().to_string();

        let outcome = match job.status {
            JobStatus::Pending => Acquire::Acquired { lease: lease.clone() },
            JobStatus::Running if now - job.updated_at > stale_after => {
                warn!(
                    session_id,
                    running_since = %job.updated_at,
                    "⚠️ Job flag stalled in running state, taking over"
                );
                Acquire::TookOverStale { running_since: job.updated_at, lease: lease.clone() }
            }
            JobStatus::Running => return Ok(Acquire::Busy),
        };

        job.status = JobStatus::Running;
        job.updated_at = now;
        job.lease = Some(lease);
        self.persist(&jobs).await?;
        Ok(outcome)
    }

    async fn renew(&self, session_id: &str, lease: &str) -> BotResult<bool> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(session_id).ok_or_else(|| missing(session_id))?;
        if !holds(job, lease) {
            return Ok(false);
        }
        job.updated_at = Utc::now();
        self.persist(&jobs).await?;
        Ok(true)
    }

    async fn release(&self, session_id: &str, lease: &str) -> BotResult<bool> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(session_id).ok_or_else(|| missing(session_id))?;
        if !holds(job, lease) {
            return Ok(false);
        }
        job.status = JobStatus::Pending;
        job.updated_at = Utc::now();
        job.lease = None;
        self.persist(&jobs).await?;
        Ok(true)
    }
}
