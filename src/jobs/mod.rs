//! Recurring materialization jobs: payment dues, payroll, weekly holidays.

pub mod frequency;
pub mod holiday;
pub mod payment_due;
pub mod payroll;

pub use frequency::{should_create, Frequency};
pub use holiday::HolidayJob;
pub use payment_due::PaymentDueJob;
pub use payroll::PayrollJob;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::{AppConfig, MaterializeConfig};
use crate::database::{DatabaseError, DocumentStore, Model, Repository};
use crate::filter::FilterData;
use crate::notify::Notifier;
use crate::scheduler::{Schedule, Scheduler};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job '{0}' is already running")]
    AlreadyRunning(String),

    #[error("unknown job '{0}'")]
    UnknownJob(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job: String,
    pub run_at: DateTime<FixedOffset>,
    pub created: usize,
    /// Already materialized for this cycle
    pub skipped: usize,
    /// Bad source data or store errors that outlived the retries
    pub failed: usize,
}

impl JobReport {
    pub fn new(job: &str, run_at: DateTime<FixedOffset>) -> Self {
        Self { job: job.to_string(), run_at, created: 0, skipped: 0, failed: 0 }
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Result of materializing one (source, subject) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Skipped,
    Failed,
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    fn schedule(&self) -> Schedule;

    /// Materialize everything due at `now`; `now` carries the school-local offset
    async fn run(&self, now: DateTime<FixedOffset>) -> Result<JobReport, JobError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Multiplied by the attempt number between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &MaterializeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }

    pub fn none() -> Self {
        Self { max_attempts: 1, backoff: Duration::ZERO }
    }
}

/// Re-run `op` while it fails with a transient store error
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, DatabaseError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DatabaseError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                warn!("{} failed (attempt {}/{}), retrying: {}", what, attempt, policy.max_attempts, e);
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Records decoded by `load`, plus how many documents had to be left out
pub(crate) struct Loaded<T> {
    pub records: Vec<T>,
    pub undecodable: usize,
}

/// Read a whole query result through a direct session, retrying transient
/// failures. Documents that do not decode are logged and counted, not fatal.
pub(crate) async fn load<T: Model>(
    store: &dyn DocumentStore,
    retry: &RetryPolicy,
    filter: FilterData,
) -> Result<Loaded<T>, DatabaseError> {
    let filter = &filter;
    let (records, undecodable) = with_retry(retry, T::COLLECTION.as_str(), || async move {
        let mut session = store.session(false).await?;
        Repository::<T>::new().select_partitioned(session.as_mut(), filter.clone()).await
    })
    .await?;

    for bad in &undecodable {
        match bad.id {
            Some(id) => warn!("skipping undecodable {} document {}: {}", T::COLLECTION.as_str(), id, bad.error),
            None => warn!("skipping undecodable {} document without id: {}", T::COLLECTION.as_str(), bad.error),
        }
    }
    Ok(Loaded { records, undecodable: undecodable.len() })
}

/// Scheduler with the payment-due, holiday and payroll jobs registered
pub fn build_scheduler(store: Arc<dyn DocumentStore>, notifier: Arc<Notifier>, config: &AppConfig) -> Scheduler {
    let retry = RetryPolicy::from_config(&config.materialize);
    let sched = &config.scheduler;

    let mut scheduler = Scheduler::new(sched.utc_offset());
    scheduler.register(Arc::new(
        PaymentDueJob::new(Arc::clone(&store), notifier, retry)
            .with_schedule(Schedule::Daily { hour: sched.payment_due_hour, minute: 0 })
            .with_concurrency(config.materialize.concurrency),
    ));
    scheduler.register(Arc::new(
        HolidayJob::new(Arc::clone(&store), retry)
            .with_schedule(Schedule::Daily { hour: sched.holiday_hour, minute: 0 }),
    ));
    scheduler.register(Arc::new(
        PayrollJob::new(store, retry).with_schedule(Schedule::Monthly {
            day: sched.payroll_day,
            hour: sched.payroll_hour,
            minute: 0,
        }),
    ));
    scheduler
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_only() {
        let policy = RetryPolicy { max_attempts: 3, backoff: Duration::from_millis(10) };

        let calls = &AtomicU32::new(0);
        let result: Result<u32, _> = with_retry(&policy, "flaky", || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(DatabaseError::Unavailable("down".into())),
                n => Ok(n),
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);

        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy, "conflict", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DatabaseError::Conflict("payrolls".into()))
        })
        .await;
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy { max_attempts: 2, backoff: Duration::from_millis(10) };
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy, "down", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DatabaseError::Unavailable("down".into()))
        })
        .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn report_tallies_outcomes() {
        let mut report = JobReport::new("payment-dues", chrono::Utc::now().with_timezone(&FixedOffset::east_opt(0).unwrap()));
        for outcome in [Outcome::Created, Outcome::Created, Outcome::Skipped, Outcome::Failed] {
            report.record(outcome);
        }
        assert_eq!((report.created, report.skipped, report.failed), (2, 1, 1));
    }
}
