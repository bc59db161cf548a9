mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use campus_dues::jobs::{Job, JobError, JobReport};
use campus_dues::scheduler::{Schedule, Scheduler};
use campus_dues::testing::fee_structure;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

/// Blocks inside `run` until released
struct GatedJob {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl Job for GatedJob {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Daily { hour: 3, minute: 0 }
    }

    async fn run(&self, now: DateTime<FixedOffset>) -> Result<JobReport, JobError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(JobReport::new(self.name(), now))
    }
}

#[derive(Default)]
struct CountingJob {
    runs: AtomicUsize,
}

#[async_trait]
impl Job for CountingJob {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Monthly { day: 1, hour: 0, minute: 0 }
    }

    async fn run(&self, now: DateTime<FixedOffset>) -> Result<JobReport, JobError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let mut report = JobReport::new(self.name(), now);
        report.created = 1;
        Ok(report)
    }
}

#[tokio::test]
async fn registers_the_three_recurring_jobs() -> Result<()> {
    let ctx = common::context();
    let scheduler = ctx.scheduler();

    assert_eq!(scheduler.job_names(), vec!["payment-dues", "weekly-holidays", "payroll"]);
    let jobs = scheduler.jobs().await;
    assert!(jobs.iter().all(|j| !j.status.running && j.status.last_report.is_none()));
    assert_eq!(jobs[2].description, "monthly on day 1 at 00:00");
    Ok(())
}

#[tokio::test]
async fn run_now_rejects_unknown_jobs() -> Result<()> {
    let ctx = common::context();
    let err = ctx.scheduler().run_now("attendance", ctx.at(2026, 10, 1)).await.unwrap_err();
    assert!(matches!(err, JobError::UnknownJob(name) if name == "attendance"));
    Ok(())
}

#[tokio::test]
async fn run_now_records_the_last_report() -> Result<()> {
    let ctx = common::context();
    ctx.seed(&[fee_structure(Uuid::new_v4(), "monthly", 5, &[(10, 1)], vec![Uuid::new_v4()])]).await?;
    let scheduler = ctx.scheduler();

    let report = scheduler.run_now("payment-dues", ctx.at(2026, 10, 5)).await?;
    assert_eq!(report.created, 1);

    let jobs = scheduler.jobs().await;
    let dues = jobs.iter().find(|j| j.name == "payment-dues").expect("registered");
    assert_eq!(dues.status.last_report.as_ref(), Some(&report));
    assert!(dues.status.last_error.is_none());
    Ok(())
}

#[tokio::test]
async fn a_job_never_overlaps_itself() -> Result<()> {
    common::init_tracing();
    let job = Arc::new(GatedJob { started: Notify::new(), release: Notify::new() });
    let mut scheduler = Scheduler::new(Utc.fix());
    scheduler.register(job.clone());
    let scheduler = Arc::new(scheduler);

    let first = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run_now("gated", scheduler.now()).await }
    });
    job.started.notified().await;

    let second = scheduler.run_now("gated", scheduler.now()).await;
    assert!(matches!(second, Err(JobError::AlreadyRunning(_))));
    assert!(scheduler.jobs().await[0].status.running);

    job.release.notify_one();
    first.await??;
    assert!(!scheduler.jobs().await[0].status.running);

    // Free again once the first run finished
    let third = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run_now("gated", scheduler.now()).await }
    });
    job.started.notified().await;
    job.release.notify_one();
    third.await??;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn spawned_loops_fire_and_stop_on_shutdown() -> Result<()> {
    common::init_tracing();
    let job = Arc::new(CountingJob::default());
    let mut scheduler = Scheduler::new(Utc.fix());
    scheduler.register(job.clone());

    let handles = scheduler.spawn();
    while job.runs.load(Ordering::SeqCst) < 2 {
        tokio::time::sleep(Duration::from_secs(32 * 24 * 3600)).await;
    }

    scheduler.shutdown();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle).await??;
    }

    let status = &scheduler.jobs().await[0].status;
    assert_eq!(status.last_report.as_ref().map(|r| r.created), Some(1));
    assert!(status.next_run.is_some());
    Ok(())
}
