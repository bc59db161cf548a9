use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::jobs::{Job, JobError, JobReport};

/// When a job fires, in the scheduler's local offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Schedule {
    Daily { hour: u32, minute: u32 },
    Monthly { day: u32, hour: u32, minute: u32 },
}

fn at(date: NaiveDate, hour: u32, minute: u32, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    date.and_hms_opt(hour, minute, 0)?.and_local_timezone(offset).single()
}

impl Schedule {
    /// First fire time strictly after `now`. `None` only for schedules that
    /// can never fire (hour/minute out of range, day beyond every month).
    pub fn next_after(&self, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let offset = *now.offset();
        match *self {
            Schedule::Daily { hour, minute } => {
                let today = now.date_naive();
                match at(today, hour, minute, offset) {
                    Some(candidate) if candidate > now => Some(candidate),
                    _ => at(today.succ_opt()?, hour, minute, offset),
                }
            }
            Schedule::Monthly { day, hour, minute } => {
                let (mut year, mut month) = (now.year(), now.month());
                // Day 31 needs at most a seven-month look-ahead
                for _ in 0..13 {
                    let candidate = NaiveDate::from_ymd_opt(year, month, day)
                        .and_then(|date| at(date, hour, minute, offset));
                    if let Some(candidate) = candidate.filter(|c| *c > now) {
                        return Some(candidate);
                    }
                    (year, month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
                }
                None
            }
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Daily { hour, minute } => write!(f, "daily at {:02}:{:02}", hour, minute),
            Schedule::Monthly { day, hour, minute } => {
                write!(f, "monthly on day {} at {:02}:{:02}", day, hour, minute)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub running: bool,
    pub next_run: Option<DateTime<FixedOffset>>,
    pub last_report: Option<JobReport>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub name: &'static str,
    pub schedule: Schedule,
    pub description: String,
    #[serde(flatten)]
    pub status: JobStatus,
}

struct RegisteredJob {
    job: Arc<dyn Job>,
    /// Held for the duration of a run
    gate: Mutex<()>,
    status: RwLock<JobStatus>,
}

impl RegisteredJob {
    async fn run(&self, now: DateTime<FixedOffset>) -> Result<JobReport, JobError> {
        let _running = self
            .gate
            .try_lock()
            .map_err(|_| JobError::AlreadyRunning(self.job.name().to_string()))?;
        self.status.write().await.running = true;

        let result = self.job.run(now).await;

        let mut status = self.status.write().await;
        status.running = false;
        match &result {
            Ok(report) => {
                status.last_report = Some(report.clone());
                status.last_error = None;
            }
            Err(e) => status.last_error = Some(e.to_string()),
        }
        result
    }
}

/// Explicit registry of recurring jobs
pub struct Scheduler {
    jobs: Vec<Arc<RegisteredJob>>,
    offset: FixedOffset,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(offset: FixedOffset) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { jobs: Vec::new(), offset, shutdown }
    }

    pub fn register(&mut self, job: Arc<dyn Job>) {
        info!("Registered job '{}' ({})", job.name(), job.schedule());
        self.jobs.push(Arc::new(RegisteredJob {
            job,
            gate: Mutex::new(()),
            status: RwLock::new(JobStatus::default()),
        }));
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current wall-clock time in the scheduler's offset
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|j| j.job.name()).collect()
    }

    pub async fn jobs(&self) -> Vec<JobInfo> {
        let mut out = Vec::with_capacity(self.jobs.len());
        for entry in &self.jobs {
            out.push(JobInfo {
                name: entry.job.name(),
                schedule: entry.job.schedule(),
                description: entry.job.schedule().to_string(),
                status: entry.status.read().await.clone(),
            });
        }
        out
    }

    /// Run a job immediately as if it fired at `now`
    pub async fn run_now(&self, name: &str, now: DateTime<FixedOffset>) -> Result<JobReport, JobError> {
        let entry = self
            .jobs
            .iter()
            .find(|j| j.job.name() == name)
            .ok_or_else(|| JobError::UnknownJob(name.to_string()))?;
        entry.run(now).await
    }

    /// One background task per job, sleeping until its next fire time
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        self.jobs
            .iter()
            .map(|entry| {
                let entry = Arc::clone(entry);
                let offset = self.offset;
                let mut shutdown = self.shutdown.subscribe();

                tokio::spawn(async move {
                    let name = entry.job.name();
                    loop {
                        if *shutdown.borrow() {
                            break;
                        }
                        let now = Utc::now().with_timezone(&offset);
                        let Some(next) = entry.job.schedule().next_after(now) else {
                            error!("Job '{}' has a schedule that never fires; not scheduling", name);
                            break;
                        };
                        entry.status.write().await.next_run = Some(next);
                        let wait = (next - now).to_std().unwrap_or_default();

                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {}
                            _ = shutdown.changed() => break,
                        }

                        let fired_at = Utc::now().with_timezone(&offset);
                        match entry.run(fired_at).await {
                            Ok(report) => info!(
                                "Job '{}' finished: {} created, {} skipped, {} failed",
                                name, report.created, report.skipped, report.failed
                            ),
                            Err(JobError::AlreadyRunning(_)) => {
                                warn!("Job '{}' still running from a previous firing; skipped", name)
                            }
                            Err(e) => error!("Job '{}' failed: {}", name, e),
                        }
                    }
                    info!("Job loop '{}' stopped", name);
                })
            })
            .collect()
    }

    /// Signal every spawned loop to stop after its current run
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
