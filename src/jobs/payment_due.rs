use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{load, with_retry, Frequency, Job, JobError, JobReport, Outcome, RetryPolicy};
use crate::database::models::{FeeStructure, PaymentDue};
use crate::database::{with_optional_transaction, DocumentStore, Repository};
use crate::filter::FilterData;
use crate::notify::Notifier;
use crate::scheduler::Schedule;

pub const NOTIFICATION_TITLE: &str = "Payment Due";

/// Daily: bill every student of every fee structure whose due day is today
pub struct PaymentDueJob {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<Notifier>,
    retry: RetryPolicy,
    schedule: Schedule,
    concurrency: usize,
}

impl PaymentDueJob {
    pub const NAME: &'static str = "payment-dues";

    pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<Notifier>, retry: RetryPolicy) -> Self {
        Self {
            store,
            notifier,
            retry,
            schedule: Schedule::Daily { hour: 0, minute: 0 },
            concurrency: 8,
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Guarded insert of one student's due for one cycle, then a best-effort push
    async fn materialize(&self, structure: Arc<FeeStructure>, student_id: Uuid, due_date: NaiveDate) -> Outcome {
        let due = match PaymentDue::materialize(&structure, student_id, due_date) {
            Ok(due) => due,
            Err(e) => {
                error!(structure = %structure.id, student = %student_id, "payment due not built: {}", e);
                return Outcome::Failed;
            }
        };
        let store = self.store.as_ref();

        let inserted = with_retry(&self.retry, "payment due insert", || {
            let due = due.clone();
            with_optional_transaction(store, move |session| {
                Box::pin(async move {
                    let repo = Repository::<PaymentDue>::new();
                    if repo.count(&mut *session, due.cycle_filter()).await? > 0 {
                        return Ok(None);
                    }
                    repo.insert_one(&mut *session, &due).await.map(Some)
                })
            })
        })
        .await;

        match inserted {
            Ok(Some(due)) => {
                debug!(structure = %structure.id, student = %student_id, "payment due created");
                self.notify(&due).await;
                Outcome::Created
            }
            Ok(None) => {
                debug!(structure = %structure.id, student = %student_id, "payment due already exists for {}", due_date);
                Outcome::Skipped
            }
            Err(e) if e.is_conflict() => {
                debug!(structure = %structure.id, student = %student_id, "payment due created concurrently");
                Outcome::Skipped
            }
            Err(e) => {
                error!(structure = %structure.id, student = %student_id, "payment due not created: {}", e);
                Outcome::Failed
            }
        }
    }

    async fn notify(&self, due: &PaymentDue) {
        let body = format!(
            "{}: {} due on {}",
            due.name,
            due.total_amount_due,
            due.due_date.format("%d %b %Y")
        );
        let delivered = self.notifier.notify(due.student_id, NOTIFICATION_TITLE, &body).await;
        debug!(student = %due.student_id, "payment due notification delivered to {} device(s)", delivered);
    }
}

#[async_trait]
impl Job for PaymentDueJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn run(&self, now: DateTime<FixedOffset>) -> Result<JobReport, JobError> {
        let today = now.date_naive();
        let month0 = today.month0();
        let mut report = JobReport::new(self.name(), now);

        let structures = load::<FeeStructure>(
            self.store.as_ref(),
            &self.retry,
            FilterData::where_(json!({ "dueDateOfMonth": today.day() })),
        )
        .await?;
        report.failed += structures.undecodable;

        let mut pairs = Vec::new();
        for structure in structures.records {
            if let Err(e) = structure.validate() {
                warn!(structure = %structure.id, "skipping invalid fee structure: {}", e);
                report.record(Outcome::Failed);
                continue;
            }
            let frequency = match structure.frequency.parse::<Frequency>() {
                Ok(frequency) => frequency,
                Err(e) => {
                    warn!(structure = %structure.id, "skipping fee structure: {}", e);
                    report.record(Outcome::Failed);
                    continue;
                }
            };
            if !frequency.is_due(month0) {
                debug!(structure = %structure.id, "{} structure not due in month {}", frequency, month0 + 1);
                continue;
            }
            let Some(due_date) = NaiveDate::from_ymd_opt(today.year(), today.month(), structure.due_date_of_month) else {
                continue;
            };

            let structure = Arc::new(structure);
            let mut students = structure.student_ids.clone();
            students.sort_unstable();
            students.dedup();
            pairs.extend(students.into_iter().map(|student| (Arc::clone(&structure), student, due_date)));
        }

        let outcomes: Vec<Outcome> = stream::iter(pairs)
            .map(|(structure, student, due_date)| self.materialize(structure, student, due_date))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        for outcome in outcomes {
            report.record(outcome);
        }

        info!(
            "Payment dues for {}: {} created, {} skipped, {} failed",
            today, report.created, report.skipped, report.failed
        );
        Ok(report)
    }
}
