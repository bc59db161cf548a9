use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset};
use serde_json::json;
use tracing::{debug, error, info};

use super::{load, with_retry, Job, JobError, JobReport, Outcome, RetryPolicy};
use crate::database::models::{Holiday, School};
use crate::database::{with_optional_transaction, DatabaseError, DocumentStore, Repository};
use crate::filter::FilterData;
use crate::scheduler::Schedule;

/// Daily: a one-day "Weekly Holiday" for each school that rests on today's weekday
pub struct HolidayJob {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    schedule: Schedule,
}

impl HolidayJob {
    pub const NAME: &'static str = "weekly-holidays";

    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            schedule: Schedule::Daily { hour: 0, minute: 0 },
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    async fn materialize(&self, holiday: Holiday) -> Outcome {
        let store = self.store.as_ref();
        let school_id = holiday.school_id;

        let result = with_retry(&self.retry, "holiday insert", || {
            let holiday = holiday.clone();
            with_optional_transaction(store, move |session| {
                Box::pin(async move {
                    let repo = Repository::<Holiday>::new();
                    if repo.count(&mut *session, holiday.day_filter()).await? > 0 {
                        return Ok(false);
                    }
                    repo.insert_one(&mut *session, &holiday).await?;
                    Ok::<_, DatabaseError>(true)
                })
            })
        })
        .await;

        match result {
            Ok(true) => Outcome::Created,
            Ok(false) => {
                debug!(school = %school_id, "weekly holiday already recorded");
                Outcome::Skipped
            }
            Err(e) if e.is_conflict() => Outcome::Skipped,
            Err(e) => {
                error!(school = %school_id, "weekly holiday not created: {}", e);
                Outcome::Failed
            }
        }
    }
}

#[async_trait]
impl Job for HolidayJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn run(&self, now: DateTime<FixedOffset>) -> Result<JobReport, JobError> {
        let today = now.date_naive();
        let weekday = today.weekday().num_days_from_sunday();
        let mut report = JobReport::new(self.name(), now);

        let schools = load::<School>(
            self.store.as_ref(),
            &self.retry,
            FilterData::where_(json!({ "weeklyHolidays": { "$any": [weekday] } })),
        )
        .await?;
        report.failed += schools.undecodable;

        for school in schools.records.iter().filter(|s| s.observes(weekday)) {
            report.record(self.materialize(Holiday::weekly(school.id, today)).await);
        }

        info!(
            "Weekly holidays for {} ({}): {} created, {} skipped, {} failed",
            today,
            today.weekday(),
            report.created,
            report.skipped,
            report.failed
        );
        Ok(report)
    }
}
