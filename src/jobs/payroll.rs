use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{load, with_retry, Job, JobError, JobReport, Outcome, RetryPolicy};
use crate::database::models::{Payroll, Salary, User};
use crate::database::{with_optional_transaction, DatabaseError, DocumentStore, Repository};
use crate::filter::FilterData;
use crate::scheduler::Schedule;

/// Monthly: one payroll entry per active user, at their current base salary
pub struct PayrollJob {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    schedule: Schedule,
}

impl PayrollJob {
    pub const NAME: &'static str = "payroll";

    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            schedule: Schedule::Monthly { day: 1, hour: 0, minute: 0 },
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Insert the whole batch in one unit of work
    async fn insert_batch(&self, entries: &[Payroll]) -> Result<usize, DatabaseError> {
        let store = self.store.as_ref();
        with_retry(&self.retry, "payroll batch insert", || {
            let entries = entries.to_vec();
            with_optional_transaction(store, move |session| {
                Box::pin(async move {
                    let inserted = Repository::<Payroll>::new().insert_many(&mut *session, &entries).await?;
                    Ok::<_, DatabaseError>(inserted.len())
                })
            })
        })
        .await
    }

    /// Guarded single insert, used when the batch insert does not go through
    async fn insert_single(&self, entry: &Payroll) -> Outcome {
        let store = self.store.as_ref();
        let result = with_retry(&self.retry, "payroll insert", || {
            let entry = entry.clone();
            with_optional_transaction(store, move |session| {
                Box::pin(async move {
                    let repo = Repository::<Payroll>::new();
                    let guard = FilterData::where_(json!({
                        "employeeId": entry.employee_id,
                        "period": entry.period,
                    }));
                    if repo.count(&mut *session, guard).await? > 0 {
                        return Ok(false);
                    }
                    repo.insert_one(&mut *session, &entry).await?;
                    Ok::<_, DatabaseError>(true)
                })
            })
        })
        .await;

        match result {
            Ok(true) => Outcome::Created,
            Ok(false) => Outcome::Skipped,
            Err(e) if e.is_conflict() => Outcome::Skipped,
            Err(e) => {
                error!(employee = %entry.employee_id, "payroll entry not created: {}", e);
                Outcome::Failed
            }
        }
    }
}

#[async_trait]
impl Job for PayrollJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn run(&self, now: DateTime<FixedOffset>) -> Result<JobReport, JobError> {
        let mut report = JobReport::new(self.name(), now);
        let period = Payroll::period_of(now);
        let store = self.store.as_ref();

        let users = load::<User>(store, &self.retry, FilterData::where_(json!({ "isActive": true }))).await?;
        report.failed += users.undecodable;
        let users = users.records;
        if users.is_empty() {
            info!("Payroll for {}: no active users", period);
            return Ok(report);
        }
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();

        // An undecodable salary leaves its user without one and is counted below
        let salaries = load::<Salary>(
            store,
            &self.retry,
            FilterData::where_(json!({ "employeeId": { "$in": ids } })),
        )
        .await?;
        let salary_of: HashMap<Uuid, Salary> = salaries.records.into_iter().map(|s| (s.employee_id, s)).collect();

        // An undecodable entry still holds the (employeeId, period) key, so the
        // per-entry fallback reports it as skipped
        let existing = load::<Payroll>(
            store,
            &self.retry,
            FilterData::where_(json!({ "period": period, "employeeId": { "$in": ids } })),
        )
        .await?;
        let already_paid: HashSet<Uuid> = existing.records.into_iter().map(|p| p.employee_id).collect();

        let mut entries = Vec::with_capacity(users.len());
        for user in &users {
            if already_paid.contains(&user.id) {
                debug!(employee = %user.id, "payroll already exists for {}", period);
                report.record(Outcome::Skipped);
                continue;
            }
            match salary_of.get(&user.id) {
                Some(salary) => entries.push(Payroll::for_employee(user, salary, now)),
                None => {
                    warn!(employee = %user.id, "active user has no salary record; payroll skipped");
                    report.record(Outcome::Failed);
                }
            }
        }

        if !entries.is_empty() {
            match self.insert_batch(&entries).await {
                Ok(inserted) => report.created += inserted,
                Err(e) => {
                    if e.is_conflict() {
                        warn!("Payroll batch for {} collided with existing entries; inserting individually", period);
                    } else {
                        error!("Payroll batch for {} failed: {}; inserting individually", period, e);
                    }
                    for entry in &entries {
                        report.record(self.insert_single(entry).await);
                    }
                }
            }
        }

        info!(
            "Payroll for {}: {} created, {} skipped, {} failed",
            period, report.created, report.skipped, report.failed
        );
        Ok(report)
    }
}
