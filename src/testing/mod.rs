//! Fixtures for exercising the jobs against the in-memory store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::models::{FeeStructure, FeeTypeLine, Salary, School, User};
use crate::database::{DatabaseError, DocumentStore, MemoryStore, Model};
use crate::jobs::{build_scheduler, HolidayJob, PaymentDueJob, PayrollJob, RetryPolicy};
use crate::notify::{NotificationSender, Notifier, NotifyError, StoreDirectory};
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub token: String,
    pub title: String,
    pub body: String,
}

/// Sender that records deliveries, or fails every send when told to
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentNotification>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, token: &str, title: &str, body: &str) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Other("simulated push failure".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification {
                token: token.to_string(),
                title: title.to_string(),
                body: body.to_string(),
            });
        }
        Ok(())
    }
}

pub struct TestContext {
    pub store: MemoryStore,
    pub sender: Arc<RecordingSender>,
    pub notifier: Arc<Notifier>,
    pub offset: FixedOffset,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let sender = Arc::new(RecordingSender::new());
        let directory = Arc::new(StoreDirectory::new(Arc::new(store.clone())));
        let notifier = Arc::new(Notifier::new(sender.clone(), directory, Duration::from_millis(200)));
        Self {
            store,
            sender,
            notifier,
            offset: Utc.fix(),
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn DocumentStore> {
        Arc::new(self.store.clone())
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy { max_attempts: 3, backoff: Duration::from_millis(1) }
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::development();
        config.materialize.retry_backoff_ms = 1;
        config.materialize.concurrency = 4;
        config
    }

    /// 09:00 local on the given date
    pub fn at(&self, year: i32, month: u32, day: u32) -> DateTime<FixedOffset> {
        self.offset
            .with_ymd_and_hms(year, month, day, 9, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("invalid test date {}-{}-{}", year, month, day))
    }

    pub fn payment_due_job(&self) -> PaymentDueJob {
        PaymentDueJob::new(self.dyn_store(), Arc::clone(&self.notifier), self.retry()).with_concurrency(4)
    }

    pub fn payroll_job(&self) -> PayrollJob {
        PayrollJob::new(self.dyn_store(), self.retry())
    }

    pub fn holiday_job(&self) -> HolidayJob {
        HolidayJob::new(self.dyn_store(), self.retry())
    }

    pub fn scheduler(&self) -> Scheduler {
        build_scheduler(self.dyn_store(), Arc::clone(&self.notifier), &self.config())
    }

    /// Every live document of `T`'s collection
    pub async fn all<T: Model>(&self) -> Result<Vec<T>, DatabaseError> {
        self.store
            .all(T::COLLECTION)
            .await
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(DatabaseError::from))
            .collect()
    }

    pub async fn seed<T: Model>(&self, items: &[T]) -> Result<(), DatabaseError> {
        self.store.seed(T::COLLECTION, items).await
    }

    pub async fn seed_school(&self, name: &str, weekly_holidays: &[u8]) -> Result<School, DatabaseError> {
        let school = School {
            id: Uuid::new_v4(),
            name: name.to_string(),
            weekly_holidays: weekly_holidays.to_vec(),
        };
        self.seed(std::slice::from_ref(&school)).await?;
        Ok(school)
    }

    pub async fn seed_user(&self, school_id: Uuid, name: &str, tokens: &[&str]) -> Result<User, DatabaseError> {
        let user = User {
            id: Uuid::new_v4(),
            school_id,
            name: name.to_string(),
            is_active: true,
            push_tokens: tokens.iter().map(|t| t.to_string()).collect(),
        };
        self.seed(std::slice::from_ref(&user)).await?;
        Ok(user)
    }

    pub async fn seed_salary(&self, user: &User, base_salary: i64) -> Result<Salary, DatabaseError> {
        let salary = Salary {
            id: Uuid::new_v4(),
            employee_id: user.id,
            school_id: user.school_id,
            base_salary: Decimal::new(base_salary, 0),
        };
        self.seed(std::slice::from_ref(&salary)).await?;
        Ok(salary)
    }
}

/// Fee structure with `(amount, count)` fee lines
pub fn fee_structure(
    school_id: Uuid,
    frequency: &str,
    due_date_of_month: u32,
    lines: &[(i64, u32)],
    student_ids: Vec<Uuid>,
) -> FeeStructure {
    FeeStructure {
        id: Uuid::new_v4(),
        school_id,
        name: format!("{} fees", frequency),
        frequency: frequency.to_string(),
        due_date_of_month,
        fee_types: lines
            .iter()
            .enumerate()
            .map(|(i, (amount, count))| FeeTypeLine {
                fee_type_id: Uuid::new_v4(),
                name: format!("fee {}", i + 1),
                amount: Decimal::new(*amount, 0),
                count: *count,
                description: None,
            })
            .collect(),
        student_ids,
        created_by: None,
        updated_by: None,
    }
}
