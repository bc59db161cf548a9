mod common;

use anyhow::Result;
use campus_dues::database::models::Holiday;
use campus_dues::jobs::Job;
use campus_dues::types::Collection;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

// 2026-10-16 is a Friday (weekday 5, counting Sunday as 0)

#[tokio::test]
async fn records_a_holiday_for_schools_observing_today() -> Result<()> {
    let ctx = common::context();
    let weekend = ctx.seed_school("Weekend", &[5, 6]).await?;
    ctx.seed_school("Sunday", &[0]).await?;

    let report = ctx.holiday_job().run(ctx.at(2026, 10, 16)).await?;
    assert_eq!(report.created, 1);

    let holidays: Vec<Holiday> = ctx.all().await?;
    assert_eq!(holidays.len(), 1);
    let friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    assert_eq!(holidays[0].school_id, weekend.id);
    assert_eq!(holidays[0].name, Holiday::WEEKLY_NAME);
    assert_eq!((holidays[0].start_date, holidays[0].end_date), (friday, friday));
    assert!(holidays[0].is_active);
    Ok(())
}

#[tokio::test]
async fn rerunning_the_same_day_is_idempotent() -> Result<()> {
    let ctx = common::context();
    ctx.seed_school("Weekend", &[5, 6]).await?;
    let job = ctx.holiday_job();

    job.run(ctx.at(2026, 10, 16)).await?;
    let again = job.run(ctx.at(2026, 10, 16)).await?;
    assert_eq!((again.created, again.skipped), (0, 1));
    assert_eq!(ctx.all::<Holiday>().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn each_observed_day_gets_its_own_record() -> Result<()> {
    let ctx = common::context();
    let weekend = ctx.seed_school("Weekend", &[5, 6]).await?;
    let sunday = ctx.seed_school("Sunday", &[0]).await?;
    let job = ctx.holiday_job();

    for day in 16..=23 {
        job.run(ctx.at(2026, 10, day)).await?;
    }

    let holidays: Vec<Holiday> = ctx.all().await?;
    let count_for = |id| holidays.iter().filter(|h| h.school_id == id).count();
    // Fri 16, Sat 17, Fri 23
    assert_eq!(count_for(weekend.id), 3);
    // Sun 18
    assert_eq!(count_for(sunday.id), 1);
    Ok(())
}

#[tokio::test]
async fn schools_without_weekly_holidays_never_fire() -> Result<()> {
    let ctx = common::context();
    ctx.seed_school("Open", &[]).await?;
    let job = ctx.holiday_job();

    for day in 12..=18 {
        assert_eq!(job.run(ctx.at(2026, 10, day)).await?.created, 0);
    }
    assert!(ctx.all::<Holiday>().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_documents_do_not_abort_the_run() -> Result<()> {
    let ctx = common::context();
    let weekend = ctx.seed_school("Weekend", &[5, 6]).await?;
    ctx.store
        .seed(
            Collection::Schools,
            &[json!({ "id": Uuid::new_v4(), "name": "Broken", "weeklyHolidays": [5, 300] })],
        )
        .await?;

    let report = ctx.holiday_job().run(ctx.at(2026, 10, 16)).await?;
    assert_eq!((report.created, report.failed), (1, 1));

    let holidays: Vec<Holiday> = ctx.all().await?;
    assert_eq!(holidays.len(), 1);
    assert_eq!(holidays[0].school_id, weekend.id);
    Ok(())
}
