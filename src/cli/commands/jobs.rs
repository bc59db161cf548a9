use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Subcommand;

use crate::cli::commands::connect_store;
use crate::cli::utils::{output_rows, output_success};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::jobs::build_scheduler;
use crate::notify::Notifier;

#[derive(Subcommand)]
pub enum JobsCommands {
    #[command(about = "List registered jobs and their schedules")]
    List,

    #[command(about = "Run a job now")]
    Run {
        #[arg(help = "Job name (payment-dues, weekly-holidays, payroll)")]
        name: String,
        #[arg(long, help = "Run as if today were this local date (YYYY-MM-DD)")]
        date: Option<NaiveDate>,
    },
}

pub async fn handle(cmd: JobsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let (manager, store) = connect_store(config).await?;
    let notifier = Arc::new(Notifier::from_config(&config.notify, Arc::clone(&store)));
    let scheduler = build_scheduler(store, notifier, config);

    let result = match cmd {
        JobsCommands::List => {
            let jobs = scheduler.jobs().await;
            let rows: Vec<Vec<String>> = jobs
                .iter()
                .map(|j| vec![j.name.to_string(), j.description.clone()])
                .collect();
            output_rows(output_format, &["NAME", "SCHEDULE"], &rows, &jobs)
        }
        JobsCommands::Run { name, date } => {
            let now = match date {
                None => Ok(scheduler.now()),
                Some(date) => date
                    .and_hms_opt(0, 0, 0)
                    .and_then(|dt| dt.and_local_timezone(scheduler.offset()).single())
                    .with_context(|| format!("invalid date {}", date)),
            };
            match now {
                Ok(now) => match scheduler.run_now(&name, now).await {
                    Ok(report) => output_success(
                        output_format,
                        &format!(
                            "{}: {} created, {} skipped, {} failed",
                            report.job, report.created, report.skipped, report.failed
                        ),
                        Some(&report),
                    ),
                    Err(e) => Err(e.into()),
                },
                Err(e) => Err(e),
            }
        }
    };

    manager.close().await;
    result
}
