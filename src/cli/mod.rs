pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "campus")]
#[command(about = "Operator CLI for the campus-dues scheduler")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create collections and unique indexes")]
    Migrate,

    #[command(about = "Inspect and run materialization jobs")]
    Jobs {
        #[command(subcommand)]
        cmd: commands::jobs::JobsCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Jobs { cmd } => commands::jobs::handle(cmd, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_job_run_with_date() {
        let cli = Cli::parse_from(["campus", "--json", "jobs", "run", "payment-dues", "--date", "2026-10-05"]);
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Commands::Jobs { cmd: commands::jobs::JobsCommands::Run { name, date } } => {
                assert_eq!(name, "payment-dues");
                assert_eq!(date, chrono::NaiveDate::from_ymd_opt(2026, 10, 5));
            }
            _ => panic!("expected jobs run"),
        }
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(Cli::try_parse_from(["campus", "jobs", "run", "payroll", "--date", "05/10/2026"]).is_err());
    }
}
