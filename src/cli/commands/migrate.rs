use crate::cli::commands::connect_store;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::types::Collection;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let (manager, store) = connect_store(config()).await?;
    let result = store.migrate().await;
    manager.close().await;
    result?;

    let collections: Vec<&str> = Collection::ALL.iter().map(|c| c.as_str()).collect();
    output_success(
        output_format,
        &format!("{} collections ready", collections.len()),
        Some(&collections),
    )
}
