use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;

/// Print a success message, with `data` under the envelope in JSON mode
pub fn output_success<T: Serialize>(output_format: OutputFormat, message: &str, data: Option<&T>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data) = data {
                response["data"] = serde_json::to_value(data)?;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Aligned columns in text mode, the serialized `data` in JSON mode
pub fn output_rows<T: Serialize>(
    output_format: OutputFormat,
    headers: &[&str],
    rows: &[Vec<String>],
    data: &T,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "success": true, "data": data }))?);
        }
        OutputFormat::Text => {
            println!("{}", format_table(headers, rows));
        }
    }
    Ok(())
}

fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.to_vec())];
    out.extend(rows.iter().map(|row| line(row.iter().map(String::as_str).collect())));
    out.join("\n")
}
