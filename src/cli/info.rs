use anyhow::{Context, Result};
use std::path::PathBuf;

use dsff::container::DOCUMENT_PROPERTY_NAMES;
use dsff::{Dsff, Mode};

/// Display information about a DSFF container
pub fn run(file: PathBuf) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let ds = Dsff::open(&file, Mode::Read).context("Failed to open container")?;
    let container = ds.container();

    println!("DSFF Container Information");
    println!("==========================");
    println!("File: {}", file.display());
    println!("Name: {}", ds.name());
    println!();

    println!("Document Properties:");
    for name in DOCUMENT_PROPERTY_NAMES.iter().filter(|n| **n != "description") {
        if let Some(value) = container.properties().get(name) {
            println!("  {}: {}", name, value.to_json().as_str().unwrap_or_default());
        }
    }
    println!();

    let headers = ds.headers();
    println!("Data:");
    println!("  Rows: {}", ds.row_count().saturating_sub(1));
    println!("  Columns ({}): {}", headers.len(), headers.join(", "));
    println!();

    let features = ds.features();
    if !features.is_empty() {
        println!("Features:");
        for (name, description) in features.iter() {
            println!("  {}: {}", name, description);
        }
        println!();
    }

    let metadata = ds.metadata();
    if !metadata.is_empty() {
        println!("Metadata:");
        for (key, value) in &metadata {
            let rendered = value.to_string();
            let preview = if rendered.chars().count() > 100 {
                format!("{}... ({} bytes)", rendered.chars().take(100).collect::<String>(), rendered.len())
            } else {
                rendered
            };
            println!("  {}: {}", key, preview);
        }
    }

    Ok(())
}
