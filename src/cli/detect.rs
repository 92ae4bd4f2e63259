use anyhow::{Context, Result};
use std::path::PathBuf;

use dsff::container::Container;
use dsff::formats::{detect_formats, Input};
use dsff::CodecOptions;

/// List every format whose detector accepts the file
pub fn run(file: PathBuf) -> Result<()> {
    let input = Input::from_path(&file).context("Failed to read input")?;
    let mut formats: Vec<String> = detect_formats(&input, &CodecOptions::default())
        .into_iter()
        .map(|f| f.to_string())
        .collect();
    if let Some(bytes) = input.bytes() {
        if Container::from_bytes(bytes).is_ok() {
            formats.insert(0, "dsff".to_string());
        }
    }

    if formats.is_empty() {
        println!("{}: no known format", file.display());
    } else {
        println!("{}: {}", file.display(), formats.join(", "));
    }
    Ok(())
}
