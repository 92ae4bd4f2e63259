use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use dsff::constants::DSFF_EXTENSION;
use dsff::formats::Input;
use dsff::{detect_format, CodecOptions, Dsff, Format, Mode};

use super::config::Config;

fn is_container(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == DSFF_EXTENSION)
}

/// Format of a source: explicit, by extension, then by content
fn source_format(input: &Path, explicit: Option<Format>, options: &CodecOptions) -> Result<Format> {
    if let Some(format) = explicit.or_else(|| Format::from_path(input)) {
        return Ok(format);
    }
    let probe = Input::from_path(input).context("Failed to read input")?;
    detect_format(&probe, options)
        .with_context(|| format!("Could not detect the format of {}; use --from", input.display()))
}

/// Convert INPUT to OUTPUT, one of them being a DSFF container
pub fn run(
    input: PathBuf,
    output: PathBuf,
    from: Option<Format>,
    to: Option<Format>,
    config: Option<PathBuf>,
    target: Option<String>,
    missing: Option<String>,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input does not exist: {}", input.display());
    }

    let config = match config {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    let options = config.codec_options(target, missing);

    info!("Input:  {}", input.display());
    info!("Output: {}", output.display());

    if is_container(&output) {
        let format = source_format(&input, from, &options)?;
        info!("Importing {} into DSFF...", format);
        let mut ds = Dsff::open(&output, Mode::Create)?.with_options(options);
        ds.import(format, &input)
            .with_context(|| format!("Failed to import {}", input.display()))?;
        ds.close().context("Failed to save the container")?;
    } else if is_container(&input) {
        let format = to
            .or_else(|| Format::from_path(&output))
            .with_context(|| format!("Could not guess the format of {}; use --to", output.display()))?;
        info!("Exporting DSFF as {}...", format);
        let ds = Dsff::open(&input, Mode::Read)?.with_options(options);
        ds.export(format, Some(output.as_path()))
            .with_context(|| format!("Failed to export to {}", output.display()))?;
    } else {
        anyhow::bail!("One of INPUT or OUTPUT must be a .{} container", DSFF_EXTENSION);
    }

    info!("Conversion complete!");
    Ok(())
}
