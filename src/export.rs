use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use crate::result::ScrapeResult;

pub const SECTIONS_TXT: &str = "sections.txt";
pub const SECTIONS_JSON: &str = "sections.json";
pub const STRUCTURED_TXT: &str = "structured.txt";
pub const STRUCTURED_JSON: &str = "structured.json";

/// Write the section renderings, plus the model output when there is one.
/// Returns the paths written, in order.
pub fn write_exports(
    dir: &Path,
    result: &ScrapeResult,
    restructured: Option<&str>,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let mut files = vec![
        (SECTIONS_TXT, result.to_plain_text()),
        (SECTIONS_JSON, result.to_json()?),
    ];
    if let Some(text) = restructured {
        files.push((STRUCTURED_TXT, text.to_string()));
        files.push((
            STRUCTURED_JSON,
            serde_json::to_string_pretty(&json!({ "structured_content": text }))?,
        ));
    }

    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = dir.join(name);
        fs::write(&path, contents).with_context(|| format!("Failed to write {:?}", path))?;
        written.push(path);
    }
    info!("Exported {} files to {:?}", written.len(), dir);
    Ok(written)
}
