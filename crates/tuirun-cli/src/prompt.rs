//! Resolve the `--prompt` argument.

use anyhow::{Context, Result, bail};
use std::path::Path;

/// The prompt text for `arg`: a readable file's trimmed contents, or `arg` itself.
pub fn resolve(arg: &str) -> Result<String> {
    let path = Path::new(arg);
    let text = if path.is_file() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading prompt file {}", path.display()))?;
        tracing::debug!(
            target: "tuirun::startup",
            "Read prompt from {} ({} bytes)",
            path.display(),
            content.len()
        );
        content.trim().to_string()
    } else {
        arg.to_string()
    };

    if text.trim().is_empty() {
        bail!("prompt is empty");
    }
    Ok(text)
}
