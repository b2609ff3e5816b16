//! Subprocess adapters for the rendering backends.

pub mod inline;
pub mod weasyprint;
pub mod wkhtmltopdf;

pub use weasyprint::WeasyprintEngine;
pub use wkhtmltopdf::WkhtmltopdfEngine;

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::contract::RenderError;
use crate::pdf::{PDF_MAGIC, PNG_MAGIC};
use crate::request::OutputMode;

/// Runs `command`, feeding `stdin` if given, and returns its stdout.
/// A nonzero exit is a [`RenderError::Failed`] carrying stderr.
pub(crate) async fn run_command(
    mut command: Command,
    binary: &Path,
    stdin: Option<Vec<u8>>,
    verbose: bool,
) -> Result<Vec<u8>, RenderError> {
    command
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| RenderError::Spawn {
        binary: binary.display().to_string(),
        source,
    })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        tokio::spawn(async move {
            if let Err(err) = pipe.write_all(&input).await {
                debug!(error = %err, "Engine closed stdin early");
            }
        });
    }

    let output = child.wait_with_output().await?;
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        return Err(RenderError::Failed {
            status: output.status.code(),
            stderr,
        });
    }
    if verbose && !stderr.is_empty() {
        debug!(binary = %binary.display(), %stderr, "Engine diagnostics");
    }
    Ok(output.stdout)
}

/// Verifies the engine output starts like the requested format.
pub(crate) fn check_output(bytes: Vec<u8>, output: OutputMode) -> Result<Vec<u8>, RenderError> {
    let magic = match output {
        OutputMode::Pdf => PDF_MAGIC,
        OutputMode::Png => PNG_MAGIC,
    };
    if bytes.starts_with(magic) {
        Ok(bytes)
    } else {
        Err(RenderError::MalformedOutput(format!(
            "expected {} output, got {} bytes starting with {:?}",
            output.extension(),
            bytes.len(),
            String::from_utf8_lossy(&bytes[..bytes.len().min(16)])
        )))
    }
}

/// First line of `<binary> --version`, if the binary runs.
pub(crate) async fn probe_version(binary: &Path) -> Option<String> {
    let output = match Command::new(binary).arg("--version").output().await {
        Ok(output) => output,
        Err(err) => {
            warn!(binary = %binary.display(), error = %err, "Cannot determine engine version");
            return None;
        }
    };
    let text = if output.stdout.is_empty() { output.stderr } else { output.stdout };
    String::from_utf8_lossy(&text)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}
