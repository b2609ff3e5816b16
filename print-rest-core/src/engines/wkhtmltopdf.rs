use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{debug, info};

use super::{check_output, probe_version, run_command};
use crate::contract::{BrowserEngine, BrowserJob, BrowserSource, RenderError};
use crate::request::OutputMode;

const LOCAL_FILE_ACCESS: &str = "enable-local-file-access";

/// Headless engine backed by `wkhtmltopdf` / `wkhtmltoimage`.
pub struct WkhtmltopdfEngine {
    pdf_binary: PathBuf,
    image_binary: PathBuf,
    verbose: bool,
}

impl WkhtmltopdfEngine {
    pub fn new(pdf_binary: impl Into<PathBuf>, image_binary: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            pdf_binary: pdf_binary.into(),
            image_binary: image_binary.into(),
            verbose,
        }
    }
}

/// Maps `{"page-size": "A4", "grayscale": null}` to
/// `--page-size A4 --grayscale`. `true` is a bare flag and `false` omits it.
/// Arrays repeat the flag once per element; a nested array supplies several
/// values to one flag.
pub fn option_args(options: &Map<String, Value>) -> Vec<OsString> {
    let mut args = Vec::new();
    for (key, value) in options {
        let flag = format!("--{}", key.trim_start_matches('-'));
        match value {
            Value::Array(items) => {
                for item in items {
                    args.push(OsString::from(&flag));
                    match item {
                        Value::Array(values) => args.extend(values.iter().map(|v| OsString::from(scalar(v)))),
                        other => args.push(OsString::from(scalar(other))),
                    }
                }
            }
            Value::Null | Value::Bool(true) => args.push(OsString::from(&flag)),
            Value::Bool(false) => {}
            other => {
                args.push(OsString::from(&flag));
                args.push(OsString::from(scalar(other)));
            }
        }
    }
    args
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl BrowserEngine for WkhtmltopdfEngine {
    async fn render(&self, job: BrowserJob) -> Result<Vec<u8>, RenderError> {
        let binary = match job.output {
            OutputMode::Pdf => &self.pdf_binary,
            OutputMode::Png => &self.image_binary,
        };

        let mut options = job.options.clone();
        if matches!(job.source, BrowserSource::File(_)) {
            options.insert(LOCAL_FILE_ACCESS.to_string(), Value::Null);
        }

        let mut command = Command::new(binary);
        if !self.verbose {
            command.arg("--quiet");
        }
        if job.output == OutputMode::Png {
            command.args(["--format", "png"]);
        }
        command.args(option_args(&options));

        let stdin = match job.source {
            BrowserSource::Url(url) => {
                command.arg(url);
                None
            }
            BrowserSource::File(path) => {
                command.arg(path);
                None
            }
            BrowserSource::Html(html) => {
                command.arg("-");
                Some(html.into_bytes())
            }
        };
        command.arg("-");

        debug!(binary = %binary.display(), options = options.len(), "Running headless engine");
        let bytes = check_output(run_command(command, binary, stdin, self.verbose).await?, job.output)?;
        info!(bytes = bytes.len(), output = job.output.extension(), "Headless conversion finished");
        Ok(bytes)
    }

    async fn version(&self) -> Option<String> {
        probe_version(&self.pdf_binary).await
    }
}
