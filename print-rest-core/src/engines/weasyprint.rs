use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Url;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::inline::inline_html;
use super::{check_output, probe_version, run_command};
use crate::contract::{LayoutEngine, LayoutJob, LayoutSource, RenderError};
use crate::fetch::FetchOutcome;
use crate::request::OutputMode;

/// Direct layout engine backed by the `weasyprint` command line.
///
/// The document is piped through stdin with all references already inlined.
/// Style sheets arrive self-contained and are passed with `-s` from a scratch
/// directory. PNG output is produced by rasterising the first page with
/// `pdftoppm`.
pub struct WeasyprintEngine {
    binary: PathBuf,
    rasterizer: PathBuf,
    scratch_root: PathBuf,
    verbose: bool,
}

impl WeasyprintEngine {
    pub fn new(binary: impl Into<PathBuf>, rasterizer: impl Into<PathBuf>, scratch_root: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            binary: binary.into(),
            rasterizer: rasterizer.into(),
            scratch_root: scratch_root.into(),
            verbose,
        }
    }

    async fn load_document(&self, job: &LayoutJob) -> Result<String, RenderError> {
        match &job.source {
            LayoutSource::Html(html) => Ok(inline_html(html, job.fetcher.as_ref(), None).await),
            LayoutSource::Url(url) => {
                // The top-level document goes through the same hook as its resources.
                let resource = match job.fetcher.fetch(url).await {
                    FetchOutcome::Resolved(resource) => resource,
                    FetchOutcome::Blocked => return Err(RenderError::Blocked(url.clone())),
                    FetchOutcome::Keep | FetchOutcome::Unavailable => {
                        return Err(RenderError::Io(std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("cannot load {url}"),
                        )))
                    }
                };
                let html = String::from_utf8_lossy(&resource.content).into_owned();
                let base = Url::parse(url).ok();
                Ok(inline_html(&html, job.fetcher.as_ref(), base.as_ref()).await)
            }
        }
    }

    async fn rasterize(&self, pdf: &[u8], scratch: &std::path::Path) -> Result<Vec<u8>, RenderError> {
        let pdf_path = scratch.join("document.pdf");
        let png_stem = scratch.join("page");
        fs::write(&pdf_path, pdf).await?;

        let mut command = Command::new(&self.rasterizer);
        command
            .arg("-png")
            .arg("-singlefile")
            .args(["-f", "1", "-l", "1", "-r", "96"])
            .arg(&pdf_path)
            .arg(&png_stem);
        run_command(command, &self.rasterizer, None, self.verbose).await?;
        Ok(fs::read(png_stem.with_extension("png")).await?)
    }
}

#[async_trait]
impl LayoutEngine for WeasyprintEngine {
    async fn render(&self, job: LayoutJob) -> Result<Vec<u8>, RenderError> {
        let html = self.load_document(&job).await?;

        fs::create_dir_all(&self.scratch_root).await?;
        let scratch = tempfile::Builder::new().prefix("weasy_").tempdir_in(&self.scratch_root)?;

        let mut command = Command::new(&self.binary);
        command.args(["--encoding", "utf-8"]);
        for (index, sheet) in job.stylesheets.iter().enumerate() {
            let path = scratch.path().join(format!("{index:03}.css"));
            fs::write(&path, &sheet.css).await?;
            command.arg("--stylesheet").arg(&path);
        }
        if self.verbose {
            command.arg("--verbose");
        }
        command.arg("-").arg("-");

        debug!(
            stylesheets = job.stylesheets.len(),
            html_bytes = html.len(),
            output = job.output.extension(),
            "Running weasyprint"
        );
        let pdf = check_output(
            run_command(command, &self.binary, Some(html.into_bytes()), self.verbose).await?,
            OutputMode::Pdf,
        )?;

        let result = match job.output {
            OutputMode::Pdf => Ok(pdf),
            OutputMode::Png => {
                let png = self.rasterize(&pdf, scratch.path()).await?;
                check_output(png, OutputMode::Png)
            }
        };

        let scratch_path = scratch.path().to_path_buf();
        if let Err(err) = scratch.close() {
            warn!(dir = %scratch_path.display(), error = %err, "Failed to remove scratch directory");
        }
        if let Ok(bytes) = &result {
            info!(bytes = bytes.len(), output = job.output.extension(), "weasyprint conversion finished");
        }
        result
    }

    async fn version(&self) -> Option<String> {
        probe_version(&self.binary).await
    }
}
