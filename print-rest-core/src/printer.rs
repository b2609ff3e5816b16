//! Conversion Orchestrator: runs one HTML (or URL) through the selected
//! backend with the request's template.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::access::UrlPolicy;
use crate::contract::{BrowserEngine, BrowserJob, BrowserSource, LayoutEngine, LayoutJob, LayoutSource, RenderError};
use crate::error::PrintError;
use crate::fetch::TemplateFetcher;
use crate::request::{Driver, OutputMode};
use crate::template::Template;
use crate::workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionInput<'a> {
    Html(&'a str),
    Url(&'a str),
}

impl ConversionInput<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionInput::Html(_) => "html",
            ConversionInput::Url(_) => "url",
        }
    }
}

pub struct Printer {
    layout: Arc<dyn LayoutEngine>,
    browser: Arc<dyn BrowserEngine>,
    policy: Arc<UrlPolicy>,
    client: reqwest::Client,
    workspace_root: PathBuf,
    reuse_shared: bool,
}

impl Printer {
    pub fn new(
        layout: Arc<dyn LayoutEngine>,
        browser: Arc<dyn BrowserEngine>,
        policy: Arc<UrlPolicy>,
        workspace_root: impl Into<PathBuf>,
        reuse_shared: bool,
    ) -> Self {
        Self {
            layout,
            browser,
            policy,
            client: reqwest::Client::new(),
            workspace_root: workspace_root.into(),
            reuse_shared,
        }
    }

    pub async fn versions(&self) -> (Option<String>, Option<String>) {
        tokio::join!(self.layout.version(), self.browser.version())
    }

    pub async fn convert(
        &self,
        driver: Driver,
        input: ConversionInput<'_>,
        template: &Arc<Template>,
        output: OutputMode,
        options: &Map<String, Value>,
    ) -> Result<Vec<u8>, PrintError> {
        let result = match driver {
            Driver::Weasy => self.convert_direct(input, template, output).await,
            Driver::Wk => self.convert_headless(input, template, output, options).await,
        };
        match result {
            Ok(bytes) => {
                info!(%driver, source = input.kind(), output = output.extension(), bytes = bytes.len(), "Converted document");
                Ok(bytes)
            }
            Err(ConvertError::Render(RenderError::Blocked(url))) => {
                warn!(%driver, source = input.kind(), url = %url, "Conversion refused by URL policy");
                Err(PrintError::forbidden(format!("Access to {url} is not allowed")))
            }
            Err(ConvertError::Render(err)) => {
                error!(%driver, source = input.kind(), error = %err, "Conversion failed");
                Err(PrintError::Conversion {
                    driver: driver.to_string(),
                    source_kind: input.kind().to_string(),
                    reason: err.to_string(),
                })
            }
            Err(ConvertError::Print(err)) if err.is_client_error() => {
                warn!(%driver, source = input.kind(), error = %err, "Conversion refused");
                Err(err)
            }
            Err(ConvertError::Print(err)) => {
                error!(%driver, source = input.kind(), error = %err, "Conversion could not start");
                Err(err)
            }
        }
    }

    async fn convert_direct(
        &self,
        input: ConversionInput<'_>,
        template: &Arc<Template>,
        output: OutputMode,
    ) -> Result<Vec<u8>, ConvertError> {
        if let ConversionInput::Url(url) = input {
            if !self.policy.is_allowed(url) {
                return Err(PrintError::forbidden(format!("Access to {url} is not allowed")).into());
            }
        }
        let fetcher = Arc::new(TemplateFetcher::new(template.clone(), self.policy.clone(), self.client.clone()));
        let stylesheets = template.inlined_stylesheets(fetcher.as_ref()).await.to_vec();
        let job = LayoutJob {
            source: match input {
                ConversionInput::Html(html) => LayoutSource::Html(html.to_string()),
                ConversionInput::Url(url) => LayoutSource::Url(url.to_string()),
            },
            stylesheets,
            fetcher,
            output,
        };
        Ok(self.layout.render(job).await?)
    }

    async fn convert_headless(
        &self,
        input: ConversionInput<'_>,
        template: &Arc<Template>,
        output: OutputMode,
        options: &Map<String, Value>,
    ) -> Result<Vec<u8>, ConvertError> {
        let html = match input {
            ConversionInput::Url(url) => {
                let job = BrowserJob {
                    source: BrowserSource::Url(url.to_string()),
                    options: options.clone(),
                    output,
                };
                return Ok(self.browser.render(job).await?);
            }
            ConversionInput::Html(html) => html.to_string(),
        };

        let root = self.workspace_root.clone();
        let staged_template = template.clone();
        let reuse_shared = self.reuse_shared;
        let staged = tokio::task::spawn_blocking(move || workspace::stage(&root, &staged_template, &html, reuse_shared))
            .await
            .map_err(|e| PrintError::Resource(format!("staging task failed: {e}")))??;

        let source = match &staged {
            Some(staged) => BrowserSource::File(staged.html_file().to_path_buf()),
            None => match input {
                ConversionInput::Html(html) => BrowserSource::Html(html.to_string()),
                ConversionInput::Url(url) => BrowserSource::Url(url.to_string()),
            },
        };
        let job = BrowserJob {
            source,
            options: options.clone(),
            output,
        };
        let result = self.browser.render(job).await;
        // Workspace cleanup happens here, before the result is inspected.
        drop(staged);
        Ok(result?)
    }
}

enum ConvertError {
    Render(RenderError),
    Print(PrintError),
}

impl From<RenderError> for ConvertError {
    fn from(err: RenderError) -> Self {
        ConvertError::Render(err)
    }
}

impl From<PrintError> for ConvertError {
    fn from(err: PrintError) -> Self {
        ConvertError::Print(err)
    }
}
