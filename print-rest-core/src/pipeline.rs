//! # pipeline: print and merge, end to end
//!
//! [`PrintService`] wires the Request Document Builder, the Conversion
//! Orchestrator and the PDF post-processor together. It is constructed once
//! and shared by every request handler.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::access::UrlPolicy;
use crate::builder::{DocumentBuilder, Payload};
use crate::config::ServiceConfig;
use crate::contract::{BrowserEngine, LayoutEngine};
use crate::engines::{WeasyprintEngine, WkhtmltopdfEngine};
use crate::error::PrintError;
use crate::pdf::{encrypt_pdf, image_to_pdf, load_pdf, PdfMerger};
use crate::printer::{ConversionInput, Printer};
use crate::registry::TemplateRegistry;
use crate::report::ReportRenderer;
use crate::request::{DocumentSource, MergeRequest, OutputMode, PrintRequest};

/// A finished document and how to present it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintedDocument {
    pub content: Vec<u8>,
    pub output: OutputMode,
    pub disposition: String,
    pub file_name: String,
}

impl PrintedDocument {
    pub fn content_type(&self) -> &'static str {
        self.output.content_type()
    }

    /// `inline; name="report"; filename="report.pdf"`
    pub fn content_disposition(&self) -> String {
        let disposition = header_safe(&self.disposition);
        let name = header_safe(&self.file_name);
        format!(
            "{disposition}; name=\"{name}\"; filename=\"{name}.{}\"",
            self.output.extension()
        )
    }
}

fn header_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect()
}

pub struct PrintService {
    builder: DocumentBuilder,
    printer: Printer,
}

impl PrintService {
    pub fn new(builder: DocumentBuilder, printer: Printer) -> Self {
        Self { builder, printer }
    }

    /// Builds the service with the subprocess engines configured in `config`.
    pub fn from_config(config: &ServiceConfig, registry: Arc<TemplateRegistry>) -> Self {
        let layout: Arc<dyn LayoutEngine> = Arc::new(WeasyprintEngine::new(
            &config.engines.weasyprint,
            &config.engines.pdftoppm,
            &config.workspace_directory,
            config.debug,
        ));
        let browser: Arc<dyn BrowserEngine> = Arc::new(WkhtmltopdfEngine::new(
            &config.engines.wkhtmltopdf,
            &config.engines.wkhtmltoimage,
            config.debug,
        ));
        Self::with_engines(config, registry, layout, browser)
    }

    /// Builds the service around the given engines.
    pub fn with_engines(
        config: &ServiceConfig,
        registry: Arc<TemplateRegistry>,
        layout: Arc<dyn LayoutEngine>,
        browser: Arc<dyn BrowserEngine>,
    ) -> Self {
        let reports = Arc::new(ReportRenderer::new(
            &config.report_directory,
            &config.template_directory,
            config.qr,
            config.debug,
        ));
        let policy = Arc::new(UrlPolicy::new(&config.allowed_url_pattern, &config.blocked_url_pattern));
        let printer = Printer::new(layout, browser, policy, &config.workspace_directory, !config.debug);
        Self::new(DocumentBuilder::new(registry, reports), printer)
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        self.builder.registry()
    }

    /// `(layout engine, headless engine)` versions.
    pub async fn engine_versions(&self) -> (Option<String>, Option<String>) {
        self.printer.versions().await
    }

    #[instrument(skip_all, fields(driver = %request.driver, source = request.source.kind()))]
    pub async fn print(&self, request: PrintRequest) -> Result<PrintedDocument, PrintError> {
        if request.output == OutputMode::Png {
            if matches!(request.source, DocumentSource::Batch { .. }) {
                return Err(PrintError::unprocessable("Report batches can only be printed as pdf"));
            }
            if request.password.is_some() {
                return Err(PrintError::unprocessable("Password protection is only available for pdf"));
            }
        }

        let document = self.builder.build(&request).await?;
        let content = match &document.payload {
            Payload::Html(html) => {
                self.printer
                    .convert(request.driver, ConversionInput::Html(html), &document.template, request.output, &request.options)
                    .await?
            }
            Payload::Url(url) => {
                self.printer
                    .convert(request.driver, ConversionInput::Url(url), &document.template, request.output, &request.options)
                    .await?
            }
            Payload::Batch(pages) => {
                let mut rendered = Vec::with_capacity(pages.len());
                for (index, html) in pages.iter().enumerate() {
                    debug!(record = index, "Converting batch record");
                    let pdf = self
                        .printer
                        .convert(request.driver, ConversionInput::Html(html), &document.template, OutputMode::Pdf, &request.options)
                        .await?;
                    rendered.push(pdf);
                }
                blocking(move || {
                    let mut merger = PdfMerger::new();
                    for pdf in &rendered {
                        merger.append_bytes(pdf, None)?;
                    }
                    merger.finish()
                })
                .await?
            }
        };

        let content = match (request.output, request.password.clone()) {
            (OutputMode::Pdf, Some(password)) => blocking(move || encrypt_pdf(content, Some(&password))).await?,
            _ => content,
        };

        info!(bytes = content.len(), output = request.output.extension(), "Printed document");
        Ok(PrintedDocument {
            content,
            output: request.output,
            disposition: request.disposition,
            file_name: request.file_name,
        })
    }

    /// Merges the uploads, converting images to single pages first.
    #[instrument(skip_all, fields(uploads = request.uploads.len(), selections = request.pages.len()))]
    pub async fn merge(&self, request: MergeRequest) -> Result<Vec<u8>, PrintError> {
        let merged = blocking(move || {
            let mut documents = Vec::with_capacity(request.uploads.len());
            for upload in &request.uploads {
                let pdf = if upload.is_pdf() {
                    upload.content.clone()
                } else {
                    image_to_pdf(&upload.content, &upload.file_name)?
                };
                let document = load_pdf(&pdf).map_err(|err| match err {
                    PrintError::Pdf(reason) => {
                        PrintError::bad_request(format!("Cannot read {}: {reason}", upload.file_name))
                    }
                    other => other,
                })?;
                documents.push((upload.file_name.clone(), document));
            }

            let mut merger = PdfMerger::new();
            if request.pages.is_empty() {
                for (_, document) in &documents {
                    merger.append(document, None)?;
                }
            } else {
                for selection in &request.pages {
                    let Some((_, document)) = documents.iter().find(|(name, _)| *name == selection.file) else {
                        return Err(PrintError::bad_request(format!("Unknown file '{}'", selection.file)));
                    };
                    merger.append(document, selection.range.as_ref())?;
                }
            }
            let pages = merger.page_count();
            let bytes = merger.finish()?;
            let bytes = encrypt_pdf(bytes, request.password.as_deref())?;
            Ok((pages, bytes))
        })
        .await?;

        let (pages, bytes) = merged;
        info!(pages, bytes = bytes.len(), "Merged documents");
        Ok(bytes)
    }
}

async fn blocking<T, F>(work: F) -> Result<T, PrintError>
where
    F: FnOnce() -> Result<T, PrintError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PrintError::Resource(format!("blocking task failed: {e}")))?
}
