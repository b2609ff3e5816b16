//! Request Document Builder: turns a decoded [`PrintRequest`] into a
//! layered template plus the HTML (or URL) payload to convert.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::PrintError;
use crate::registry::TemplateRegistry;
use crate::report::ReportRenderer;
use crate::request::{DocumentSource, PrintRequest};
use crate::template::Template;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Html(String),
    Url(String),
    /// One HTML document per record, in record order.
    Batch(Vec<String>),
}

#[derive(Debug)]
pub struct BuiltDocument {
    pub template: Arc<Template>,
    pub payload: Payload,
}

pub struct DocumentBuilder {
    registry: Arc<TemplateRegistry>,
    reports: Arc<ReportRenderer>,
}

impl DocumentBuilder {
    pub fn new(registry: Arc<TemplateRegistry>, reports: Arc<ReportRenderer>) -> Self {
        Self { registry, reports }
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub async fn build(&self, request: &PrintRequest) -> Result<BuiltDocument, PrintError> {
        let template = self.build_template(request).await?;
        let payload = self.build_payload(&request.source).await?;
        Ok(BuiltDocument { template, payload })
    }

    /// Registry template (or none) with the request's styles and assets on top.
    pub async fn build_template(&self, request: &PrintRequest) -> Result<Arc<Template>, PrintError> {
        let base = match &request.template {
            Some(name) => {
                let registry = self.registry.clone();
                let lookup = name.clone();
                let found = tokio::task::spawn_blocking(move || registry.get(&lookup))
                    .await
                    .map_err(|e| PrintError::Resource(format!("template lookup task failed: {e}")))??;
                if found.is_none() {
                    warn!(template = %name, "Unknown template, continuing without a base");
                }
                found
            }
            None => None,
        };
        let template = Template::layered(base, request.styles.clone(), request.assets.clone());
        debug!(
            base = ?template.base().and_then(|b| b.name()),
            styles = template.styles().len(),
            assets = template.assets().len(),
            "Built request template"
        );
        Ok(Arc::new(template))
    }

    async fn build_payload(&self, source: &DocumentSource) -> Result<Payload, PrintError> {
        match source {
            DocumentSource::Batch { report, records } => {
                let reports = self.reports.clone();
                let (report, records) = (report.clone(), records.clone());
                let count = records.len();
                let rendered = tokio::task::spawn_blocking(move || reports.render_batch(&report, &records))
                    .await
                    .map_err(|e| PrintError::Resource(format!("report task failed: {e}")))??;
                info!(records = count, "Rendered report batch");
                Ok(Payload::Batch(rendered))
            }
            DocumentSource::Report { report, data } => {
                let reports = self.reports.clone();
                let (report, data) = (report.clone(), data.clone());
                let html = tokio::task::spawn_blocking(move || reports.render(&report, &data))
                    .await
                    .map_err(|e| PrintError::Resource(format!("report task failed: {e}")))??;
                Ok(Payload::Html(html))
            }
            DocumentSource::Url(url) => Ok(Payload::Url(url.clone())),
            DocumentSource::Html(html) => Ok(Payload::Html(html.clone())),
        }
    }
}
