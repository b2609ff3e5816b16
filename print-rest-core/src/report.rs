//! # report: server-side HTML reports
//!
//! Reports are Handlebars templates stored under the report directory and
//! addressed by their relative path. Each report is compiled on first use
//! and kept; in hot reload mode Handlebars re-reads the file on every render.
//!
//! The `qrcode` helper turns a value into an inline PNG data URI:
//!
//! ```handlebars
//! <img src="{{qrcode invoice.url "brand/logo.png"}}">
//! ```

use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderErrorReason,
};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::QrConfig;
use crate::error::PrintError;
use crate::qr::generate_qrcode;

pub struct ReportRenderer {
    directory: PathBuf,
    handlebars: RwLock<Handlebars<'static>>,
}

impl ReportRenderer {
    pub fn new(directory: impl Into<PathBuf>, template_directory: impl Into<PathBuf>, qr: QrConfig, hot_reload: bool) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_dev_mode(hot_reload);
        handlebars.register_helper(
            "qrcode",
            Box::new(QrCodeHelper {
                template_directory: template_directory.into(),
                config: qr,
            }),
        );
        Self {
            directory: directory.into(),
            handlebars: RwLock::new(handlebars),
        }
    }

    /// Renders one report against one data record.
    pub fn render(&self, report: &str, data: &Value) -> Result<String, PrintError> {
        self.ensure_registered(report)?;
        let handlebars = self.handlebars.read().unwrap_or_else(|p| p.into_inner());
        let html = handlebars.render(report, data).map_err(|err| {
            error!(report, error = %err, "Report rendering failed");
            PrintError::Report(err.to_string())
        })?;
        debug!(report, bytes = html.len(), "Rendered report");
        Ok(html)
    }

    /// Renders one HTML document per record, in record order. The first
    /// failing record fails the whole batch.
    pub fn render_batch(&self, report: &str, records: &[Value]) -> Result<Vec<String>, PrintError> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                self.render(report, record).map_err(|err| match err {
                    PrintError::Report(reason) => PrintError::Report(format!("record {index}: {reason}")),
                    other => other,
                })
            })
            .collect()
    }

    fn ensure_registered(&self, report: &str) -> Result<(), PrintError> {
        let path = self.report_path(report)?;
        if !path.is_file() {
            return Err(PrintError::bad_request(format!("Report '{report}' not found")));
        }
        if self
            .handlebars
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .has_template(report)
        {
            return Ok(());
        }

        let mut handlebars = self.handlebars.write().unwrap_or_else(|p| p.into_inner());
        if handlebars.has_template(report) {
            return Ok(());
        }
        handlebars.register_template_file(report, &path).map_err(|err| {
            error!(report, path = %path.display(), error = %err, "Cannot compile report");
            PrintError::Report(err.to_string())
        })?;
        info!(report, path = %path.display(), "Compiled report");
        Ok(())
    }

    fn report_path(&self, report: &str) -> Result<PathBuf, PrintError> {
        let relative = Path::new(report);
        let safe = !report.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(PrintError::bad_request(format!("Invalid report name '{report}'")));
        }
        Ok(self.directory.join(relative))
    }
}

struct QrCodeHelper {
    template_directory: PathBuf,
    config: QrConfig,
}

impl HelperDef for QrCodeHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let value = h
            .param(0)
            .map(|p| p.value())
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("qrcode", 0))?;
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        let logo = h
            .param(1)
            .and_then(|p| p.value().as_str())
            .filter(|s| !s.is_empty() && !s.contains(".."))
            .map(|s| self.template_directory.join(s.trim_start_matches('/')));

        let uri = generate_qrcode(&text, logo.as_deref(), &self.config)
            .map_err(|e| RenderErrorReason::Other(e.to_string()))?;
        out.write(&uri)?;
        Ok(())
    }
}
