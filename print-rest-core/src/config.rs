use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Effective service configuration. Loaded once at startup and shared
/// read-only by every request.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_key: Option<String>,
    pub allowed_url_pattern: String,
    pub blocked_url_pattern: String,
    pub max_upload_size: usize,
    pub template_directory: PathBuf,
    pub report_directory: PathBuf,
    pub upload_extensions: Vec<String>,
    pub qr: QrConfig,
    pub debug: bool,
    pub cors_enabled: bool,
    pub cors_origins: String,
    pub workspace_directory: PathBuf,
    pub engines: EngineConfig,
    pub bind_address: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            allowed_url_pattern: "^$".to_string(),
            blocked_url_pattern: "^.*$".to_string(),
            max_upload_size: 100 * 1024 * 1024,
            template_directory: PathBuf::from("/data/templates"),
            report_directory: PathBuf::from("/data/reports"),
            upload_extensions: default_upload_extensions(),
            qr: QrConfig::default(),
            debug: false,
            cors_enabled: true,
            cors_origins: "*".to_string(),
            workspace_directory: std::env::temp_dir(),
            engines: EngineConfig::default(),
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

pub fn default_upload_extensions() -> Vec<String> {
    [".png", ".jpg", ".jpeg", ".tiff", ".bmp", ".gif", ".pdf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ServiceConfig {
    pub fn trace_loaded(&self) {
        info!(
            api_key_set = self.api_key.is_some(),
            template_directory = %self.template_directory.display(),
            report_directory = %self.report_directory.display(),
            workspace_directory = %self.workspace_directory.display(),
            max_upload_size = self.max_upload_size,
            debug = self.debug,
            cors_enabled = self.cors_enabled,
            "Loaded ServiceConfig"
        );
        debug!(?self, "ServiceConfig loaded (full debug)");
    }
}

// The API key must never end up in a log line.
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("allowed_url_pattern", &self.allowed_url_pattern)
            .field("blocked_url_pattern", &self.blocked_url_pattern)
            .field("max_upload_size", &self.max_upload_size)
            .field("template_directory", &self.template_directory)
            .field("report_directory", &self.report_directory)
            .field("upload_extensions", &self.upload_extensions)
            .field("qr", &self.qr)
            .field("debug", &self.debug)
            .field("cors_enabled", &self.cors_enabled)
            .field("cors_origins", &self.cors_origins)
            .field("workspace_directory", &self.workspace_directory)
            .field("engines", &self.engines)
            .field("bind_address", &self.bind_address)
            .finish()
    }
}

/// QR code geometry: pixels per module and quiet-zone width in modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    pub box_size: u32,
    pub border: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            box_size: 10,
            border: 4,
        }
    }
}

/// Executables backing the rendering engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weasyprint: PathBuf,
    pub wkhtmltopdf: PathBuf,
    pub wkhtmltoimage: PathBuf,
    pub pdftoppm: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weasyprint: PathBuf::from("weasyprint"),
            wkhtmltopdf: PathBuf::from("wkhtmltopdf"),
            wkhtmltoimage: PathBuf::from("wkhtmltoimage"),
            pdftoppm: PathBuf::from("pdftoppm"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_api_key() {
        let config = ServiceConfig {
            api_key: Some("SECRET_API_KEY".into()),
            ..ServiceConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("SECRET_API_KEY"));
        assert!(rendered.contains("<redacted>"));
    }
}
