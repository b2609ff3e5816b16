use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use print_rest_core::config::ServiceConfig;
use tracing::{error, info, warn};

const TRUTHY: [&str; 7] = ["true", "1", "t", "y", "yes", "enabled", "¯\\_(ツ)_/¯"];

/// Loads the service configuration: an optional static YAML file, then the
/// process environment on top of it (see [`apply_env`]).
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    load_config_with(path, |name| env::var(name).ok())
}

/// [`load_config`] with an explicit variable source.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_yaml(path)?,
        None => {
            info!("No config file given, starting from defaults");
            ServiceConfig::default()
        }
    };
    apply_env(&mut config, lookup)?;
    Ok(config)
}

fn read_yaml(path: &Path) -> Result<ServiceConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    // An empty file deserialises as null, which means "all defaults".
    if content.trim().is_empty() {
        return Ok(ServiceConfig::default());
    }

    match serde_yaml::from_str::<ServiceConfig>(&content) {
        Ok(config) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Overrides `config` with every recognised variable `lookup` returns. A
/// variable that is set but blank counts as unset.
pub fn apply_env<F>(config: &mut ServiceConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = var("API_KEY") {
        info!("API_KEY found in env");
        config.api_key = Some(key);
    }
    if let Some(pattern) = var("ALLOWED_URL_PATTERN") {
        config.allowed_url_pattern = pattern;
    }
    if let Some(pattern) = var("BLOCKED_URL_PATTERN") {
        config.blocked_url_pattern = pattern;
    }
    if let Some(size) = var("MAX_UPLOAD_SIZE") {
        config.max_upload_size = parse_number("MAX_UPLOAD_SIZE", &size)?;
    }
    if let Some(dir) = var("TEMPLATE_DIRECTORY") {
        config.template_directory = PathBuf::from(dir);
    }
    if let Some(dir) = var("REPORT_DIRECTORY") {
        config.report_directory = PathBuf::from(dir);
    }
    if let Some(list) = var("UPLOAD_EXTENSIONS") {
        config.upload_extensions = parse_extensions(&list);
    }
    if let Some(size) = var("QR_BOX_SIZE") {
        config.qr.box_size = parse_number("QR_BOX_SIZE", &size)?;
    }
    if let Some(border) = var("QR_BORDER") {
        config.qr.border = parse_number("QR_BORDER", &border)?;
    }
    if let Some(flag) = var("ENABLE_DEBUG_MODE") {
        config.debug = is_truthy(&flag);
    }
    if let Some(flag) = var("ENABLE_CORS") {
        config.cors_enabled = is_truthy(&flag);
    }
    if let Some(origins) = var("CORS_ORIGINS") {
        config.cors_origins = origins;
    }
    if let Some(dir) = var("WORKSPACE_DIRECTORY") {
        config.workspace_directory = PathBuf::from(dir);
    }
    if let Some(binary) = var("WEASYPRINT_BINARY") {
        config.engines.weasyprint = PathBuf::from(binary);
    }
    if let Some(binary) = var("WKHTMLTOPDF_BINARY") {
        config.engines.wkhtmltopdf = PathBuf::from(binary);
    }
    if let Some(binary) = var("WKHTMLTOIMAGE_BINARY") {
        config.engines.wkhtmltoimage = PathBuf::from(binary);
    }
    if let Some(binary) = var("PDFTOPPM_BINARY") {
        config.engines.pdftoppm = PathBuf::from(binary);
    }
    if let Some(address) = var("BIND_ADDRESS") {
        config.bind_address = address;
    }
    Ok(())
}

pub fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TRUTHY.iter().any(|t| *t == value)
}

fn parse_number<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) => Ok(value),
        Err(e) => {
            error!(error = %e, var = name, value = raw, "Environment variable must be a number");
            Err(anyhow::anyhow!("{name} must be a valid number: {e}"))
        }
    }
}

/// `.png, jpg ,.PDF` -> `[".png", ".jpg", ".pdf"]`
fn parse_extensions(list: &str) -> Vec<String> {
    let extensions: Vec<String> = list
        .split(',')
        .map(|ext| ext.trim().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| if ext.starts_with('.') { ext } else { format!(".{ext}") })
        .collect();
    if extensions.is_empty() {
        warn!(value = list, "UPLOAD_EXTENSIONS has no usable entries, merge uploads will all be rejected");
    }
    extensions
}
