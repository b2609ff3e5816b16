use std::collections::HashMap;
use std::env;
use std::fs::write;
use std::path::PathBuf;

use print_rest::load_config::{is_truthy, load_config, load_config_with};
use serial_test::serial;
use tempfile::NamedTempFile;

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| map.get(name).cloned()
}

#[test]
fn test_defaults_without_file_or_env() {
    let config = load_config_with(None, vars(&[])).expect("defaults should load");

    assert_eq!(config.api_key, None);
    assert_eq!(config.allowed_url_pattern, "^$");
    assert_eq!(config.blocked_url_pattern, "^.*$");
    assert_eq!(config.max_upload_size, 104_857_600);
    assert_eq!(config.template_directory, PathBuf::from("/data/templates"));
    assert_eq!(config.qr.box_size, 10);
    assert_eq!(config.qr.border, 4);
    assert!(config.cors_enabled);
    assert!(!config.debug);
    assert!(config.upload_extensions.contains(&".pdf".to_string()));
}

#[test]
fn test_yaml_file_then_env_overrides() {
    let yaml = r#"
template_directory: /srv/templates
max_upload_size: 1024
qr:
  box_size: 6
engines:
  weasyprint: /opt/weasyprint/bin/weasyprint
"#;
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();

    let config = load_config_with(
        Some(file.path()),
        vars(&[
            ("API_KEY", "top-secret"),
            ("MAX_UPLOAD_SIZE", "2048"),
            ("QR_BORDER", "2"),
            ("ENABLE_DEBUG_MODE", "Yes"),
            ("ENABLE_CORS", "off"),
            ("UPLOAD_EXTENSIONS", "pdf, .PNG"),
        ]),
    )
    .expect("config should load");

    assert_eq!(config.template_directory, PathBuf::from("/srv/templates"));
    assert_eq!(config.engines.weasyprint, PathBuf::from("/opt/weasyprint/bin/weasyprint"));
    assert_eq!(config.engines.wkhtmltopdf, PathBuf::from("wkhtmltopdf"));
    assert_eq!(config.api_key.as_deref(), Some("top-secret"));
    assert_eq!(config.max_upload_size, 2048);
    assert_eq!(config.qr.box_size, 6);
    assert_eq!(config.qr.border, 2);
    assert!(config.debug);
    assert!(!config.cors_enabled);
    assert_eq!(config.upload_extensions, vec![".pdf", ".png"]);
}

#[test]
fn test_blank_env_values_count_as_unset() {
    let config = load_config_with(None, vars(&[("API_KEY", ""), ("MAX_UPLOAD_SIZE", "  ")])).unwrap();
    assert_eq!(config.api_key, None);
    assert_eq!(config.max_upload_size, 104_857_600);
}

#[test]
fn test_unparseable_number_is_an_error() {
    let err = load_config_with(None, vars(&[("QR_BOX_SIZE", "ten")])).unwrap_err();
    assert!(err.to_string().contains("QR_BOX_SIZE"));
}

#[test]
fn test_malformed_yaml_is_an_error() {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), "max_upload_size: [not, a, number]\n").unwrap();

    let err = load_config_with(Some(file.path()), vars(&[])).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
fn test_missing_file_is_an_error() {
    let missing = PathBuf::from("/nonexistent/print-rest.yaml");
    assert!(load_config_with(Some(missing.as_path()), vars(&[])).is_err());
}

#[test]
fn test_truthy_spellings() {
    for value in ["true", "1", "t", "Y", "yes", "ENABLED", "¯\\_(ツ)_/¯"] {
        assert!(is_truthy(value), "{value} should be truthy");
    }
    for value in ["false", "0", "no", "off", ""] {
        assert!(!is_truthy(value), "{value} should be falsy");
    }
}

/// The real loader reads the process environment.
#[test]
#[serial]
fn test_load_config_reads_process_env() {
    env::set_var("TEMPLATE_DIRECTORY", "/tmp/print-rest-templates");
    env::set_var("CORS_ORIGINS", "https://a.example, https://b.example");

    let config = load_config(None).expect("Config should load");

    env::remove_var("TEMPLATE_DIRECTORY");
    env::remove_var("CORS_ORIGINS");

    assert_eq!(config.template_directory, PathBuf::from("/tmp/print-rest-templates"));
    assert_eq!(config.cors_origins, "https://a.example, https://b.example");
}
