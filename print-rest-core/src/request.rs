//! # request: typed decoding of print and merge requests
//!
//! The HTTP layer collects raw fields into [`RequestFields`]; this module
//! turns them into a [`PrintRequest`] or [`MergeRequest`] in one validation
//! pass. Field lookup checks form values, then query arguments, then file
//! uploads, and the first source that has the name wins. A list field
//! `name[]` falls back to the singular `name`.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PrintError;
use crate::fetch::guess_type;
use crate::pdf::PageRange;
use crate::template::FileItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File(UploadedFile),
}

impl FieldValue {
    fn into_text(self) -> String {
        match self {
            FieldValue::Text(text) => text,
            FieldValue::File(file) => String::from_utf8_lossy(&file.content).into_owned(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RequestFields {
    form: Vec<(String, String)>,
    query: Vec<(String, String)>,
    files: Vec<(String, UploadedFile)>,
}

impl RequestFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_form(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.form.push((name.into(), value.into()));
    }

    pub fn push_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query.push((name.into(), value.into()));
    }

    pub fn push_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.files.push((name.into(), file));
    }

    /// Builder-style helpers for tests and in-process callers.
    pub fn with_form(mut self, name: &str, value: &str) -> Self {
        self.push_form(name, value);
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.push_query(name, value);
        self
    }

    pub fn with_file(mut self, name: &str, file_name: &str, content: &[u8]) -> Self {
        self.push_file(
            name,
            UploadedFile {
                file_name: Some(file_name.to_string()),
                content_type: None,
                content: content.to_vec(),
            },
        );
        self
    }

    fn values(&self, name: &str) -> Vec<FieldValue> {
        let form: Vec<FieldValue> = self
            .form
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| FieldValue::Text(v.clone()))
            .collect();
        if !form.is_empty() {
            return form;
        }
        let query: Vec<FieldValue> = self
            .query
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| FieldValue::Text(v.clone()))
            .collect();
        if !query.is_empty() {
            return query;
        }
        self.files
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, f)| FieldValue::File(f.clone()))
            .collect()
    }

    pub fn value(&self, name: &str) -> Option<FieldValue> {
        self.values(name).into_iter().next()
    }

    /// The field as text; uploaded files are read as UTF-8.
    pub fn text(&self, name: &str) -> Option<String> {
        self.value(name).map(FieldValue::into_text)
    }

    /// All values of `name[]`, or of `name` when the list form is absent.
    pub fn list(&self, name: &str) -> Vec<FieldValue> {
        let values = self.values(&format!("{name}[]"));
        if values.is_empty() {
            self.values(name)
        } else {
            values
        }
    }

    /// Uploaded files only, under the exact field name.
    pub fn uploads(&self, name: &str) -> Vec<UploadedFile> {
        self.files
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, f)| f.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Driver {
    /// Direct layout engine (WeasyPrint).
    #[default]
    Weasy,
    /// Headless browser engine (wkhtmltopdf).
    Wk,
}

impl FromStr for Driver {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weasy" => Ok(Driver::Weasy),
            "wk" => Ok(Driver::Wk),
            other => Err(PrintError::unprocessable(format!(
                "Invalid value for driver '{other}'! only 'weasy' or 'wk' supported"
            ))),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Driver::Weasy => "weasy",
            Driver::Wk => "wk",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Pdf,
    Png,
}

impl OutputMode {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputMode::Pdf => "application/pdf",
            OutputMode::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputMode::Pdf => "pdf",
            OutputMode::Png => "png",
        }
    }
}

impl FromStr for OutputMode {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(OutputMode::Pdf),
            "png" => Ok(OutputMode::Png),
            other => Err(PrintError::unprocessable(format!(
                "Invalid value for mode '{other}'! only 'pdf' or 'png' supported"
            ))),
        }
    }
}

/// Where the document comes from. Exactly one per request.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    /// Render a report once per record and merge the results.
    Batch { report: String, records: Vec<Value> },
    Report { report: String, data: Value },
    Url(String),
    Html(String),
}

impl DocumentSource {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentSource::Batch { .. } => "report batch",
            DocumentSource::Report { .. } => "report",
            DocumentSource::Url(_) => "url",
            DocumentSource::Html(_) => "html",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrintRequest {
    pub driver: Driver,
    pub source: DocumentSource,
    pub template: Option<String>,
    pub styles: Vec<FileItem>,
    pub assets: Vec<FileItem>,
    pub password: Option<String>,
    pub output: OutputMode,
    pub disposition: String,
    /// Base name without extension.
    pub file_name: String,
    pub options: Map<String, Value>,
}

pub const MISSING_SOURCE: &str = "Required argument 'html' or 'url' or report is missing.";

impl PrintRequest {
    /// A plain HTML-to-PDF request with every other field defaulted.
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            driver: Driver::Weasy,
            source: DocumentSource::Html(html.into()),
            template: None,
            styles: Vec::new(),
            assets: Vec::new(),
            password: None,
            output: OutputMode::Pdf,
            disposition: "inline".to_string(),
            file_name: "document".to_string(),
            options: Map::new(),
        }
    }

    pub fn from_fields(fields: &RequestFields) -> Result<Self, PrintError> {
        let driver = match non_empty(fields.text("driver")) {
            Some(value) => value.parse::<Driver>()?,
            None => Driver::default(),
        };
        let output = match non_empty(fields.text("mode")) {
            Some(value) => value.parse::<OutputMode>()?,
            None => OutputMode::default(),
        };

        let source = decode_source(fields)?;
        let styles = named_items(fields.list("style"), "style", "css");
        let assets = named_items(fields.list("asset"), "asset", "");

        let options = match non_empty(fields.text("options")) {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err(PrintError::bad_request("Field 'options' must be a JSON object")),
                Err(e) => return Err(PrintError::bad_request(format!("Malformed JSON in 'options': {e}"))),
            },
            None => Map::new(),
        };

        let request = Self {
            driver,
            source,
            template: non_empty(fields.text("template")),
            styles,
            assets,
            password: non_empty(fields.text("password")),
            output,
            disposition: non_empty(fields.text("disposition")).unwrap_or_else(|| "inline".to_string()),
            file_name: base_name(&non_empty(fields.text("file_name")).unwrap_or_else(|| "document.pdf".to_string())),
            options,
        };
        debug!(
            driver = %request.driver,
            source = request.source.kind(),
            template = ?request.template,
            styles = request.styles.len(),
            assets = request.assets.len(),
            "Decoded print request"
        );
        Ok(request)
    }
}

fn decode_source(fields: &RequestFields) -> Result<DocumentSource, PrintError> {
    if let Some(report) = non_empty(fields.text("report")) {
        if let Some(raw) = non_empty(fields.text("data_set")) {
            let records = match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(records)) => records,
                Ok(_) => return Err(PrintError::bad_request("Field 'data_set' must be a JSON list")),
                Err(e) => return Err(PrintError::bad_request(format!("Malformed JSON in 'data_set': {e}"))),
            };
            if records.is_empty() {
                return Err(PrintError::bad_request("Field 'data_set' must not be empty"));
            }
            if let Some(index) = records.iter().position(|r| !r.is_object()) {
                return Err(PrintError::bad_request(format!(
                    "Record {index} of 'data_set' must be a JSON object"
                )));
            }
            return Ok(DocumentSource::Batch { report, records });
        }

        let raw = non_empty(fields.text("data")).unwrap_or_else(|| "{}".to_string());
        let data = match serde_json::from_str::<Value>(&raw) {
            Ok(data @ Value::Object(_)) => data,
            Ok(_) => return Err(PrintError::bad_request("Field 'data' must be a JSON object")),
            Err(e) => return Err(PrintError::bad_request(format!("Malformed JSON in 'data': {e}"))),
        };
        return Ok(DocumentSource::Report { report, data });
    }

    if let Some(url) = non_empty(fields.text("url")) {
        return Ok(DocumentSource::Url(url));
    }
    match fields.value("html") {
        Some(value) => Ok(DocumentSource::Html(value.into_text())),
        None => Err(PrintError::unprocessable(MISSING_SOURCE)),
    }
}

/// Turns style/asset field values into template files. Uploads keep their
/// file name; inline text gets a generated one.
fn named_items(values: Vec<FieldValue>, stem: &str, extension: &str) -> Vec<FileItem> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let generated = || {
                let suffix = if index == 0 { String::new() } else { format!("-{index}") };
                if extension.is_empty() {
                    format!("{stem}{suffix}")
                } else {
                    format!("{stem}{suffix}.{extension}")
                }
            };
            match value {
                FieldValue::Text(text) => {
                    let path = generated();
                    let content_type = if extension == "css" { "text/css".to_string() } else { guess_type(&path) };
                    FileItem::new(path, text.into_bytes(), content_type)
                }
                FieldValue::File(file) => {
                    let path = file
                        .file_name
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(generated);
                    match file.content_type.filter(|t| !t.is_empty() && t != "application/octet-stream") {
                        Some(content_type) => FileItem::new(path, file.content, content_type),
                        None => FileItem::guessed(path, file.content),
                    }
                }
            }
        })
        .collect()
}

/// One upload of a merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeUpload {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl MergeUpload {
    pub fn is_pdf(&self) -> bool {
        extension(&self.file_name).eq_ignore_ascii_case(".pdf")
    }
}

/// One entry of a merge selection: a file and an optional page range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pub file: String,
    pub range: Option<PageRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub uploads: Vec<MergeUpload>,
    /// Empty means every upload, whole, in upload order.
    pub pages: Vec<PageSelection>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
struct JsonSelection {
    file: String,
    #[serde(default)]
    range: Option<String>,
}

impl MergeRequest {
    pub fn from_fields(fields: &RequestFields, allowed_extensions: &[String]) -> Result<Self, PrintError> {
        let files = fields.uploads("files[]");
        if files.is_empty() {
            return Err(PrintError::bad_request("No file part in the request"));
        }

        let mut uploads: Vec<MergeUpload> = Vec::with_capacity(files.len());
        for file in files {
            let file_name = file.file_name.clone().unwrap_or_default();
            let ext = extension(&file_name).to_ascii_lowercase();
            if !allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
                return Err(PrintError::bad_request(format!("Invalid file format {file_name}")));
            }
            let stem = base_name(&file_name);
            if uploads.iter().any(|u| base_name(&u.file_name) == stem) {
                return Err(PrintError::bad_request(format!("Duplicate file name found {file_name}")));
            }
            uploads.push(MergeUpload {
                file_name,
                content: file.content,
            });
        }

        let pages = match non_empty(fields.text("pages")) {
            Some(raw) => parse_pages(&raw)?,
            None => Vec::new(),
        };
        for selection in &pages {
            if !uploads.iter().any(|u| u.file_name == selection.file) {
                return Err(PrintError::bad_request(format!(
                    "Page selection refers to unknown file '{}'",
                    selection.file
                )));
            }
        }

        Ok(Self {
            uploads,
            pages,
            password: non_empty(fields.text("password")),
        })
    }
}

/// Parses the `pages` field: a JSON list of `{file, range?}` objects, or the
/// space-separated form `a.pdf~0:2,5 b.pdf`.
pub fn parse_pages(raw: &str) -> Result<Vec<PageSelection>, PrintError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        let entries: Vec<JsonSelection> = serde_json::from_str(trimmed)
            .map_err(|e| PrintError::bad_request(format!("Malformed JSON in 'pages': {e}")))?;
        return entries
            .into_iter()
            .map(|entry| selection(entry.file, entry.range.as_deref()))
            .collect();
    }

    let mut selections = Vec::new();
    for token in trimmed.split_whitespace() {
        match token.split_once('~') {
            Some((file, ranges)) => {
                for range in ranges.split(',') {
                    selections.push(selection(file.to_string(), Some(range))?);
                }
            }
            None => selections.push(selection(token.to_string(), None)?),
        }
    }
    Ok(selections)
}

fn selection(file: String, range: Option<&str>) -> Result<PageSelection, PrintError> {
    let range = match range.map(str::trim) {
        None | Some("") | Some(":") => None,
        Some(text) => Some(PageRange::parse(text).map_err(|e| PrintError::bad_request(e.to_string()))?),
    };
    Ok(PageSelection { file, range })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// File extension including the dot, or "" when there is none.
fn extension(file_name: &str) -> &str {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(index) => &name[index..],
    }
}

/// File name without directory and without its last extension.
pub fn base_name(file_name: &str) -> String {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let ext = extension(name);
    name[..name.len() - ext.len()].to_string()
}
