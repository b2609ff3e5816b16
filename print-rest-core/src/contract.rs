//! # contract: rendering backend interfaces
//!
//! The two rendering backends sit behind narrow async traits so the
//! orchestrator can be exercised with mocks:
//!
//! - [`LayoutEngine`]: direct HTML/CSS layout. Receives the document, the
//!   template's style sheets and a [`UrlFetcher`] through which every
//!   referenced resource must be resolved.
//! - [`BrowserEngine`]: headless browser. Resolves relative references
//!   through the file system, so templated documents arrive as a staged
//!   file.
//!
//! Both traits are annotated for `mockall`; mocks are exported behind the
//! `test-export-mocks` feature.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
#[allow(unused_imports)]
use mockall::{automock, predicate::*};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::fetch::UrlFetcher;
use crate::request::OutputMode;
use crate::template::Stylesheet;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
    #[error("engine produced malformed output: {0}")]
    MalformedOutput(String),
    #[error("access to {0} was denied")]
    Blocked(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutSource {
    Html(String),
    Url(String),
}

pub struct LayoutJob {
    pub source: LayoutSource,
    /// Template style sheets in cascade order, `url(...)` references
    /// already inlined.
    pub stylesheets: Vec<Stylesheet>,
    pub fetcher: Arc<dyn UrlFetcher>,
    pub output: OutputMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowserSource {
    Html(String),
    Url(String),
    /// A staged HTML file; relative references resolve next to it.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserJob {
    pub source: BrowserSource,
    /// Engine flags, `{"page-size": "A4"}` style.
    pub options: Map<String, Value>,
    pub output: OutputMode,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    async fn render(&self, job: LayoutJob) -> Result<Vec<u8>, RenderError>;

    /// Engine version for diagnostics, when it can be determined.
    async fn version(&self) -> Option<String>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn render(&self, job: BrowserJob) -> Result<Vec<u8>, RenderError>;

    async fn version(&self) -> Option<String>;
}
