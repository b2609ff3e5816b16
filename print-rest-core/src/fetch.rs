//! # fetch: the URL-fetch hook used during rendering
//!
//! Every resource reference a document makes goes through a [`UrlFetcher`].
//! [`TemplateFetcher`] serves references that name a file of the resolved
//! template from memory, and sends everything else through the
//! [`UrlPolicy`] before fetching it over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
#[allow(unused_imports)]
use mockall::{automock, predicate::*};
use tracing::{debug, warn};

use crate::access::UrlPolicy;
use crate::template::Template;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub content: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from the template or fetched remotely.
    Resolved(FetchedResource),
    /// Leave the reference untouched (`data:` URIs, fragments).
    Keep,
    /// Denied by the access policy.
    Blocked,
    /// Allowed but could not be retrieved.
    Unavailable,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait UrlFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> FetchOutcome;
}

pub struct TemplateFetcher {
    template: Arc<Template>,
    policy: Arc<UrlPolicy>,
    client: reqwest::Client,
}

impl TemplateFetcher {
    pub fn new(template: Arc<Template>, policy: Arc<UrlPolicy>, client: reqwest::Client) -> Self {
        Self {
            template,
            policy,
            client,
        }
    }

    async fn fetch_remote(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url, error = %err, "Failed to fetch resource");
                return FetchOutcome::Unavailable;
            }
        };
        if !response.status().is_success() {
            warn!(url, status = %response.status(), "Resource fetch returned an error status");
            return FetchOutcome::Unavailable;
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| guess_type(url));
        match response.bytes().await {
            Ok(bytes) => {
                debug!(url, bytes = bytes.len(), "Fetched remote resource");
                FetchOutcome::Resolved(FetchedResource {
                    content: bytes.to_vec(),
                    content_type,
                })
            }
            Err(err) => {
                warn!(url, error = %err, "Failed to read resource body");
                FetchOutcome::Unavailable
            }
        }
    }
}

#[async_trait]
impl UrlFetcher for TemplateFetcher {
    async fn fetch(&self, reference: &str) -> FetchOutcome {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with('#') || reference.starts_with("data:") {
            return FetchOutcome::Keep;
        }
        if !is_remote(reference) {
            let path = reference.split(['?', '#']).next().unwrap_or(reference);
            if let Some(item) = self.template.get_asset(path) {
                debug!(reference, path = %item.path, "Serving reference from template");
                return FetchOutcome::Resolved(FetchedResource {
                    content: item.content.clone(),
                    content_type: item.content_type.clone(),
                });
            }
        }
        if !self.policy.is_allowed(reference) {
            warn!(reference, "Blocked resource by URL policy");
            return FetchOutcome::Blocked;
        }
        if is_remote(reference) {
            self.fetch_remote(reference).await
        } else {
            // Unknown local references are never read from the server's disk.
            debug!(reference, "Reference is not a template file");
            FetchOutcome::Unavailable
        }
    }
}

fn is_remote(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub(crate) fn guess_type(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
