//! # template: resolved style/asset bundles
//!
//! A [`Template`] is an immutable set of style sheets and asset files, with an
//! optional base template underneath it. Request-level templates layer
//! uploaded overrides on top of a registry template; lookups are scoped per
//! relative path, so a request file shadows exactly the base file with the
//! same path and nothing else.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use futures::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::engines::inline::inline_css;
use crate::fetch::UrlFetcher;

/// One named file of a template: a relative path, its bytes and a content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    pub path: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl FileItem {
    pub fn new(path: impl Into<String>, content: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            path: normalize_asset_path(&path.into()),
            content,
            content_type: content_type.into(),
        }
    }

    /// Builds an item whose content type is guessed from the file extension.
    pub fn guessed(path: impl Into<String>, content: Vec<u8>) -> Self {
        let path = normalize_asset_path(&path.into());
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            path,
            content,
            content_type,
        }
    }
}

/// A style sheet as handed to the layout engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    pub path: String,
    pub css: String,
}

#[derive(Debug, Default)]
pub struct Template {
    name: Option<String>,
    styles: Vec<FileItem>,
    assets: Vec<FileItem>,
    base: Option<Arc<Template>>,
    stylesheets: OnceLock<Vec<Stylesheet>>,
    inlined: OnceCell<Vec<Stylesheet>>,
}

impl Template {
    /// Builds a template. Paths must be unique within `styles` and within
    /// `assets`; later duplicates are dropped with a warning.
    pub fn new(
        name: Option<String>,
        styles: Vec<FileItem>,
        assets: Vec<FileItem>,
        base: Option<Arc<Template>>,
    ) -> Self {
        Self {
            styles: dedupe(name.as_deref(), styles),
            assets: dedupe(name.as_deref(), assets),
            name,
            base,
            stylesheets: OnceLock::new(),
            inlined: OnceCell::new(),
        }
    }

    /// A request-level template: unnamed overrides layered on `base`.
    pub fn layered(base: Option<Arc<Template>>, styles: Vec<FileItem>, assets: Vec<FileItem>) -> Self {
        Self::new(None, styles, assets, base)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn base(&self) -> Option<&Arc<Template>> {
        self.base.as_ref()
    }

    pub fn styles(&self) -> &[FileItem] {
        &self.styles
    }

    pub fn assets(&self) -> &[FileItem] {
        &self.assets
    }

    /// True when this layer carries files of its own (not counting the base).
    pub fn has_own_files(&self) -> bool {
        !self.styles.is_empty() || !self.assets.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_own_files() && self.base.as_ref().map_or(true, |b| b.is_empty())
    }

    /// Looks up a file by relative path: own assets, own styles, then the base.
    pub fn get_asset(&self, path: &str) -> Option<&FileItem> {
        let path = normalize_asset_path(path);
        self.own_file(&path)
            .or_else(|| self.base.as_ref().and_then(|base| base.get_asset(&path)))
    }

    fn own_file(&self, path: &str) -> Option<&FileItem> {
        self.assets
            .iter()
            .chain(self.styles.iter())
            .find(|item| item.path == path)
    }

    /// Every file reachable through this template with overrides applied:
    /// one entry per relative path, base files first, shadowed base files
    /// replaced in place by the override.
    pub fn resolved_files(&self) -> Vec<&FileItem> {
        let mut files: Vec<&FileItem> = match &self.base {
            Some(base) => base.resolved_files(),
            None => Vec::new(),
        };
        for item in self.assets.iter().chain(self.styles.iter()) {
            match files.iter_mut().find(|existing| existing.path == item.path) {
                Some(slot) => *slot = item,
                None => files.push(item),
            }
        }
        files
    }

    /// Style sheets in cascade order (base styles, then own styles).
    /// Materialised once per template instance.
    pub fn stylesheets(&self) -> &[Stylesheet] {
        self.stylesheets.get_or_init(|| {
            let own: HashSet<&str> = self.styles.iter().map(|s| s.path.as_str()).collect();
            let mut sheets: Vec<Stylesheet> = self
                .base
                .as_ref()
                .map(|base| {
                    base.stylesheets()
                        .iter()
                        .filter(|sheet| !own.contains(sheet.path.as_str()))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            sheets.extend(self.styles.iter().map(|item| Stylesheet {
                path: item.path.clone(),
                css: String::from_utf8_lossy(&item.content).into_owned(),
            }));
            sheets
        })
    }

    /// Style sheets with their `url(...)` references inlined as `data:` URIs.
    /// `fetcher` must resolve against this template. Fonts and images are
    /// fetched on the first call only; every later conversion with the same
    /// template instance reuses the result.
    pub async fn inlined_stylesheets(&self, fetcher: &dyn UrlFetcher) -> &[Stylesheet] {
        self.inlined
            .get_or_init(|| async {
                let sheets = join_all(self.stylesheets().iter().map(|sheet| async move {
                    Stylesheet {
                        path: sheet.path.clone(),
                        css: inline_css(&sheet.css, Some(&sheet.path), fetcher, None).await,
                    }
                }))
                .await;
                debug!(template = self.name().unwrap_or("<request>"), sheets = sheets.len(), "Materialised style sheets");
                sheets
            })
            .await
    }
}

fn dedupe(template: Option<&str>, items: Vec<FileItem>) -> Vec<FileItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(item.path.clone());
            if !fresh {
                warn!(template = template.unwrap_or("<request>"), path = %item.path, "Duplicate file path ignored");
            }
            fresh
        })
        .collect()
}

/// Reduces an asset reference to the relative-path form used as lookup key:
/// strips a `file://` scheme, leading `./` and `/`, and backslashes.
pub fn normalize_asset_path(reference: &str) -> String {
    let mut path = reference.trim().replace('\\', "/");
    if let Some(rest) = path.strip_prefix("file://") {
        path = rest.to_string();
    }
    let mut rest = path.as_str();
    loop {
        if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
        } else {
            break;
        }
    }
    rest.to_string()
}
