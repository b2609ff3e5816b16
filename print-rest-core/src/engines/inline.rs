//! Reference inlining for the layout engine.
//!
//! Every `src="..."`, `<link href="...">` and CSS `url(...)` reference is
//! resolved through a [`UrlFetcher`] and replaced by a `data:` URI, so the
//! engine never touches the network or the file system itself. Blocked or
//! unavailable references become empty.

use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use reqwest::Url;
use tracing::debug;

use crate::fetch::{FetchOutcome, FetchedResource, UrlFetcher};

lazy_static! {
    static ref SRC_RE: Regex = Regex::new(r#"(?i)\b(src)\s*=\s*(["'])([^"']*)["']"#).expect("static pattern");
    static ref LINK_RE: Regex = Regex::new(r"(?is)<link\b[^>]*>").expect("static pattern");
    static ref HREF_RE: Regex = Regex::new(r#"(?i)\b(href)\s*=\s*(["'])([^"']*)["']"#).expect("static pattern");
    static ref CSS_URL_RE: Regex = Regex::new(r#"(?i)url\(\s*(["']?)([^"')]*)["']?\s*\)"#).expect("static pattern");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rewrite {
    Replace(String),
    Drop,
}

/// Inlines the references of an HTML document. `base` is the document's
/// own URL when it was fetched remotely; relative references that are not
/// template files are resolved against it.
pub async fn inline_html(html: &str, fetcher: &dyn UrlFetcher, base: Option<&Url>) -> String {
    let mut references: Vec<String> = Vec::new();
    let mut stylesheet_links: HashSet<String> = HashSet::new();
    for caps in SRC_RE.captures_iter(html) {
        references.push(caps[3].trim().to_string());
    }
    for tag in LINK_RE.find_iter(html) {
        for caps in HREF_RE.captures_iter(tag.as_str()) {
            let reference = caps[3].trim().to_string();
            stylesheet_links.insert(reference.clone());
            references.push(reference);
        }
    }
    for caps in CSS_URL_RE.captures_iter(html) {
        references.push(caps[2].trim().to_string());
    }

    let resolved = resolve_all(references, fetcher, base).await;
    let mut rewrites: HashMap<String, Rewrite> = HashMap::new();
    for (reference, outcome) in resolved {
        let rewrite = match outcome {
            None => continue,
            Some(None) => Rewrite::Drop,
            Some(Some(mut resource)) => {
                if stylesheet_links.contains(&reference) && resource.content_type == "text/css" {
                    let css = String::from_utf8_lossy(&resource.content).into_owned();
                    resource.content = inline_css(&css, Some(reference.as_str()), fetcher, base).await.into_bytes();
                }
                Rewrite::Replace(data_uri(&resource))
            }
        };
        rewrites.insert(reference, rewrite);
    }
    debug!(rewritten = rewrites.len(), "Inlined document references");

    let html = SRC_RE.replace_all(html, |caps: &Captures| rewrite_attr(caps, &rewrites));
    let html = LINK_RE.replace_all(&html, |tag: &Captures| {
        HREF_RE
            .replace_all(&tag[0], |caps: &Captures| rewrite_attr(caps, &rewrites))
            .into_owned()
    });
    CSS_URL_RE
        .replace_all(&html, |caps: &Captures| rewrite_css_url(caps, &rewrites))
        .into_owned()
}

/// Inlines the `url(...)` references of a style sheet. Relative references
/// resolve against `sheet_path`, the sheet's own template path or URL.
pub async fn inline_css(css: &str, sheet_path: Option<&str>, fetcher: &dyn UrlFetcher, base: Option<&Url>) -> String {
    let lookups: HashMap<String, String> = CSS_URL_RE
        .captures_iter(css)
        .map(|caps| {
            let reference = caps[2].trim().to_string();
            let lookup = match sheet_path {
                Some(sheet) => relative_to(sheet, &reference),
                None => reference.clone(),
            };
            (reference, lookup)
        })
        .collect();
    let resolved: HashMap<String, Option<Option<FetchedResource>>> =
        resolve_all(lookups.values().cloned().collect(), fetcher, base)
            .await
            .into_iter()
            .collect();
    let rewrites: HashMap<String, Rewrite> = lookups
        .into_iter()
        .filter_map(|(reference, lookup)| match resolved.get(&lookup)? {
            None => None,
            Some(None) => Some((reference, Rewrite::Drop)),
            Some(Some(resource)) => Some((reference, Rewrite::Replace(data_uri(resource)))),
        })
        .collect();
    CSS_URL_RE
        .replace_all(css, |caps: &Captures| rewrite_css_url(caps, &rewrites))
        .into_owned()
}

/// `None` keeps the reference, `Some(None)` drops it.
async fn resolve_all(
    references: Vec<String>,
    fetcher: &dyn UrlFetcher,
    base: Option<&Url>,
) -> Vec<(String, Option<Option<FetchedResource>>)> {
    let unique: Vec<String> = references
        .into_iter()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    join_all(unique.into_iter().map(|reference| async move {
        let outcome = resolve_one(&reference, fetcher, base).await;
        (reference, outcome)
    }))
    .await
}

async fn resolve_one(reference: &str, fetcher: &dyn UrlFetcher, base: Option<&Url>) -> Option<Option<FetchedResource>> {
    let outcome = match fetcher.fetch(reference).await {
        FetchOutcome::Resolved(resource) => FetchOutcome::Resolved(resource),
        FetchOutcome::Keep => FetchOutcome::Keep,
        other => match base.filter(|_| is_relative(reference)).map(|b| b.join(reference)) {
            Some(Ok(absolute)) => fetcher.fetch(absolute.as_str()).await,
            _ => other,
        },
    };
    match outcome {
        FetchOutcome::Resolved(resource) => Some(Some(resource)),
        FetchOutcome::Keep => None,
        FetchOutcome::Blocked | FetchOutcome::Unavailable => Some(None),
    }
}

/// Joins `reference` onto the directory of `sheet`. Absolute, rooted and
/// `data:` references are returned unchanged.
fn relative_to(sheet: &str, reference: &str) -> String {
    if reference.is_empty() || reference.starts_with('/') || reference.starts_with('#') || !is_relative(reference) {
        return reference.to_string();
    }
    if let Ok(url) = Url::parse(sheet) {
        return url
            .join(reference)
            .map(String::from)
            .unwrap_or_else(|_| reference.to_string());
    }
    let mut segments: Vec<&str> = sheet.split('/').collect();
    segments.pop();
    for part in reference.split('/') {
        match part {
            "" | "." => {}
            ".." if segments.last().is_some_and(|last| *last != "..") => {
                segments.pop();
            }
            part => segments.push(part),
        }
    }
    segments.join("/")
}

fn is_relative(reference: &str) -> bool {
    !reference.contains("://") && !reference.starts_with("data:") && !reference.starts_with("//")
}

fn data_uri(resource: &FetchedResource) -> String {
    format!("data:{};base64,{}", resource.content_type, STANDARD.encode(&resource.content))
}

fn rewrite_attr(caps: &Captures, rewrites: &HashMap<String, Rewrite>) -> String {
    let (attr, quote) = (&caps[1], &caps[2]);
    match rewrites.get(caps[3].trim()) {
        Some(Rewrite::Replace(uri)) => format!("{attr}={quote}{uri}{quote}"),
        Some(Rewrite::Drop) => format!("{attr}={quote}{quote}"),
        None => caps[0].to_string(),
    }
}

fn rewrite_css_url(caps: &Captures, rewrites: &HashMap<String, Rewrite>) -> String {
    match rewrites.get(caps[2].trim()) {
        Some(Rewrite::Replace(uri)) => format!("url(\"{uri}\")"),
        Some(Rewrite::Drop) => "url(\"\")".to_string(),
        None => caps[0].to_string(),
    }
}
