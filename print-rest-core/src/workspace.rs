//! # workspace: on-disk staging for the headless engine
//!
//! The headless engine resolves relative references through the file
//! system, so templated HTML is written into a directory next to every file
//! of the resolved template. Two kinds of directory exist:
//!
//! - a scratch directory per conversion, removed when the [`StagedDocument`]
//!   is dropped, on every exit path;
//! - a shared `template_<name>` directory, used when the request adds no
//!   files of its own on top of a registry template. It is published once
//!   (populated in a temporary directory, then renamed into place) and
//!   reused by later requests; only the per-request HTML file is removed.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::PrintError;
use crate::template::{FileItem, Template};

pub const SHARED_PREFIX: &str = "template_";
const SCRATCH_PREFIX: &str = "print_";

#[derive(Debug)]
enum Workspace {
    Scratch(Option<TempDir>),
    Shared(PathBuf),
}

/// An HTML file staged with its assets. Cleans up on drop.
#[derive(Debug)]
pub struct StagedDocument {
    workspace: Workspace,
    html_file: PathBuf,
}

impl StagedDocument {
    pub fn html_file(&self) -> &Path {
        &self.html_file
    }

    pub fn directory(&self) -> &Path {
        match &self.workspace {
            Workspace::Scratch(Some(dir)) => dir.path(),
            Workspace::Scratch(None) => Path::new(""),
            Workspace::Shared(path) => path,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.workspace, Workspace::Shared(_))
    }
}

impl Drop for StagedDocument {
    fn drop(&mut self) {
        match &mut self.workspace {
            Workspace::Scratch(dir) => {
                if let Some(dir) = dir.take() {
                    let path = dir.path().to_path_buf();
                    match dir.close() {
                        Ok(()) => debug!(dir = %path.display(), "Removed workspace"),
                        Err(err) => warn!(dir = %path.display(), error = %err, "Failed to remove workspace"),
                    }
                }
            }
            Workspace::Shared(_) => match fs::remove_file(&self.html_file) {
                Ok(()) => debug!(file = %self.html_file.display(), "Removed staged HTML"),
                Err(err) => warn!(file = %self.html_file.display(), error = %err, "Failed to remove staged HTML"),
            },
        }
    }
}

/// Writes `html` and the template's files under `root`. Returns `None` when
/// the template has nothing to stage, in which case the HTML can be handed
/// to the engine directly. `reuse_shared` enables the shared directory for
/// requests that add nothing to a registry template.
pub fn stage(
    root: &Path,
    template: &Template,
    html: &str,
    reuse_shared: bool,
) -> Result<Option<StagedDocument>, PrintError> {
    if template.is_empty() {
        return Ok(None);
    }
    fs::create_dir_all(root)?;

    let shared_name = match (template.has_own_files(), template.base().and_then(|b| b.name())) {
        (false, Some(name)) if reuse_shared => Some(name),
        _ => None,
    };

    let workspace = match shared_name {
        Some(name) => Workspace::Shared(publish_shared(root, name, template)?),
        None => {
            let dir = tempfile::Builder::new()
                .prefix(SCRATCH_PREFIX)
                .tempdir_in(root)
                .map_err(|e| PrintError::Resource(format!("cannot create workspace in {}: {e}", root.display())))?;
            populate(dir.path(), template)?;
            debug!(dir = %dir.path().display(), "Created scratch workspace");
            Workspace::Scratch(Some(dir))
        }
    };

    let dir = match &workspace {
        Workspace::Scratch(Some(dir)) => dir.path().to_path_buf(),
        Workspace::Scratch(None) => return Err(PrintError::Resource("workspace vanished".into())),
        Workspace::Shared(path) => path.clone(),
    };
    let html_file = dir.join(format!("{}.html", Uuid::new_v4()));
    // The guard exists before the write so a failed write still cleans up.
    let staged = StagedDocument {
        workspace,
        html_file,
    };
    fs::write(&staged.html_file, html)
        .map_err(|e| PrintError::Resource(format!("cannot write {}: {e}", staged.html_file.display())))?;
    Ok(Some(staged))
}

fn publish_shared(root: &Path, name: &str, template: &Template) -> Result<PathBuf, PrintError> {
    let target = root.join(format!("{SHARED_PREFIX}{}", secure_name(name)));
    if target.is_dir() {
        debug!(dir = %target.display(), "Reusing shared template directory");
        return Ok(target);
    }

    let staging = tempfile::Builder::new()
        .prefix(".publish_")
        .tempdir_in(root)
        .map_err(|e| PrintError::Resource(format!("cannot create staging directory: {e}")))?;
    populate(staging.path(), template)?;
    let staging = staging.keep();
    match fs::rename(&staging, &target) {
        Ok(()) => {
            info!(template = name, dir = %target.display(), "Published shared template directory");
        }
        Err(err) => {
            // Lost a race against another request publishing the same template.
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(dir = %staging.display(), error = %cleanup, "Failed to remove staging directory");
            }
            if !target.is_dir() {
                return Err(PrintError::Resource(format!(
                    "cannot publish {}: {err}",
                    target.display()
                )));
            }
            debug!(dir = %target.display(), "Shared template directory published concurrently");
        }
    }
    Ok(target)
}

/// Writes every resolved file of the template, overrides already applied.
fn populate(dir: &Path, template: &Template) -> Result<(), PrintError> {
    let files: Vec<&FileItem> = template.resolved_files();
    for item in &files {
        let Some(relative) = safe_relative(&item.path) else {
            warn!(path = %item.path, "Skipping asset with unsafe path");
            continue;
        };
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &item.content)?;
    }
    debug!(dir = %dir.display(), files = files.len(), "Populated workspace");
    Ok(())
}

fn safe_relative(path: &str) -> Option<PathBuf> {
    let candidate = Path::new(path);
    let safe = !path.is_empty() && candidate.components().all(|c| matches!(c, Component::Normal(_)));
    safe.then(|| candidate.to_path_buf())
}

/// Reduces a template name to characters safe in a directory name.
pub fn secure_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}
