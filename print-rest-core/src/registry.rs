//! # registry: named templates discovered on disk
//!
//! Every immediate subdirectory of a template root is one template. An
//! optional `template.json` inside it may set `name`, `styles` and `assets`
//! (glob patterns relative to the directory). Without it the directory name
//! is the template name, every `.css` file is a style and every other file
//! is an asset.
//!
//! Resolution is lazy and cached per definition behind a per-definition
//! mutex. With hot reload enabled the cache is bypassed and every `get`
//! re-reads the directory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::PrintError;
use crate::template::{FileItem, Template};

pub const METADATA_FILE: &str = "template.json";

const DEFAULT_STYLES: &str = "**/*.css";
const DEFAULT_ASSETS: &str = "**/*";

/// Contents of a template's `template.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TemplateMetadata {
    pub name: Option<String>,
    pub styles: Option<Vec<String>>,
    pub assets: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid glob pattern '{pattern}' in {path}: {source}")]
    Pattern {
        path: PathBuf,
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

impl TemplateMetadata {
    /// Reads the metadata file of `dir`. A missing file yields defaults.
    pub fn read(dir: &Path) -> Result<Self, MetadataError> {
        let path = dir.join(METADATA_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read(&path).map_err(|source| MetadataError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| MetadataError::Parse { path, source })
    }
}

#[derive(Debug, Default)]
struct DefinitionState {
    prepared: Option<PreparedFiles>,
    template: Option<Arc<Template>>,
}

#[derive(Debug, Clone)]
struct PreparedFiles {
    styles: Vec<String>,
    assets: Vec<String>,
}

/// One registered template directory and its cached resolution.
#[derive(Debug)]
pub struct TemplateDefinition {
    name: String,
    base_dir: PathBuf,
    metadata: TemplateMetadata,
    state: Mutex<DefinitionState>,
}

impl TemplateDefinition {
    pub fn new(base_dir: &Path, metadata: TemplateMetadata) -> Self {
        let name = metadata.name.clone().unwrap_or_else(|| dir_name(base_dir));
        Self {
            name,
            base_dir: base_dir.to_path_buf(),
            metadata,
            state: Mutex::new(DefinitionState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the template, resolving it on first use. `refresh` discards
    /// any cached state first.
    pub fn resolve(&self, refresh: bool) -> Result<Arc<Template>, PrintError> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if refresh {
            *state = DefinitionState::default();
        }
        if let Some(template) = &state.template {
            return Ok(template.clone());
        }

        let prepared = match &state.prepared {
            Some(prepared) => prepared.clone(),
            None => {
                let prepared = self.prepare()?;
                state.prepared = Some(prepared.clone());
                prepared
            }
        };

        let styles = self.read_files(&prepared.styles)?;
        let assets = self.read_files(&prepared.assets)?;
        info!(
            template = %self.name,
            styles = styles.len(),
            assets = assets.len(),
            "Resolved template"
        );
        let template = Arc::new(Template::new(Some(self.name.clone()), styles, assets, None));
        state.template = Some(template.clone());
        Ok(template)
    }

    fn prepare(&self) -> Result<PreparedFiles, PrintError> {
        let style_set = self.glob_set(self.metadata.styles.as_deref(), DEFAULT_STYLES)?;
        let asset_set = self.glob_set(self.metadata.assets.as_deref(), DEFAULT_ASSETS)?;

        let mut files = Vec::new();
        walk_files(&self.base_dir, &self.base_dir, &mut files)?;

        let mut styles = Vec::new();
        let mut assets = Vec::new();
        for rel in files {
            if rel == METADATA_FILE {
                continue;
            }
            let is_style = style_set.is_match(&rel);
            if is_style {
                styles.push(rel.clone());
            }
            // Auto-discovered assets leave styles out.
            let auto_assets = self.metadata.assets.is_none();
            if asset_set.is_match(&rel) && !(is_style && auto_assets) {
                assets.push(rel);
            }
        }
        debug!(template = %self.name, ?styles, ?assets, "Prepared template file lists");
        Ok(PreparedFiles { styles, assets })
    }

    fn glob_set(&self, patterns: Option<&[String]>, default: &str) -> Result<GlobSet, MetadataError> {
        let mut builder = GlobSetBuilder::new();
        let defaults = [default.to_string()];
        for pattern in patterns.unwrap_or(&defaults) {
            let glob = Glob::new(pattern.trim_start_matches("./")).map_err(|source| MetadataError::Pattern {
                path: self.base_dir.join(METADATA_FILE),
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| MetadataError::Pattern {
            path: self.base_dir.join(METADATA_FILE),
            pattern: patterns.map(|p| p.join(",")).unwrap_or_else(|| default.to_string()),
            source,
        })
    }

    fn read_files(&self, relative: &[String]) -> Result<Vec<FileItem>, PrintError> {
        relative
            .iter()
            .map(|rel| -> Result<FileItem, PrintError> {
                let content = fs::read(self.base_dir.join(rel))?;
                Ok(FileItem::guessed(rel.clone(), content))
            })
            .collect()
    }
}

/// Recursively collects files under `dir` as `/`-separated paths relative to `root`.
fn walk_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), std::io::Error> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            walk_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(rel);
        }
    }
    Ok(())
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string_lossy().into_owned())
}

/// Process-wide template cache. Construct once and share through the
/// application state.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    definitions: RwLock<HashMap<String, Arc<TemplateDefinition>>>,
    roots: RwLock<Vec<PathBuf>>,
    hot_reload: bool,
}

impl TemplateRegistry {
    pub fn new(hot_reload: bool) -> Self {
        Self {
            hot_reload,
            ..Self::default()
        }
    }

    pub fn hot_reload(&self) -> bool {
        self.hot_reload
    }

    /// Scans the immediate subdirectories of `base_dir`. Returns how many
    /// templates were newly registered. Only an unreadable root is an error;
    /// a broken template directory is logged and skipped.
    pub fn load(&self, base_dir: &Path) -> Result<usize, PrintError> {
        {
            let mut roots = self.roots.write().unwrap_or_else(|p| p.into_inner());
            if !roots.iter().any(|r| r == base_dir) {
                roots.push(base_dir.to_path_buf());
            }
        }

        let mut dirs: Vec<PathBuf> = fs::read_dir(base_dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut added = 0;
        for dir in dirs {
            match TemplateMetadata::read(&dir) {
                Ok(metadata) => {
                    if self.add(&dir, metadata) {
                        added += 1;
                    }
                }
                Err(err) => {
                    error!(dir = %dir.display(), error = %err, "Skipping template with unusable metadata");
                }
            }
        }
        info!(base_dir = %base_dir.display(), added, "Loaded template directory");
        Ok(added)
    }

    /// Registers one template directory. The first registration of a name
    /// wins; a later one with a different directory is ignored with a warning.
    pub fn add(&self, base_dir: &Path, metadata: TemplateMetadata) -> bool {
        let definition = TemplateDefinition::new(base_dir, metadata);
        let mut definitions = self.definitions.write().unwrap_or_else(|p| p.into_inner());
        match definitions.get(definition.name()) {
            Some(existing) if existing.base_dir() == base_dir => false,
            Some(existing) => {
                warn!(
                    template = %definition.name(),
                    kept = %existing.base_dir().display(),
                    ignored = %base_dir.display(),
                    "Duplicate template name, keeping the first registration"
                );
                false
            }
            None => {
                debug!(template = %definition.name(), dir = %base_dir.display(), "Registered template");
                definitions.insert(definition.name().to_string(), Arc::new(definition));
                true
            }
        }
    }

    /// Returns the resolved template, or `Ok(None)` for an unknown name.
    pub fn get(&self, name: &str) -> Result<Option<Arc<Template>>, PrintError> {
        let mut definition = self.definition(name);
        if definition.is_none() && self.hot_reload {
            self.rescan();
            definition = self.definition(name);
        }
        match definition {
            Some(definition) => definition.resolve(self.hot_reload).map(Some),
            None => {
                debug!(template = %name, "Template not found");
                Ok(None)
            }
        }
    }

    pub fn names(&self) -> Vec<String> {
        let definitions = self.definitions.read().unwrap_or_else(|p| p.into_inner());
        let mut names: Vec<String> = definitions.keys().cloned().collect();
        names.sort();
        names
    }

    fn definition(&self, name: &str) -> Option<Arc<TemplateDefinition>> {
        let definitions = self.definitions.read().unwrap_or_else(|p| p.into_inner());
        definitions.get(name).cloned()
    }

    fn rescan(&self) {
        let roots = self.roots.read().unwrap_or_else(|p| p.into_inner()).clone();
        for root in roots {
            if let Err(err) = self.load(&root) {
                warn!(root = %root.display(), error = %err, "Template rescan failed");
            }
        }
    }
}
