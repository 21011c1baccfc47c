//! View-tree scan and the template path cache.
//!
//! Templates follow the naming convention
//! `<root>/<controller>/<action>.<format>.<engine-ext>`, layouts live under
//! `<root>/layout/<name>.<format>.<engine-ext>`. The scan indexes every file
//! whose basename has exactly two dot-separated suffix components (format +
//! engine extension); anything else is not a template candidate.
//!
//! The cache is an atomically swapped snapshot: request-path lookups load
//! the current snapshot lock-free, while a reload builds a fresh map and
//! swaps it in synchronously, so no stale path is served once `reload`
//! returns.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A cache miss, carrying the glob patterns that were attempted so NotFound
/// diagnostics can show exactly what was looked for.
#[derive(Debug, Clone)]
pub struct TemplateMiss {
    pub globs: Vec<String>,
}

impl TemplateMiss {
    fn new(glob: String) -> Self {
        TemplateMiss { globs: vec![glob] }
    }
}

impl std::fmt::Display for TemplateMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no template matched at {}", self.globs.join(" or "))
    }
}

/// Maps `{controller, action-or-layout, format}` to a concrete template
/// file through a refreshable exact-match cache.
pub struct TemplateResolver {
    root: PathBuf,
    cache: ArcSwap<HashMap<String, PathBuf>>,
}

impl TemplateResolver {
    /// A resolver with an empty cache. Call [`TemplateResolver::reload`]
    /// before serving, or use [`TemplateResolver::build`].
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        TemplateResolver {
            root: root.into(),
            cache: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Build a resolver and run the initial scan.
    pub fn build(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let resolver = Self::new(root);
        resolver.reload()?;
        Ok(resolver)
    }

    /// The view root this resolver scans.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of cached template paths.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.cache.load().len()
    }

    /// Rescan the view tree and swap in a fresh cache.
    ///
    /// The rebuild is synchronous: once this returns, every lookup sees the
    /// new snapshot. Returns the number of indexed templates.
    pub fn reload(&self) -> anyhow::Result<usize> {
        let mut fresh: HashMap<String, PathBuf> = HashMap::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!(root = %self.root.display(), error = %err, "skipping unreadable view entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            // name.format.ext or nothing
            if name.split('.').count() != 3 {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = rel.with_extension("").to_string_lossy().replace('\\', "/");
            if key.is_empty() {
                continue;
            }
            debug!(key = %key, path = %entry.path().display(), "indexed template");
            fresh.insert(key, entry.path().to_path_buf());
        }
        let count = fresh.len();
        self.cache.store(Arc::new(fresh));
        info!(root = %self.root.display(), templates = count, "template path cache rebuilt");
        Ok(count)
    }

    /// Pure cache lookup for a logical path such as `widgets/index` or
    /// `layout/application`. No filesystem I/O happens here.
    pub fn resolve(&self, logical: &str, format: &str) -> Result<PathBuf, TemplateMiss> {
        let key = format!("{logical}.{format}");
        match self.cache.load().get(&key) {
            Some(path) => Ok(path.clone()),
            None => Err(TemplateMiss::new(format!(
                "{}/{key}.*",
                self.root.display()
            ))),
        }
    }

    /// Resolve an action template for a controller.
    pub fn resolve_action(
        &self,
        controller: &str,
        action: &str,
        format: &str,
    ) -> Result<PathBuf, TemplateMiss> {
        self.resolve(&format!("{controller}/{action}"), format)
    }

    /// Resolve an explicitly named template path such as `shared/message`.
    pub fn resolve_template(&self, template: &str, format: &str) -> Result<PathBuf, TemplateMiss> {
        self.resolve(template, format)
    }

    /// Resolve a layout.
    ///
    /// Precedence, first cache hit wins:
    /// 1. a layout named after the controller's own path segment;
    /// 2. the explicitly requested layout name;
    /// 3. the default `application` layout.
    pub fn resolve_layout(
        &self,
        controller: &str,
        requested: Option<&str>,
        default_layout: &str,
        format: &str,
    ) -> Result<PathBuf, TemplateMiss> {
        let mut globs = Vec::new();
        let mut candidates: Vec<&str> = vec![controller];
        if let Some(name) = requested {
            candidates.push(name);
        }
        candidates.push(default_layout);
        for name in candidates {
            match self.resolve(&format!("layout/{name}"), format) {
                Ok(path) => return Ok(path),
                Err(miss) => globs.extend(miss.globs),
            }
        }
        Err(TemplateMiss { globs })
    }

    /// Resolve a partial. `name` may carry a path (`shared/row`), otherwise
    /// the controller's own view directory is searched; the file itself is
    /// underscore-prefixed (`_row.<format>.<ext>`).
    pub fn resolve_partial(
        &self,
        controller: &str,
        name: &str,
        format: &str,
    ) -> Result<PathBuf, TemplateMiss> {
        let logical = match name.rsplit_once('/') {
            Some((dir, base)) => format!("{dir}/_{base}"),
            None => format!("{controller}/_{name}"),
        };
        self.resolve(&logical, format)
    }
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResolver")
            .field("root", &self.root)
            .field("entries", &self.entry_count())
            .finish()
    }
}
