//! The template engine boundary.
//!
//! Engines are black boxes to the dispatch core: they take a file or an
//! inline source plus a serialized view context, and give back rendered
//! content. The core orchestrates *which* engine runs against *which* file;
//! it never interprets template syntax itself. Engines are registered by
//! file extension, mirroring the `<action>.<format>.<extension>` naming
//! convention.

use dashmap::DashMap;
use minijinja::Environment;
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;

/// Where the template source comes from.
#[derive(Debug, Clone, Copy)]
pub enum TemplateSource<'a> {
    /// A file resolved through the template path cache.
    File(&'a Path),
    /// Inline source text (`render inline:`).
    Text(&'a str),
}

/// One render invocation: the source plus the serialized view context.
#[derive(Debug, Clone, Copy)]
pub struct TemplateInput<'a> {
    pub source: TemplateSource<'a>,
    pub context: &'a Value,
}

/// A pluggable template engine.
pub trait TemplateEngine: Send + Sync {
    /// Render the input into final content.
    fn transform(&self, input: TemplateInput<'_>) -> anyhow::Result<String>;

    /// Engines producing self-contained output (raw passthrough, markup
    /// builders) opt out of layout wrapping.
    fn exempt_from_layout(&self) -> bool {
        false
    }
}

/// MiniJinja-backed engine with a compiled-template cache.
///
/// Compiled templates are cached per absolute path and invalidated by a
/// length + mtime fingerprint, so a view reload picks up edited sources.
/// The environment mutates under a mutex; renders happen under the same
/// lock since the engine is shared across worker threads.
pub struct MiniJinjaEngine {
    env: Mutex<Environment<'static>>,
    fingerprints: DashMap<String, (u64, SystemTime)>,
}

impl MiniJinjaEngine {
    #[must_use]
    pub fn new() -> Self {
        MiniJinjaEngine {
            env: Mutex::new(Environment::new()),
            fingerprints: DashMap::new(),
        }
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn transform(&self, input: TemplateInput<'_>) -> anyhow::Result<String> {
        let mut env = self
            .env
            .lock()
            .map_err(|_| anyhow::anyhow!("template engine lock poisoned"))?;
        match input.source {
            TemplateSource::File(path) => {
                let name = path.to_string_lossy().to_string();
                let meta = std::fs::metadata(path)?;
                let fingerprint = (
                    meta.len(),
                    meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                );
                let stale = self
                    .fingerprints
                    .get(&name)
                    .map(|cached| *cached != fingerprint)
                    .unwrap_or(true);
                if stale {
                    let source = std::fs::read_to_string(path)?;
                    env.add_template_owned(name.clone(), source)?;
                    self.fingerprints.insert(name.clone(), fingerprint);
                }
                Ok(env.get_template(&name)?.render(input.context)?)
            }
            TemplateSource::Text(text) => Ok(env.render_str(text, input.context)?),
        }
    }
}

/// Verbatim passthrough engine. The "template" is its own output, so it is
/// exempt from layout wrapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawEngine;

impl TemplateEngine for RawEngine {
    fn transform(&self, input: TemplateInput<'_>) -> anyhow::Result<String> {
        match input.source {
            TemplateSource::File(path) => Ok(std::fs::read_to_string(path)?),
            TemplateSource::Text(text) => Ok(text.to_string()),
        }
    }

    fn exempt_from_layout(&self) -> bool {
        true
    }
}

/// Engines registered by file extension.
pub struct EngineRegistry {
    by_extension: std::collections::HashMap<String, std::sync::Arc<dyn TemplateEngine>>,
}

impl EngineRegistry {
    #[must_use]
    pub fn empty() -> Self {
        EngineRegistry {
            by_extension: std::collections::HashMap::new(),
        }
    }

    /// The default registry: MiniJinja under `j2`/`jinja`, the raw engine
    /// under `raw`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(&["j2", "jinja"], std::sync::Arc::new(MiniJinjaEngine::new()));
        registry.register(&["raw"], std::sync::Arc::new(RawEngine));
        registry
    }

    /// Register an engine under the given extensions, replacing existing
    /// bindings.
    pub fn register(&mut self, extensions: &[&str], engine: std::sync::Arc<dyn TemplateEngine>) {
        for ext in extensions {
            self.by_extension
                .insert((*ext).to_string(), std::sync::Arc::clone(&engine));
        }
    }

    /// Look up the engine for a template file by its extension.
    #[must_use]
    pub fn engine_for(&self, path: &Path) -> Option<&std::sync::Arc<dyn TemplateEngine>> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.by_extension.get(ext))
    }

    /// Look up an engine by bare extension (inline rendering).
    #[must_use]
    pub fn engine_for_extension(&self, ext: &str) -> Option<&std::sync::Arc<dyn TemplateEngine>> {
        self.by_extension.get(ext)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut exts: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        exts.sort_unstable();
        f.debug_struct("EngineRegistry").field("extensions", &exts).finish()
    }
}
