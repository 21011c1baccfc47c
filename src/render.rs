//! The render surface.
//!
//! `render` is where the pieces meet: content negotiation picks the format,
//! the resolver maps `{controller, action, format}` to a file, the engine
//! registry picks the engine by extension, and the result is wrapped in a
//! layout unless the engine or the options opt out. Everything here runs on
//! the request-scoped [`Controller`] instance.

use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::controller::Controller;
use crate::errors::DispatchError;
use crate::response::Body;
use crate::templates::{TemplateInput, TemplateSource};

/// Extension used for `inline:` rendering when none is given.
const DEFAULT_INLINE_EXTENSION: &str = "j2";

/// Name under which rendered content is exposed to the wrapping layout.
pub const LAYOUT_CONTENT_KEY: &str = "layout";

/// Which layout wraps the rendered content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LayoutChoice {
    /// Controller-named layout, then the configured default.
    #[default]
    Default,
    /// An explicitly requested layout name.
    Named(String),
    /// No layout at all.
    None,
}

/// Options recognized by [`Controller::render`].
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Render another action's template instead of the current one.
    pub action: Option<String>,
    /// Render an explicit template path such as `shared/message`.
    pub template: Option<String>,
    /// Layout selection.
    pub layout: LayoutChoice,
    /// Format override, skipping the negotiated format for template lookup.
    pub format: Option<String>,
    /// Render nothing, with this status.
    pub nothing: Option<u16>,
    /// Render inline source text instead of a file.
    pub inline: Option<String>,
    /// Engine extension for inline rendering.
    pub inline_engine: Option<String>,
    /// Rebuild the view context instead of reusing the per-request cache.
    pub clean_context: bool,
}

impl RenderOptions {
    /// Render the named action's template.
    #[must_use]
    pub fn action(name: &str) -> Self {
        RenderOptions {
            action: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Render an explicit template path.
    #[must_use]
    pub fn template(path: &str) -> Self {
        RenderOptions {
            template: Some(path.to_string()),
            ..Default::default()
        }
    }

    /// Render nothing with the given status.
    #[must_use]
    pub fn nothing(status: u16) -> Self {
        RenderOptions {
            nothing: Some(status),
            ..Default::default()
        }
    }

    /// Render inline template text.
    #[must_use]
    pub fn inline(text: &str) -> Self {
        RenderOptions {
            inline: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_layout(mut self, name: &str) -> Self {
        self.layout = LayoutChoice::Named(name.to_string());
        self
    }

    #[must_use]
    pub fn without_layout(mut self) -> Self {
        self.layout = LayoutChoice::None;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    #[must_use]
    pub fn clean_context(mut self) -> Self {
        self.clean_context = true;
        self
    }

    fn requested_layout(&self) -> Option<&str> {
        match &self.layout {
            LayoutChoice::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl Controller {
    /// Render the current action's template with the default options.
    pub fn render_default(&mut self) -> anyhow::Result<Body> {
        self.render(RenderOptions::default())
    }

    /// Universal render method.
    ///
    /// Triggers content negotiation (freezing the provided formats), looks
    /// the template up in the path cache, runs it through the engine
    /// registered for its extension and wraps the result in a layout unless
    /// the engine is exempt, the options say `None`, or the format is `js`.
    pub fn render(&mut self, opts: RenderOptions) -> anyhow::Result<Body> {
        if let Some(status) = opts.nothing {
            return Ok(self.render_nothing(status));
        }

        let negotiated = self.content_type()?;
        let format = opts.format.clone().unwrap_or(negotiated.clone());
        if format != negotiated {
            self.apply_format_headers(&format);
        }
        let env = Arc::clone(&self.env);

        if let Some(text) = opts.inline.clone() {
            let ext = opts.inline_engine.as_deref().unwrap_or(DEFAULT_INLINE_EXTENSION);
            let engine = env.engines.engine_for_extension(ext).ok_or_else(|| {
                DispatchError::NotFound(format!(
                    "no template engine registered for extension `{ext}`"
                ))
            })?;
            let ctx = self.view_context(opts.clean_context, None);
            let content = engine.transform(TemplateInput {
                source: TemplateSource::Text(&text),
                context: &ctx,
            })?;
            return self.finish_content(content, engine.exempt_from_layout(), &opts, &format);
        }

        let resolved = if let Some(template) = &opts.template {
            env.resolver.resolve_template(template, &format)
        } else {
            let action = opts
                .action
                .clone()
                .unwrap_or_else(|| self.action().to_string());
            env.resolver
                .resolve_action(self.spec().name(), &action, &format)
        };
        let path = resolved.map_err(|miss| DispatchError::NotFound(miss.to_string()))?;

        let engine = env.engines.engine_for(&path).ok_or_else(|| {
            DispatchError::InternalServerError(format!(
                "no template engine registered for `{}`",
                path.display()
            ))
        })?;
        let ctx = self.view_context(opts.clean_context, None);
        let content = engine.transform(TemplateInput {
            source: TemplateSource::File(&path),
            context: &ctx,
        })?;
        self.finish_content(content, engine.exempt_from_layout(), &opts, &format)
    }

    /// Render an object: a matching template wins, otherwise the format's
    /// registered transform serializes the object directly (so `xml`/`json`
    /// endpoints work without a template).
    pub fn render_object<T: serde::Serialize>(
        &mut self,
        obj: &T,
        opts: RenderOptions,
    ) -> anyhow::Result<Body> {
        let negotiated = self.content_type()?;
        let format = opts.format.clone().unwrap_or(negotiated);
        let env = Arc::clone(&self.env);

        let action = opts
            .action
            .clone()
            .unwrap_or_else(|| self.action().to_string());
        let template_exists = match &opts.template {
            Some(template) => env.resolver.resolve_template(template, &format).is_ok(),
            None => env
                .resolver
                .resolve_action(self.spec().name(), &action, &format)
                .is_ok(),
        };
        if template_exists {
            return self.render(opts);
        }

        if let Some(media_type) = env.media.get(&format) {
            if let Some(transform) = media_type.transform {
                self.apply_format_headers(&format);
                let args = self
                    .provided_formats()
                    .arguments_for(&format)
                    .cloned()
                    .or_else(|| media_type.transform_defaults.clone());
                let value = serde_json::to_value(obj)?;
                return Ok(Body::Literal(transform(&value, args.as_ref())?));
            }
        }

        // No template and no transform: surface the template miss.
        self.render(opts)
    }

    /// Renders nothing but sets the status. Returns a single space so
    /// clients that insist on a body get one.
    pub fn render_nothing(&mut self, status: u16) -> Body {
        self.set_status(status);
        Body::Literal(" ".to_string())
    }

    /// Render a partial (`_name.<format>.<ext>`). A `/` in the name renders
    /// from another view directory (`shared/row`); otherwise the current
    /// controller's directory is used. Resolution is memoized per request.
    pub fn partial(&mut self, name: &str) -> anyhow::Result<String> {
        self.partial_with_locals(name, &Map::new())
    }

    /// Render a partial once per collection element, exposing each element
    /// under `as_name` (default: the partial's base name) plus a `count`
    /// local, and concatenate the results.
    pub fn partial_collection(
        &mut self,
        name: &str,
        collection: &[Value],
        as_name: Option<&str>,
    ) -> anyhow::Result<String> {
        let local_name = as_name
            .map(str::to_string)
            .unwrap_or_else(|| name.rsplit('/').next().unwrap_or(name).to_string());
        let mut buffer = String::new();
        for (count, object) in collection.iter().enumerate() {
            let mut locals = Map::new();
            locals.insert(local_name.clone(), object.clone());
            locals.insert("count".to_string(), json!(count));
            buffer.push_str(&self.partial_with_locals(name, &locals)?);
        }
        Ok(buffer)
    }

    fn partial_with_locals(&mut self, name: &str, locals: &Map<String, Value>) -> anyhow::Result<String> {
        let format = self.content_type()?;
        let env = Arc::clone(&self.env);
        let cache_key = format!("{name}.{format}");
        let path = match self.partial_cache.get(&cache_key) {
            Some(path) => path.clone(),
            None => {
                let path = env
                    .resolver
                    .resolve_partial(self.spec().name(), name, &format)
                    .map_err(|miss| DispatchError::NotFound(miss.to_string()))?;
                self.partial_cache.insert(cache_key, path.clone());
                path
            }
        };
        let engine = env.engines.engine_for(&path).ok_or_else(|| {
            DispatchError::InternalServerError(format!(
                "no template engine registered for `{}`",
                path.display()
            ))
        })?;
        // Partials always get a fresh context so locals do not leak between
        // sibling renders.
        let ctx = self.view_context(true, Some(locals));
        Ok(engine.transform(TemplateInput {
            source: TemplateSource::File(&path),
            context: &ctx,
        })?)
    }

    /// Content captured for another template, typically the layout reading
    /// the action template's output.
    #[must_use]
    pub fn catch_content(&self, name: &str) -> &str {
        self.thrown_content
            .get(name)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Capture content for another template to read via
    /// [`Controller::catch_content`] or the view context's `content` map.
    pub fn throw_content(&mut self, name: &str, content: impl Into<String>) {
        self.thrown_content.insert(name.to_string(), content.into());
        self.view_context_cache = None;
    }

    fn finish_content(
        &mut self,
        content: String,
        engine_exempt: bool,
        opts: &RenderOptions,
        format: &str,
    ) -> anyhow::Result<Body> {
        if engine_exempt || opts.layout == LayoutChoice::None || format == "js" {
            return Ok(Body::Literal(content));
        }
        let wrapped = self.wrap_layout(content, opts.requested_layout(), format)?;
        Ok(Body::Literal(wrapped))
    }

    fn wrap_layout(
        &mut self,
        content: String,
        requested: Option<&str>,
        format: &str,
    ) -> anyhow::Result<String> {
        let env = Arc::clone(&self.env);
        let layout_path = env
            .resolver
            .resolve_layout(
                self.spec().name(),
                requested,
                &env.default_layout,
                format,
            )
            .map_err(|miss| DispatchError::NotFound(miss.to_string()))?;
        let engine = env.engines.engine_for(&layout_path).ok_or_else(|| {
            DispatchError::InternalServerError(format!(
                "no template engine registered for `{}`",
                layout_path.display()
            ))
        })?;
        self.throw_content(LAYOUT_CONTENT_KEY, content);
        let ctx = self.view_context(false, None);
        Ok(engine.transform(TemplateInput {
            source: TemplateSource::File(&layout_path),
            context: &ctx,
        })?)
    }

    /// The serialized view context handed to template engines: the assigns
    /// at the top level plus `params`, `content`, `request` and (inside
    /// error actions) `exception` objects.
    pub(crate) fn view_context(
        &mut self,
        clean: bool,
        locals: Option<&Map<String, Value>>,
    ) -> Value {
        if clean || self.view_context_cache.is_none() {
            let mut map = self.assigns.clone();
            map.insert("params".to_string(), self.request().params_snapshot());
            map.insert("content".to_string(), json!(self.thrown_content));
            map.insert(
                "request".to_string(),
                json!({
                    "method": self.request().method.as_str(),
                    "path": self.request().path,
                }),
            );
            if let Some(envelope) = self.exception() {
                map.insert(
                    "exception".to_string(),
                    json!({
                        "name": envelope.action_name(),
                        "status": envelope.status,
                        "detail": envelope.detail,
                    }),
                );
            }
            self.view_context_cache = Some(Value::Object(map));
        }
        let mut ctx = self
            .view_context_cache
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));
        if let Some(locals) = locals {
            if let Value::Object(obj) = &mut ctx {
                for (key, value) in locals {
                    obj.insert(key.clone(), value.clone());
                }
            }
        }
        ctx
    }
}
