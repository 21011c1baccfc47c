//! Controller specs, the registration-time builder and the per-request
//! controller instance.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::dispatcher::DispatchEnv;
use crate::errors::{status_code_for_name, ConfigError, DispatchError, ExceptionEnvelope};
use crate::negotiation::{negotiate, ProvidedFormats};
use crate::request::{HeaderVec, Request};
use crate::response::{self, Body, ResponseContext};
use crate::session::Session;

use super::filters::{self, FilterFn, FilterFlow, FilterOptions, FilterSpec};

/// A registered action handler. Receives the request-scoped controller and
/// the positional arguments bound from route/query params.
pub type ActionFn = Arc<dyn Fn(&mut Controller, &[String]) -> anyhow::Result<Body> + Send + Sync>;

/// One declared positional action parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<String>,
}

impl ParamSpec {
    /// A parameter that must be present in the route/query params.
    #[must_use]
    pub fn required(name: &str) -> Self {
        ParamSpec {
            name: name.to_string(),
            default: None,
        }
    }

    /// A parameter with a fallback value.
    #[must_use]
    pub fn optional(name: &str, default: &str) -> Self {
        ParamSpec {
            name: name.to_string(),
            default: Some(default.to_string()),
        }
    }
}

/// A callable action: its name, declared parameters and handler.
#[derive(Clone)]
pub struct ActionSpec {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub(crate) handler: ActionFn,
}

impl std::fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

const DEFAULT_HALTED_BODY: &str = "<html><body><h1>Filter Chain Halted!</h1></body></html>";

/// Immutable controller configuration, built once at registration time and
/// shared across requests. Per-request overrides never mutate this.
pub struct ControllerSpec {
    name: String,
    actions: HashMap<String, ActionSpec>,
    hidden: HashSet<String>,
    filter_fns: HashMap<String, FilterFn>,
    before_filters: Vec<FilterSpec>,
    after_filters: Vec<FilterSpec>,
    provided: ProvidedFormats,
    halted_body: String,
}

impl ControllerSpec {
    /// Start building a controller spec. The name is the controller's view
    /// path segment (`widgets` looks up templates under `views/widgets/`).
    #[must_use]
    pub fn builder(name: &str) -> ControllerBuilder {
        ControllerBuilder::new(name)
    }

    /// A spec with no actions, used as the error-rendering shell when no
    /// error controller is registered.
    #[must_use]
    pub(crate) fn bare(name: &str) -> Arc<Self> {
        Arc::new(ControllerSpec {
            name: name.to_string(),
            actions: HashMap::new(),
            hidden: HashSet::new(),
            filter_fns: HashMap::new(),
            before_filters: Vec::new(),
            after_filters: Vec::new(),
            provided: ProvidedFormats::html_default(),
            halted_body: DEFAULT_HALTED_BODY.to_string(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an action is publicly dispatchable: declared and not hidden.
    #[must_use]
    pub fn callable(&self, action: &str) -> bool {
        self.actions.contains_key(action) && !self.hidden.contains(action)
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.get(name)
    }

    #[must_use]
    pub fn filter_fn(&self, name: &str) -> Option<FilterFn> {
        self.filter_fns.get(name).map(Arc::clone)
    }

    #[must_use]
    pub fn before_filters(&self) -> &[FilterSpec] {
        &self.before_filters
    }

    #[must_use]
    pub fn after_filters(&self) -> &[FilterSpec] {
        &self.after_filters
    }

    #[must_use]
    pub fn provided_formats(&self) -> &ProvidedFormats {
        &self.provided
    }

    #[must_use]
    pub fn halted_body(&self) -> &str {
        &self.halted_body
    }
}

impl std::fmt::Debug for ControllerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut actions: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        actions.sort_unstable();
        f.debug_struct("ControllerSpec")
            .field("name", &self.name)
            .field("actions", &actions)
            .field("before_filters", &self.before_filters)
            .field("after_filters", &self.after_filters)
            .finish()
    }
}

#[derive(Debug, Clone)]
enum FilterOp {
    Add { target: String, options: FilterOptions },
    Skip { target: String },
}

/// Collects controller declarations and validates them into an immutable
/// [`ControllerSpec`]. Validation happens at build time, before any request
/// is dispatched: conflicting filter rules and unknown filter targets are
/// configuration errors.
pub struct ControllerBuilder {
    name: String,
    actions: Vec<ActionSpec>,
    hidden: HashSet<String>,
    filter_fns: HashMap<String, FilterFn>,
    before_ops: Vec<FilterOp>,
    after_ops: Vec<FilterOp>,
    provided: ProvidedFormats,
    halted_body: String,
}

impl ControllerBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        ControllerBuilder {
            name: name.to_string(),
            actions: Vec::new(),
            hidden: HashSet::new(),
            filter_fns: HashMap::new(),
            before_ops: Vec::new(),
            after_ops: Vec::new(),
            provided: ProvidedFormats::html_default(),
            halted_body: DEFAULT_HALTED_BODY.to_string(),
        }
    }

    /// Declare an action with no positional parameters.
    #[must_use]
    pub fn action<F>(self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut Controller, &[String]) -> anyhow::Result<Body> + Send + Sync + 'static,
    {
        self.action_with_params(name, &[], handler)
    }

    /// Declare an action with positional parameters pulled from route/query
    /// params at call time.
    #[must_use]
    pub fn action_with_params<F>(mut self, name: &str, params: &[ParamSpec], handler: F) -> Self
    where
        F: Fn(&mut Controller, &[String]) -> anyhow::Result<Body> + Send + Sync + 'static,
    {
        self.actions.push(ActionSpec {
            name: name.to_string(),
            params: params.to_vec(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Hide an action from dispatch. Hidden actions remain invokable
    /// internally (halt targets, helpers) but dispatching one is
    /// ActionNotFound.
    #[must_use]
    pub fn hide_action(mut self, name: &str) -> Self {
        self.hidden.insert(name.to_string());
        self
    }

    /// Register a named filter function, referenced by `before`/`after`.
    #[must_use]
    pub fn filter_fn<F>(mut self, name: &str, func: F) -> Self
    where
        F: Fn(&mut Controller) -> anyhow::Result<FilterFlow> + Send + Sync + 'static,
    {
        self.filter_fns.insert(name.to_string(), Arc::new(func));
        self
    }

    /// Append a before-filter.
    #[must_use]
    pub fn before(mut self, target: &str, options: FilterOptions) -> Self {
        self.before_ops.push(FilterOp::Add {
            target: target.to_string(),
            options,
        });
        self
    }

    /// Append an after-filter.
    #[must_use]
    pub fn after(mut self, target: &str, options: FilterOptions) -> Self {
        self.after_ops.push(FilterOp::Add {
            target: target.to_string(),
            options,
        });
        self
    }

    /// Remove an already declared before-filter.
    #[must_use]
    pub fn skip_before(mut self, target: &str) -> Self {
        self.before_ops.push(FilterOp::Skip {
            target: target.to_string(),
        });
        self
    }

    /// Remove an already declared after-filter.
    #[must_use]
    pub fn skip_after(mut self, target: &str) -> Self {
        self.after_ops.push(FilterOp::Skip {
            target: target.to_string(),
        });
        self
    }

    /// Add to the controller's default provided formats.
    #[must_use]
    pub fn provides(mut self, formats: &[&str]) -> Self {
        self.provided.provides(formats, None);
        self
    }

    /// Add provided formats carrying transform arguments.
    #[must_use]
    pub fn provides_with_args(mut self, formats: &[&str], args: Value) -> Self {
        self.provided.provides(formats, Some(args));
        self
    }

    /// Replace the provided formats wholesale.
    #[must_use]
    pub fn only_provides(mut self, formats: &[&str]) -> Self {
        self.provided.only(formats);
        self
    }

    /// Remove formats from the default provided set.
    #[must_use]
    pub fn does_not_provide(mut self, formats: &[&str]) -> Self {
        self.provided.remove(formats);
        self
    }

    /// Override the body rendered when a before-filter halts with no
    /// payload.
    #[must_use]
    pub fn halted_body(mut self, body: &str) -> Self {
        self.halted_body = body.to_string();
        self
    }

    /// Validate the declarations and freeze them into a spec.
    pub fn build(self) -> Result<Arc<ControllerSpec>, ConfigError> {
        let mut actions = HashMap::new();
        for action in self.actions {
            if actions.contains_key(&action.name) {
                return Err(ConfigError::DuplicateAction(
                    action.name.clone(),
                    self.name.clone(),
                ));
            }
            actions.insert(action.name.clone(), action);
        }

        let before_filters = Self::replay_filter_ops(self.before_ops)?;
        let after_filters = Self::replay_filter_ops(self.after_ops)?;

        for filter in before_filters.iter().chain(after_filters.iter()) {
            if !self.filter_fns.contains_key(&filter.target) {
                return Err(ConfigError::UnknownFilterTarget(filter.target.clone()));
            }
        }

        Ok(Arc::new(ControllerSpec {
            name: self.name,
            actions,
            hidden: self.hidden,
            filter_fns: self.filter_fns,
            before_filters,
            after_filters,
            provided: self.provided,
            halted_body: self.halted_body,
        }))
    }

    fn replay_filter_ops(ops: Vec<FilterOp>) -> Result<Vec<FilterSpec>, ConfigError> {
        let mut chain = Vec::new();
        for op in ops {
            match op {
                FilterOp::Add { target, options } => {
                    filters::add_filter(&mut chain, &target, options.into_rule()?);
                }
                FilterOp::Skip { target } => filters::skip_filter(&mut chain, &target),
            }
        }
        Ok(chain)
    }
}

/// The request-scoped controller instance. Built by the dispatcher for one
/// request; the renderer reads the final status, headers and body off it.
pub struct Controller {
    spec: Arc<ControllerSpec>,
    pub(crate) env: Arc<DispatchEnv>,
    request: Request,
    status: u16,
    headers: HeaderVec,
    body: Body,
    action: String,
    pub(crate) assigns: serde_json::Map<String, Value>,
    provided_override: Option<ProvidedFormats>,
    content_type: Option<String>,
    pub(crate) thrown_content: HashMap<String, String>,
    pub(crate) partial_cache: HashMap<String, PathBuf>,
    pub(crate) view_context_cache: Option<Value>,
}

impl Controller {
    /// Bind a spec to a request. Status defaults to 200 for normal dispatch;
    /// exception redispatch passes the envelope's status.
    #[must_use]
    pub fn build(
        spec: Arc<ControllerSpec>,
        env: Arc<DispatchEnv>,
        request: Request,
        status: u16,
    ) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((
            Arc::from("Content-Type"),
            "text/html; charset=utf-8".to_string(),
        ));
        let action = request.action_name().unwrap_or_default().to_string();
        Controller {
            spec,
            env,
            request,
            status,
            headers,
            body: Body::Empty,
            action,
            assigns: serde_json::Map::new(),
            provided_override: None,
            content_type: None,
            thrown_content: HashMap::new(),
            partial_cache: HashMap::new(),
            view_context_cache: None,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &ControllerSpec {
        &self.spec
    }

    pub(crate) fn spec_arc(&self) -> Arc<ControllerSpec> {
        Arc::clone(&self.spec)
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub(crate) fn into_request(self) -> Request {
        self.request
    }

    /// Merged parameter lookup (route params shadow query params).
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.param(name)
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Set the status from a symbolic name such as `not_found` or
    /// `moved_temporarily`.
    pub fn set_status_name(&mut self, name: &str) -> Result<(), ConfigError> {
        self.status = status_code_for_name(name)?;
        Ok(())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a response header (last write wins, Set-Cookie appends).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        response::set_header(&mut self.headers, name, value.into());
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// The action this request resolved to.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    pub(crate) fn set_action(&mut self, action: &str) {
        self.action = action.to_string();
        if self.request.action_name() != Some(action) {
            self.request.set_param(crate::request::ACTION_PARAM, action);
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.request.session
    }

    #[must_use]
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.request.session
    }

    /// The exception envelope, inside an error-controller action.
    #[must_use]
    pub fn exception(&self) -> Option<&ExceptionEnvelope> {
        self.request.exception.as_deref()
    }

    /// Expose a value to the view templates under the given name.
    pub fn assign(&mut self, name: &str, value: impl serde::Serialize) -> anyhow::Result<()> {
        self.assigns
            .insert(name.to_string(), serde_json::to_value(value)?);
        self.view_context_cache = None;
        Ok(())
    }

    /// The formats this request can produce: the per-request override when
    /// one was made, otherwise the controller default.
    #[must_use]
    pub fn provided_formats(&self) -> &ProvidedFormats {
        self.provided_override
            .as_ref()
            .unwrap_or_else(|| self.spec.provided_formats())
    }

    fn provided_formats_mut(&mut self) -> &mut ProvidedFormats {
        // Copy-on-write: the class default is shared and never mutated.
        if self.provided_override.is_none() {
            self.provided_override = Some(self.spec.provided_formats().clone());
        }
        #[allow(clippy::unwrap_used)]
        self.provided_override.as_mut().unwrap()
    }

    fn ensure_formats_not_frozen(&self) -> anyhow::Result<()> {
        if self.content_type.is_some() {
            anyhow::bail!(
                "cannot modify provided formats: content negotiation has already run for this request"
            );
        }
        Ok(())
    }

    /// Add formats to this request's provided set.
    pub fn provides(&mut self, formats: &[&str]) -> anyhow::Result<()> {
        self.ensure_formats_not_frozen()?;
        self.provided_formats_mut().provides(formats, None);
        Ok(())
    }

    /// Add formats carrying transform arguments.
    pub fn provides_with_args(&mut self, formats: &[&str], args: Value) -> anyhow::Result<()> {
        self.ensure_formats_not_frozen()?;
        self.provided_formats_mut().provides(formats, Some(args));
        Ok(())
    }

    /// Replace this request's provided set wholesale.
    pub fn only_provides(&mut self, formats: &[&str]) -> anyhow::Result<()> {
        self.ensure_formats_not_frozen()?;
        self.provided_formats_mut().only(formats);
        Ok(())
    }

    /// Remove formats from this request's provided set.
    pub fn does_not_provide(&mut self, formats: &[&str]) -> anyhow::Result<()> {
        self.ensure_formats_not_frozen()?;
        self.provided_formats_mut().remove(formats);
        Ok(())
    }

    /// Whether content negotiation has already run.
    #[must_use]
    pub fn content_type_set(&self) -> bool {
        self.content_type.is_some()
    }

    /// The negotiated response format for this request.
    ///
    /// The first call performs content negotiation, freezes the provided
    /// formats and sets the Content-Type (plus any per-format extra
    /// headers). Subsequent calls return the cached result.
    pub fn content_type(&mut self) -> anyhow::Result<String> {
        if let Some(fmt) = &self.content_type {
            return Ok(fmt.clone());
        }
        let fmt = negotiate(
            self.request.accept(),
            self.request.format_param(),
            self.provided_formats(),
            &self.env.media,
        )?;
        if !self.env.media.contains(&fmt) {
            return Err(DispatchError::NotAcceptable(format!(
                "unknown content type for response: {fmt}"
            ))
            .into());
        }
        debug!(request_id = %self.request.request_id, format = %fmt, "content negotiation complete");
        self.apply_format_headers(&fmt);
        self.content_type = Some(fmt.clone());
        Ok(fmt)
    }

    /// Set the Content-Type and the format's extra response headers.
    pub(crate) fn apply_format_headers(&mut self, format: &str) {
        if let Some(content_type) = self.env.media.content_type_for(format) {
            let content_type = content_type.to_string();
            self.set_header("Content-Type", content_type);
        }
        let extra: Vec<(String, String)> = self
            .env
            .media
            .get(format)
            .map(|m| m.response_headers.clone())
            .unwrap_or_default();
        for (name, value) in extra {
            self.set_header(&name, value);
        }
    }

    /// Redirect this response: sets the status and Location header and
    /// returns a small notice body for clients that do not follow.
    pub fn redirect(&mut self, location: &str) -> Body {
        self.status = 302;
        self.set_header("Location", location);
        Body::Literal(format!(
            "<html><body>You are being <a href=\"{location}\">redirected</a>.</body></html>"
        ))
    }

    /// Look up an action and invoke it with bound parameters. Unknown
    /// actions are ActionNotFound; missing required parameters are
    /// BadRequest.
    pub fn invoke_action(&mut self, name: &str) -> anyhow::Result<Body> {
        let spec = self.spec_arc();
        let action = spec.action(name).ok_or_else(|| {
            DispatchError::ActionNotFound(format!(
                "action `{name}` was not found in controller `{}`",
                spec.name()
            ))
        })?;
        let args = bind_action_args(action, &self.request)?;
        let handler = Arc::clone(&action.handler);
        handler(self, &args)
    }

    /// Resolve a halt payload into the response body.
    pub(crate) fn resolve_halt_body(
        &mut self,
        source: super::filters::BodySource,
    ) -> anyhow::Result<Body> {
        use super::filters::BodySource;
        match source {
            BodySource::Empty => Ok(Body::Literal(self.spec.halted_body().to_string())),
            BodySource::Literal(s) => Ok(Body::Literal(s)),
            BodySource::Named(action) => self.invoke_action(&action),
            BodySource::Computed(func) => func(self),
        }
    }

    /// Assemble the outbound response, consuming the controller.
    #[must_use]
    pub fn into_response(self) -> ResponseContext {
        ResponseContext {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("controller", &self.spec.name())
            .field("action", &self.action)
            .field("status", &self.status)
            .field("body", &self.body)
            .finish()
    }
}

/// Pull each declared positional parameter from the merged route/query
/// params, falling back to declared defaults.
fn bind_action_args(action: &ActionSpec, request: &Request) -> Result<Vec<String>, DispatchError> {
    action
        .params
        .iter()
        .map(|param| match request.param(&param.name) {
            Some(value) => Ok(value.to_string()),
            None => param.default.clone().ok_or_else(|| {
                DispatchError::BadRequest(format!(
                    "missing required parameter `{}` for action `{}`",
                    param.name, action.name
                ))
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_conflicting_filter_rule() {
        let result = ControllerSpec::builder("widgets")
            .filter_fn("check", |_c| Ok(FilterFlow::Continue))
            .before(
                "check",
                FilterOptions::only(&["index"]).with_exclude(&["show"]),
            )
            .build();
        assert!(matches!(result, Err(ConfigError::ConflictingFilterRule)));
    }

    #[test]
    fn test_builder_rejects_unknown_filter_target() {
        let result = ControllerSpec::builder("widgets")
            .before("missing", FilterOptions::always())
            .build();
        assert!(matches!(result, Err(ConfigError::UnknownFilterTarget(t)) if t == "missing"));
    }

    #[test]
    fn test_builder_rejects_duplicate_action() {
        let result = ControllerSpec::builder("widgets")
            .action("index", |_c, _a| Ok(Body::Empty))
            .action("index", |_c, _a| Ok(Body::Empty))
            .build();
        assert!(matches!(result, Err(ConfigError::DuplicateAction(a, c)) if a == "index" && c == "widgets"));
    }

    #[test]
    fn test_redeclared_filter_replaces_rule() {
        let spec = ControllerSpec::builder("widgets")
            .filter_fn("check", |_c| Ok(FilterFlow::Continue))
            .before("check", FilterOptions::always())
            .before("check", FilterOptions::only(&["index"]))
            .build()
            .unwrap();
        assert_eq!(spec.before_filters().len(), 1);
        assert!(spec.before_filters()[0].rule.applies_to("index"));
        assert!(!spec.before_filters()[0].rule.applies_to("show"));
    }

    #[test]
    fn test_hidden_actions_are_not_callable() {
        let spec = ControllerSpec::builder("widgets")
            .action("index", |_c, _a| Ok(Body::Empty))
            .action("helper", |_c, _a| Ok(Body::Empty))
            .hide_action("helper")
            .build()
            .unwrap();
        assert!(spec.callable("index"));
        assert!(!spec.callable("helper"));
        assert!(!spec.callable("nonexistent"));
    }
}
