//! Dispatcher core - hot path for request dispatch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::controller::{run_chain, Controller, ControllerSpec, Outcome};
use crate::errors::DispatchError;
use crate::negotiation::MediaRegistry;
use crate::request::Request;
use crate::response::ResponseContext;
use crate::runtime_config::RuntimeConfig;
use crate::session::{NoopSessionStore, SessionStore};
use crate::templates::{EngineRegistry, TemplateResolver};

use super::recovery;

/// Shared handles every request-scoped controller needs for rendering:
/// the template path cache, the engine registry, the media-type table and
/// the default layout name.
#[derive(Debug)]
pub struct DispatchEnv {
    pub resolver: Arc<TemplateResolver>,
    pub engines: Arc<EngineRegistry>,
    pub media: Arc<MediaRegistry>,
    pub default_layout: String,
}

impl DispatchEnv {
    /// An environment with default engines and media types around the given
    /// resolver.
    #[must_use]
    pub fn with_defaults(resolver: Arc<TemplateResolver>) -> Self {
        DispatchEnv {
            resolver,
            engines: Arc::new(EngineRegistry::with_defaults()),
            media: Arc::new(MediaRegistry::with_defaults()),
            default_layout: "application".to_string(),
        }
    }
}

/// Routes decoded requests through their controller's dispatch lifecycle.
///
/// Controllers are registered by name at boot; the controller registered
/// under the configured error-controller name (default `exceptions`) also
/// serves as the redispatch target for raised errors.
pub struct Dispatcher {
    controllers: HashMap<String, Arc<ControllerSpec>>,
    error_controller_name: String,
    fallback_spec: Arc<ControllerSpec>,
    env: Arc<DispatchEnv>,
    session_store: Arc<dyn SessionStore>,
    use_mutex: bool,
    mutex: Mutex<()>,
}

impl Dispatcher {
    /// A dispatcher over the given environment with no controllers
    /// registered yet.
    #[must_use]
    pub fn new(env: Arc<DispatchEnv>) -> Self {
        let error_controller_name = "exceptions".to_string();
        Dispatcher {
            controllers: HashMap::new(),
            fallback_spec: ControllerSpec::bare(&error_controller_name),
            error_controller_name,
            env,
            session_store: Arc::new(NoopSessionStore),
            use_mutex: false,
            mutex: Mutex::new(()),
        }
    }

    /// Build a dispatcher from runtime configuration: scans the view root,
    /// installs default engines and media types, and applies the mutex and
    /// error-controller settings.
    pub fn from_config(config: &RuntimeConfig) -> anyhow::Result<Self> {
        let resolver = Arc::new(TemplateResolver::build(&config.view_root)?);
        let mut env = DispatchEnv::with_defaults(resolver);
        env.default_layout = config.default_layout.clone();
        let mut dispatcher = Self::new(Arc::new(env));
        dispatcher.use_mutex = config.use_mutex;
        dispatcher.error_controller_name = config.error_controller.clone();
        dispatcher.fallback_spec = ControllerSpec::bare(&config.error_controller);
        Ok(dispatcher)
    }

    #[must_use]
    pub fn env(&self) -> &Arc<DispatchEnv> {
        &self.env
    }

    /// Register a controller spec under its own name.
    ///
    /// Registering a name that already exists replaces the previous spec;
    /// in-flight requests keep the `Arc` they dispatched with.
    pub fn register_controller(&mut self, spec: Arc<ControllerSpec>) {
        let name = spec.name().to_string();
        if self.controllers.insert(name.clone(), spec).is_some() {
            warn!(controller = %name, "replaced existing controller registration");
        } else {
            info!(
                controller = %name,
                total_controllers = self.controllers.len(),
                "controller registered"
            );
        }
    }

    #[must_use]
    pub fn controller(&self, name: &str) -> Option<&Arc<ControllerSpec>> {
        self.controllers.get(name)
    }

    /// Serialize every `handle` call behind one global mutex. Trades
    /// concurrency for safety with engines that are not reentrant.
    pub fn set_use_mutex(&mut self, use_mutex: bool) {
        self.use_mutex = use_mutex;
    }

    /// Replace the session store used by the load/save hooks.
    pub fn set_session_store(&mut self, store: Arc<dyn SessionStore>) {
        self.session_store = store;
    }

    pub(crate) fn error_controller(&self) -> Option<Arc<ControllerSpec>> {
        self.controllers.get(&self.error_controller_name).cloned()
    }

    pub(crate) fn fallback_spec(&self) -> Arc<ControllerSpec> {
        Arc::clone(&self.fallback_spec)
    }

    /// Dispatch one request. Always returns a finished controller and the
    /// action that produced the response; errors have already been routed
    /// through the error controller (or the static fallback) by the time
    /// this returns. The renderer reads status/headers/body off the
    /// controller; [`Dispatcher::respond`] does exactly that.
    pub fn handle(&self, request: Request) -> (Controller, String) {
        let _guard = if self.use_mutex {
            Some(self.mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
        } else {
            None
        };

        let request_id = request.request_id;
        let start = Instant::now();
        info!(
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            route_params = ?request.route_params,
            "dispatching request"
        );

        let (controller, action) = match self.try_dispatch(request) {
            Ok(done) => done,
            Err((request, raised)) => recovery::dispatch_exception(self, request, raised),
        };

        info!(
            request_id = %request_id,
            controller = %controller.spec().name(),
            action = %action,
            status = controller.status(),
            latency_ms = start.elapsed().as_millis() as u64,
            "request dispatched"
        );
        (controller, action)
    }

    /// Dispatch one request and assemble the outbound response.
    #[must_use]
    pub fn respond(&self, request: Request) -> ResponseContext {
        let (controller, _action) = self.handle(request);
        controller.into_response()
    }

    fn try_dispatch(&self, request: Request) -> Result<(Controller, String), (Request, anyhow::Error)> {
        if request.route_params.is_empty() {
            return Err((
                request,
                DispatchError::BadRequest("no routes match the request".to_string()).into(),
            ));
        }
        let Some(controller_name) = request.controller_name().map(str::to_string) else {
            return Err((
                request,
                DispatchError::BadRequest(
                    "route matched, but did not specify a controller".to_string(),
                )
                .into(),
            ));
        };
        let Some(spec) = self.controllers.get(&controller_name).cloned() else {
            return Err((
                request,
                DispatchError::NotFound(format!(
                    "no controller named `{controller_name}` is registered"
                ))
                .into(),
            ));
        };
        let action = request.action_name().unwrap_or("index").to_string();
        debug!(controller = %controller_name, action = %action, "routed");
        self.dispatch_action(spec, &action, request, 200)
    }

    /// Build the controller and run its dispatch lifecycle. On failure the
    /// request is handed back so the caller can redispatch it.
    pub(crate) fn dispatch_action(
        &self,
        spec: Arc<ControllerSpec>,
        action: &str,
        request: Request,
        status: u16,
    ) -> Result<(Controller, String), (Request, anyhow::Error)> {
        let mut controller = Controller::build(spec, Arc::clone(&self.env), request, status);
        match self.run_lifecycle(&mut controller, action) {
            Ok(()) => Ok((controller, action.to_string())),
            Err(raised) => Err((controller.into_request(), raised)),
        }
    }

    fn run_lifecycle(&self, controller: &mut Controller, action: &str) -> anyhow::Result<()> {
        let spec = controller.spec_arc();
        if !spec.callable(action) {
            return Err(DispatchError::ActionNotFound(format!(
                "action `{action}` was not found in controller `{}`",
                spec.name()
            ))
            .into());
        }
        controller.set_action(action);

        let session_id = controller.request().session_id().map(str::to_string);
        match self.session_store.load(session_id.as_deref()) {
            Ok(session) => *controller.session_mut() = session,
            Err(err) => {
                warn!(error = %err, "session load failed, continuing with an empty session");
            }
        }

        let before_start = Instant::now();
        let outcome = run_chain(controller, spec.before_filters(), action)?;
        debug!(
            elapsed_us = before_start.elapsed().as_micros() as u64,
            halted = !outcome.is_completed(),
            "before-filter chain finished"
        );

        let action_start = Instant::now();
        let body = match outcome {
            Outcome::Completed => controller.invoke_action(action)?,
            Outcome::Halted(source) => controller.resolve_halt_body(source)?,
        };
        controller.set_body(body);
        debug!(
            controller = %spec.name(),
            action = %action,
            elapsed_us = action_start.elapsed().as_micros() as u64,
            "body computed"
        );

        // After-filters run once the body exists, halt or not. A halt signal
        // from an after-filter has nothing left to short-circuit.
        let after_start = Instant::now();
        if let Outcome::Halted(_) = run_chain(controller, spec.after_filters(), action)? {
            debug!("after-filter halt ignored, body already computed");
        }
        debug!(
            elapsed_us = after_start.elapsed().as_micros() as u64,
            "after-filter chain finished"
        );

        if let Err(err) = self.session_store.save(session_id.as_deref(), controller.session()) {
            warn!(error = %err, "session save failed, response unaffected");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.controllers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("controllers", &names)
            .field("error_controller", &self.error_controller_name)
            .field("use_mutex", &self.use_mutex)
            .finish()
    }
}
