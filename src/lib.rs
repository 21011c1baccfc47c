//! # Turnstile
//!
//! **Turnstile** is the request dispatch core of a controller-based web
//! stack: it takes a decoded HTTP request that a router has already
//! resolved to `{controller, action, params}`, runs the controller's
//! before/after filter chains with explicit halt semantics, performs
//! content negotiation against the controller's provided formats, resolves
//! and renders a view template through a cached path lookup, and converts
//! any raised error into a rendered error response by re-dispatching into
//! an error controller.
//!
//! The transport (socket handling, static files, process management), the
//! router, the session persistence backend and the template engines are
//! external collaborators behind narrow traits; this crate orchestrates
//! them.
//!
//! ## Architecture
//!
//! - **[`request`] / [`response`]** - the inbound request value and the
//!   outbound status/headers/body triple
//! - **[`controller`]** - immutable controller specs (actions, filters,
//!   provided formats) and the per-request controller instance
//! - **[`negotiation`]** - `Accept` parsing, the media-type synonym table
//!   and the negotiation algorithm
//! - **[`templates`]** - the view-tree path cache and the template engine
//!   boundary
//! - **[`render`]** - the `render` surface tying negotiation, resolution
//!   and engines together
//! - **[`dispatcher`]** - the per-request state machine and exception
//!   redispatch
//! - **[`session`]** - the session store hooks
//! - **[`hot_reload`]** - filesystem watching for template cache rebuilds
//! - **[`runtime_config`]** - environment/YAML configuration
//!
//! ## Request Lifecycle
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Transport
//!     participant Dispatcher
//!     participant Filters as FilterChain
//!     participant Action
//!     participant Negotiator as ContentNegotiator
//!     participant Resolver as TemplateResolver
//!     participant Engine as TemplateEngine
//!     participant Recovery as ExceptionRedispatch
//!
//!     Transport->>Dispatcher: handle(request)
//!     Dispatcher->>Dispatcher: route checks, build controller,<br/>session load hook
//!     Dispatcher->>Filters: run(before_filters)
//!
//!     alt A filter halts
//!         Filters-->>Dispatcher: Halted(body source)
//!         Note over Dispatcher: action is skipped,<br/>halt payload becomes the body
//!     else Chain completes
//!         Dispatcher->>Action: invoke with bound params
//!         Action->>Negotiator: content_type()
//!         Negotiator-->>Action: format (frozen)
//!         Action->>Resolver: resolve(controller/action.format)
//!         Resolver-->>Action: cached template path
//!         Action->>Engine: transform(file, view context)
//!         Engine-->>Action: content (+ layout wrap)
//!         Action-->>Dispatcher: body
//!     end
//!
//!     Dispatcher->>Filters: run(after_filters)
//!     Dispatcher->>Dispatcher: session save hook
//!     Dispatcher-->>Transport: controller (status, headers, body)
//!
//!     alt Anything above raised
//!         Dispatcher->>Recovery: normalize + redispatch
//!         Recovery->>Dispatcher: dispatch_action(error controller)
//!         Recovery-->>Transport: error response<br/>(static fallback on double failure)
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use turnstile::{
//!     ControllerSpec, Dispatcher, FilterFlow, FilterOptions, RenderOptions, Request,
//!     RuntimeConfig,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     turnstile::logging::init();
//!
//!     let mut dispatcher = Dispatcher::from_config(&RuntimeConfig::from_env())?;
//!
//!     let widgets = ControllerSpec::builder("widgets")
//!         .provides(&["xml"])
//!         .filter_fn("require_login", |c| {
//!             if c.session().contains_key("user_id") {
//!                 Ok(FilterFlow::Continue)
//!             } else {
//!                 Ok(FilterFlow::Halt("login required".into()))
//!             }
//!         })
//!         .before("require_login", FilterOptions::exclude(&["index"]))
//!         .action("index", |c, _args| {
//!             c.assign("widgets", vec!["anvil", "sprocket"])?;
//!             c.render(RenderOptions::default())
//!         })
//!         .build()?;
//!     dispatcher.register_controller(widgets);
//!
//!     // The transport delivers routed requests:
//!     // let response = dispatcher.respond(request);
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! One dispatch runs per inbound request on whatever worker the transport
//! supplies; the core creates no threads. Template path lookups read a
//! lock-free snapshot that reloads swap atomically. For engines or
//! libraries that are not reentrant, `use_mutex` serializes the entire
//! `handle()` call behind one global mutex.

pub mod controller;
pub mod dispatcher;
pub mod errors;
pub mod hot_reload;
pub mod ids;
pub mod logging;
pub mod negotiation;
pub mod render;
pub mod request;
pub mod response;
pub mod runtime_config;
pub mod session;
pub mod templates;

pub use controller::{
    BodySource, Controller, ControllerBuilder, ControllerSpec, FilterFlow, FilterOptions,
    FilterRule, Outcome, ParamSpec,
};
pub use dispatcher::{DispatchEnv, Dispatcher};
pub use errors::{ConfigError, DispatchError, ExceptionEnvelope};
pub use ids::RequestId;
pub use negotiation::{MediaRegistry, MediaType, ProvidedFormats};
pub use render::{LayoutChoice, RenderOptions};
pub use request::{HeaderVec, ParamVec, Request};
pub use response::{Body, ResponseContext};
pub use runtime_config::RuntimeConfig;
pub use session::{MemorySessionStore, NoopSessionStore, Session, SessionStore};
pub use templates::{EngineRegistry, TemplateEngine, TemplateResolver};
