//! Inbound request representation.
//!
//! The transport parses the wire format and the router resolves the path;
//! this type is what the dispatch core consumes: method, path, ordered
//! header/cookie multimaps, query parameters and the route-resolved
//! parameters (including the `controller` and `action` names).
//!
//! A request is immutable once constructed except for derived-parameter
//! injection via [`Request::set_param`], which the dispatcher uses to record
//! the resolved action and, during exception redispatch, snapshots of the
//! original params/session/cookies.

use crate::errors::ExceptionEnvelope;
use crate::ids::RequestId;
use crate::session::Session;
use http::Method;
use serde_json::{json, Value};
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum inline headers/cookies before heap allocation.
/// Most requests have ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Maximum inline route/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated header/cookie storage for the hot path.
///
/// Header names use `Arc<str>` instead of `String` because names repeat
/// across requests (Content-Type, Accept, ...) and `Arc::clone()` is an O(1)
/// atomic increment. Values remain `String` as they are per-request data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Stack-allocated parameter storage for the hot path.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Route parameter key carrying the controller name.
pub const CONTROLLER_PARAM: &str = "controller";
/// Route parameter key carrying the action name.
pub const ACTION_PARAM: &str = "action";
/// Parameter key carrying an explicit response format override.
pub const FORMAT_PARAM: &str = "format";

/// A decoded HTTP request plus the router's resolution for it.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Unique request ID for tracing and correlation.
    pub request_id: RequestId,
    /// HTTP method (GET, POST, ...).
    pub method: Method,
    /// Request path as received.
    pub path: String,
    /// HTTP headers in arrival order.
    pub headers: HeaderVec,
    /// Query string parameters in arrival order.
    pub query_params: ParamVec,
    /// Router output: named parameters including `controller` and `action`.
    /// Empty when no route matched.
    pub route_params: ParamVec,
    /// Cookies parsed from the Cookie header.
    pub cookies: HeaderVec,
    /// Raw request body, if any.
    pub body: Option<String>,
    /// Session data loaded by the session-store hook at dispatch time.
    pub session: Session,
    /// Envelope injected during exception redispatch, for error views.
    pub exception: Option<Arc<ExceptionEnvelope>>,
}

impl Request {
    /// Create a request for the given method and path. Headers, params and
    /// cookies start empty; the transport fills them in.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Request {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Apply the router's output. An empty parameter set means no route
    /// matched; the dispatcher rejects that with a BadRequest.
    pub fn apply_route(&mut self, params: ParamVec) {
        self.route_params = params;
    }

    /// Adopt an inbound `X-Request-Id` header once the transport has filled
    /// the headers in; absent or invalid values keep a freshly generated id.
    pub fn adopt_request_id(&mut self) {
        self.request_id = RequestId::from_header_or_new(self.get_header("x-request-id"));
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name.
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name.
    ///
    /// Uses "last write wins" semantics: for `?limit=10&limit=20` this
    /// returns the last occurrence.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a route parameter by name (last write wins).
    #[inline]
    #[must_use]
    pub fn get_route_param(&self, name: &str) -> Option<&str> {
        self.route_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Merged parameter lookup: route parameters shadow query parameters.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.get_route_param(name).or_else(|| self.get_query_param(name))
    }

    /// Inject a derived parameter. Appended to the route parameters, so the
    /// last write wins on lookup.
    pub fn set_param(&mut self, name: &str, value: impl Into<String>) {
        self.route_params.push((Arc::from(name), value.into()));
    }

    /// Controller name resolved by the router, if any.
    #[must_use]
    pub fn controller_name(&self) -> Option<&str> {
        self.get_route_param(CONTROLLER_PARAM)
    }

    /// Action name resolved by the router, if any.
    #[must_use]
    pub fn action_name(&self) -> Option<&str> {
        self.get_route_param(ACTION_PARAM)
    }

    /// Explicit response format override (path extension or query param),
    /// already extracted by the router.
    #[must_use]
    pub fn format_param(&self) -> Option<&str> {
        self.param(FORMAT_PARAM)
    }

    /// The Accept header; absent means "anything".
    #[must_use]
    pub fn accept(&self) -> &str {
        self.get_header("accept").unwrap_or("*/*")
    }

    /// Session id from the `_session_id` cookie, if present.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.get_cookie(crate::session::SESSION_ID_KEY)
    }

    /// Snapshot of the merged parameters as a JSON object, for the
    /// `original_params` reserved key on error redispatch.
    #[must_use]
    pub fn params_snapshot(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (k, v) in self.query_params.iter().chain(self.route_params.iter()) {
            map.insert(k.to_string(), Value::String(v.clone()));
        }
        Value::Object(map)
    }

    /// Snapshot of the cookies as a JSON object.
    #[must_use]
    pub fn cookies_snapshot(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (k, v) in &self.cookies {
            map.insert(k.to_string(), Value::String(v.clone()));
        }
        Value::Object(map)
    }

    /// Snapshot of the session as a JSON object.
    #[must_use]
    pub fn session_snapshot(&self) -> Value {
        json!(self.session)
    }
}
