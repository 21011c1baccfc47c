//! Dispatch error taxonomy and exception normalization.
//!
//! Filters and actions return `anyhow::Result`, so application code can fail
//! with anything. At the dispatcher boundary every raised error is
//! normalized into an [`ExceptionEnvelope`]: known [`DispatchError`] kinds
//! keep their declared status, anything else becomes an internal server
//! error wrapping the original. The envelope's kind name doubles as the
//! error-controller action name (`not_found`, `internal_server_error`, ...).

use thiserror::Error;

/// The error kinds the dispatcher understands.
///
/// `Redirection` is control flow rather than a true failure: raising it from
/// an action or filter short-circuits straight to a `Location` response.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Malformed or missing routing data, or a missing required action
    /// parameter.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The action is not publicly callable on the target controller.
    #[error("action not found: {0}")]
    ActionNotFound(String),

    /// A resource or template is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Content negotiation could not pick a provided format.
    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    /// 3xx control flow carrying the target location.
    #[error("redirection ({status}) to {location}")]
    Redirection { status: u16, location: String },

    /// Anything the dispatcher does not recognize.
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl DispatchError {
    /// The HTTP status this kind maps to.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::BadRequest(_) => 400,
            DispatchError::ActionNotFound(_) => 404,
            DispatchError::NotFound(_) => 404,
            DispatchError::NotAcceptable(_) => 406,
            DispatchError::Redirection { status, .. } => *status,
            DispatchError::InternalServerError(_) => 500,
        }
    }

    /// The error-controller action name for this kind.
    #[must_use]
    pub fn action_name(&self) -> &'static str {
        match self {
            DispatchError::BadRequest(_) => "bad_request",
            DispatchError::ActionNotFound(_) => "action_not_found",
            DispatchError::NotFound(_) => "not_found",
            DispatchError::NotAcceptable(_) => "not_acceptable",
            DispatchError::Redirection { .. } => "redirection",
            DispatchError::InternalServerError(_) => "internal_server_error",
        }
    }

    /// A 302 redirect to the given location.
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        DispatchError::Redirection {
            status: 302,
            location: location.into(),
        }
    }

    /// A permanent (301) redirect to the given location.
    #[must_use]
    pub fn moved_permanently(location: impl Into<String>) -> Self {
        DispatchError::Redirection {
            status: 301,
            location: location.into(),
        }
    }
}

/// Configuration-time errors raised while building controller specs.
/// These fail fast at registration, before any request is dispatched.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("a filter rule cannot set both `only` and `exclude`")]
    ConflictingFilterRule,

    #[error("unknown filter target `{0}`: not a registered filter function or action")]
    UnknownFilterTarget(String),

    #[error("action `{0}` declared twice on controller `{1}`")]
    DuplicateAction(String, String),

    #[error("unknown status name `{0}`")]
    UnknownStatusName(String),
}

/// A raised error, normalized once at the dispatcher boundary.
///
/// Created once per raised error, never mutated, discarded after the error
/// response is produced.
#[derive(Debug, Clone)]
pub struct ExceptionEnvelope {
    /// The normalized kind.
    pub error: DispatchError,
    /// HTTP status declared by the kind.
    pub status: u16,
    /// Human-readable detail including the original error chain.
    pub detail: String,
}

impl ExceptionEnvelope {
    /// Normalize any raised value. `DispatchError` kinds pass through with
    /// their declared status; anything else wraps as a 500.
    #[must_use]
    pub fn normalize(raised: anyhow::Error) -> Self {
        match raised.downcast::<DispatchError>() {
            Ok(known) => ExceptionEnvelope {
                status: known.status(),
                detail: known.to_string(),
                error: known,
            },
            Err(other) => {
                let detail = format!("{other:#}");
                ExceptionEnvelope {
                    error: DispatchError::InternalServerError(detail.clone()),
                    status: 500,
                    detail,
                }
            }
        }
    }

    /// The error-controller action name for this envelope.
    #[must_use]
    pub fn action_name(&self) -> &'static str {
        self.error.action_name()
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self.error, DispatchError::InternalServerError(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.error,
            DispatchError::NotFound(_) | DispatchError::ActionNotFound(_)
        )
    }

    #[must_use]
    pub fn is_redirection(&self) -> bool {
        matches!(self.error, DispatchError::Redirection { .. })
    }

    /// The redirect target, for `Redirection` envelopes.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match &self.error {
            DispatchError::Redirection { location, .. } => Some(location),
            _ => None,
        }
    }
}

/// Map a well-known symbolic status name to its numeric code.
pub fn status_code_for_name(name: &str) -> Result<u16, ConfigError> {
    let code = match name {
        "ok" => 200,
        "created" => 201,
        "accepted" => 202,
        "no_content" => 204,
        "moved_permanently" => 301,
        "found" | "moved_temporarily" => 302,
        "see_other" => 303,
        "not_modified" => 304,
        "bad_request" => 400,
        "unauthorized" => 401,
        "forbidden" => 403,
        "not_found" => 404,
        "not_acceptable" => 406,
        "internal_server_error" => 500,
        "not_implemented" => 501,
        "service_unavailable" => 503,
        _ => return Err(ConfigError::UnknownStatusName(name.to_string())),
    };
    Ok(code)
}
