//! Filter chains with explicit halt semantics.
//!
//! Before-filters run in declaration order ahead of the action; any of them
//! can short-circuit the chain by returning [`FilterFlow::Halt`] with a
//! [`BodySource`] describing where the response body comes from instead.
//! After-filters run in declaration order once the body has been computed,
//! halt or not. Halting is ordinary control flow, not an error: the chain
//! reports it as a tagged [`Outcome`].

use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::errors::ConfigError;
use crate::response::Body;

use super::core::Controller;

/// A filter function: runs against the request-scoped controller and either
/// lets the chain continue or halts it.
pub type FilterFn = Arc<dyn Fn(&mut Controller) -> anyhow::Result<FilterFlow> + Send + Sync>;

/// What a filter tells the chain to do next.
pub enum FilterFlow {
    /// Proceed to the next filter (and eventually the action).
    Continue,
    /// Short-circuit: skip the action, take the body from the payload.
    Halt(BodySource),
}

/// Where a halted chain's response body comes from.
#[derive(Clone)]
pub enum BodySource {
    /// No payload: the controller's fixed "filter chain halted" body.
    Empty,
    /// A literal string used verbatim.
    Literal(String),
    /// A named action, invoked immediately; its result becomes the body.
    Named(String),
    /// A callable invoked with the controller; its return becomes the body.
    Computed(Arc<dyn Fn(&mut Controller) -> anyhow::Result<Body> + Send + Sync>),
}

impl From<&str> for BodySource {
    fn from(s: &str) -> Self {
        BodySource::Literal(s.to_string())
    }
}

impl From<String> for BodySource {
    fn from(s: String) -> Self {
        BodySource::Literal(s)
    }
}

impl std::fmt::Debug for BodySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodySource::Empty => write!(f, "BodySource::Empty"),
            BodySource::Literal(s) => write!(f, "BodySource::Literal({s:?})"),
            BodySource::Named(a) => write!(f, "BodySource::Named({a:?})"),
            BodySource::Computed(_) => write!(f, "BodySource::Computed"),
        }
    }
}

/// Result of running a filter chain.
#[derive(Debug)]
pub enum Outcome {
    /// Every applicable filter ran without halting.
    Completed,
    /// A filter halted the chain with the given body source.
    Halted(BodySource),
}

impl Outcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

/// When a filter applies, relative to the current action.
#[derive(Debug, Clone)]
pub enum FilterRule {
    /// Applies to every action.
    Always,
    /// Applies only to the named actions.
    Only(HashSet<String>),
    /// Applies to every action except the named ones.
    Exclude(HashSet<String>),
}

impl FilterRule {
    #[must_use]
    pub fn applies_to(&self, action: &str) -> bool {
        match self {
            FilterRule::Always => true,
            FilterRule::Only(actions) => actions.contains(action),
            FilterRule::Exclude(actions) => !actions.contains(action),
        }
    }
}

/// Registration-surface options for a filter. `only` and `exclude` are
/// mutually exclusive; supplying both fails at controller build time,
/// before any request is dispatched.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    only: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

impl FilterOptions {
    /// Apply to every action.
    #[must_use]
    pub fn always() -> Self {
        Self::default()
    }

    /// Apply only to the named actions.
    #[must_use]
    pub fn only(actions: &[&str]) -> Self {
        Self::default().with_only(actions)
    }

    /// Apply to every action except the named ones.
    #[must_use]
    pub fn exclude(actions: &[&str]) -> Self {
        Self::default().with_exclude(actions)
    }

    #[must_use]
    pub fn with_only(mut self, actions: &[&str]) -> Self {
        self.only = Some(actions.iter().map(|a| (*a).to_string()).collect());
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, actions: &[&str]) -> Self {
        self.exclude = Some(actions.iter().map(|a| (*a).to_string()).collect());
        self
    }

    pub(crate) fn into_rule(self) -> Result<FilterRule, ConfigError> {
        match (self.only, self.exclude) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingFilterRule),
            (Some(only), None) => Ok(FilterRule::Only(only.into_iter().collect())),
            (None, Some(exclude)) => Ok(FilterRule::Exclude(exclude.into_iter().collect())),
            (None, None) => Ok(FilterRule::Always),
        }
    }
}

/// One registered filter: the name of a filter function plus its rule.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub target: String,
    pub rule: FilterRule,
}

/// Add a filter to a chain. Re-declaring a target already present replaces
/// its rule in place rather than appending a duplicate.
pub(crate) fn add_filter(filters: &mut Vec<FilterSpec>, target: &str, rule: FilterRule) {
    if let Some(existing) = filters.iter_mut().find(|f| f.target == target) {
        existing.rule = rule;
    } else {
        filters.push(FilterSpec {
            target: target.to_string(),
            rule,
        });
    }
}

/// Remove the first filter matching the target. Logs a warning when the
/// target was never in the chain.
pub(crate) fn skip_filter(filters: &mut Vec<FilterSpec>, target: &str) {
    match filters.iter().position(|f| f.target == target) {
        Some(idx) => {
            filters.remove(idx);
        }
        None => {
            warn!(filter = %target, "filter was not found in the filter chain");
        }
    }
}

/// Run a filter chain for the given action.
///
/// Filters whose rule does not cover the action are skipped. The first halt
/// short-circuits; otherwise the chain completes. Errors raised by filter
/// functions propagate to the dispatcher's exception boundary.
pub fn run_chain(
    controller: &mut Controller,
    chain: &[FilterSpec],
    action: &str,
) -> anyhow::Result<Outcome> {
    let spec = controller.spec_arc();
    for filter in chain {
        if !filter.rule.applies_to(action) {
            continue;
        }
        let func = spec.filter_fn(&filter.target).ok_or_else(|| {
            crate::errors::DispatchError::InternalServerError(format!(
                "filter target `{}` is not registered",
                filter.target
            ))
        })?;
        match func(controller)? {
            FilterFlow::Continue => {}
            FilterFlow::Halt(source) => return Ok(Outcome::Halted(source)),
        }
    }
    Ok(Outcome::Completed)
}
