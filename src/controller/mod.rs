//! Controller configuration and per-request execution state.
//!
//! A [`ControllerSpec`] is an immutable configuration snapshot built once at
//! registration time: the typed action registry, hidden-action set, filter
//! chains and provided formats. The per-request [`Controller`] instance
//! borrows the spec through an `Arc` and owns every piece of mutable
//! request-scoped state (status, headers, body, view assigns, negotiated
//! format, copy-on-write format overrides).

mod core;
mod filters;

pub use core::{
    ActionFn, ActionSpec, Controller, ControllerBuilder, ControllerSpec, ParamSpec,
};
pub use filters::{
    run_chain, BodySource, FilterFlow, FilterFn, FilterOptions, FilterRule, FilterSpec, Outcome,
};
