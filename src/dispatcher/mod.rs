//! Request dispatch orchestration.
//!
//! [`Dispatcher::handle`] drives one request through the per-request state
//! machine: apply the router output, build the controller, run the
//! before-filter chain, invoke the action (or the halt payload), run the
//! after-filter chain, fire the session hooks and hand back the finished
//! controller. Any error raised along the way is normalized and
//! re-dispatched into the error controller by the recovery module, which
//! guarantees the request always terminates with *some* response.

mod core;
mod recovery;

pub use core::{DispatchEnv, Dispatcher};
