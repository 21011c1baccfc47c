//! HTTP content negotiation.
//!
//! Combines the client's `Accept` header (or an explicit format override
//! resolved by the router) with the formats a controller declares it can
//! produce, and picks one response format. See [`negotiate`] for the
//! algorithm and [`MediaRegistry`] for the media-type synonym table.

pub mod accept;
mod core;

pub use accept::{negotiate, parse_accept, AcceptEntry};
pub use core::{MediaRegistry, MediaType, ProvidedFormats, TransformFn};
