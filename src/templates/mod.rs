//! Template resolution and the engine boundary.
//!
//! The resolver owns the *mapping* from logical view identifiers to files;
//! the engines own the rendering. The dispatch hot path never touches the
//! filesystem for lookups: a boot-time (and reload-time) scan of the view
//! tree builds an exact-match cache, and lookups are pure cache hits.

mod engine;
mod resolver;

pub use engine::{
    EngineRegistry, MiniJinjaEngine, RawEngine, TemplateEngine, TemplateInput, TemplateSource,
};
pub use resolver::{TemplateMiss, TemplateResolver};
