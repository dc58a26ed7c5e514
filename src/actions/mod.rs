//! Action registry for the fixed assistant menu

mod registry;

pub use registry::{lookup, registry, ActionDescriptor, ActionId, Handler};
