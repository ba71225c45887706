//! Chapter timeline: event model, invariant checks and the builder.

pub(crate) mod builder;
pub(crate) mod model;
