//! Speaker attribution for speech bubbles.

pub(crate) mod assign;
pub(crate) mod chapter;
