//! Chapter records produced by the vision and semantic tagging services.

pub(crate) mod chapter;
pub(crate) mod scene;
