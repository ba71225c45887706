//! Character re-identification: the cluster arena, the online tracker and the per-title registry.

pub(crate) mod registry;
pub(crate) mod store;
pub(crate) mod tracker;
