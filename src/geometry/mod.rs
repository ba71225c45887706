//! Per-page panel geometry and gutter detection.

pub(crate) mod index;
