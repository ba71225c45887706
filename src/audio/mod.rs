//! Audio fragments, loop-stitching, the mix engine and WAV output.

pub(crate) mod fragment;
pub(crate) mod mix;
pub(crate) mod report;
pub(crate) mod stitch;
pub(crate) mod wav;
