//! Chapter pipeline: order, identity, speaker, timeline, synthesis and mix in sequence.

pub(crate) mod chapter;
