//! Reading-order resolution over page geometry.

pub(crate) mod reading_order;
