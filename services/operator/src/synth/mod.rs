//! Resource synthesis.
//!
//! Pure functions from a desired-state record (and, for a worker, its parent
//! homeserver) to the complete child set. No I/O, no clocks, no random
//! identifiers: the same input always yields field-for-field identical
//! objects, and every list is emitted in a fixed order because the drift
//! checks compare lists positionally.

pub mod common;
pub mod riot;
pub mod synapse;
pub mod worker;

#[cfg(test)]
pub(crate) mod fixtures;
