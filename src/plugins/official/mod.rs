//! Implementations shipped with the harness

pub mod reference;
