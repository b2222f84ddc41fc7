//! Library surface for the `datamesh` binary.
//!
//! Config loading, the JSON record store, and the command implementations
//! live here so the integration tests can drive them without a subprocess.

pub mod config;
pub mod service;
pub mod store;
