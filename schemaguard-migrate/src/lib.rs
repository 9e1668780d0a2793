//! Schemaguard Migration Library
//!
//! Command handlers for the `schemaguard-migrate` CLI. The binary (main.rs)
//! parses arguments and maps results to exit codes; everything else lives
//! here so it can be tested without spawning a process.

pub mod commands;
pub mod error;

pub use error::CommandError;
