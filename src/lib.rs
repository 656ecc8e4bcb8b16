//! ReaXLand — multi-agent real-estate market simulation.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod property;
pub mod market;
pub mod env;
pub mod engine;
