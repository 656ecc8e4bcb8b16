//! Integration test target.

mod fixed_model;
mod simulation;
