//! Episode driving: policies and the runner that plays them.

pub mod policy;
pub mod runner;

pub use policy::{policy_from_name, HoldPolicy, Policy, RandomMaskedPolicy};
pub use runner::{EpisodeReport, EpisodeRunner};
