//! Shared types used across the modelsketch crates.

mod types;

pub use types::{NodeId, Transform};
