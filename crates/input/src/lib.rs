//! Input mapping: sliders, keys and mouse motion become [`Action`]s, which
//! [`apply`] turns into view changes.
//!
//! # Invariants
//! - Raw events never touch the view directly.
//! - Every value an action writes goes through the view's clamping.

pub mod action;
pub mod bindings;

pub use action::{Action, Handled, apply};
pub use bindings::{DragTracker, InputMap, Key};

pub fn crate_info() -> &'static str {
    "modelsketch-input v0.1.0"
}
