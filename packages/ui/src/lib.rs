//! This crate contains all shared UI for the workspace.

// Dioxus `rsx!` macro expands to unwraps internally; allow to avoid false positives.
#![allow(clippy::disallowed_methods)]

pub mod admin;
mod polling;

pub use polling::{ServerProgress, sleep, use_progress_board};
