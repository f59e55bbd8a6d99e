//! Shared utilities.

pub mod transition;
