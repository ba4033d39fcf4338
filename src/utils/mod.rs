//!
//! Utility module for the wallet synchronizer.
//!
//! Re-exports the fee/size model and the formatting helpers used throughout the codebase.
/// Transaction size, fee, denomination and unlock rules
pub mod fee;
/// Utility functions for formatting and display
pub mod format;

pub use fee::*;
pub use format::{pretty_print_amount, pretty_print_bytes};
