//! Color-coded status lines for the grader.
//!
//! These are the operator-facing output of the harness, distinct from the
//! `tracing` diagnostics: green for states that need no attention, red for
//! results that do, and cyan for advisories such as entering manual
//! recovery.

use colored::Colorize;

/// Report a state that needs no attention, e.g. an on-time submission or a
/// completed checkout.
pub fn success(message: &str) {
    println!("{}", message.green());
}

/// Report a result the grader has to look at, e.g. a late submission or a
/// failed checkout.
pub fn failure(message: &str) {
    println!("{}", message.red());
}

/// Report an advisory, e.g. that a recovery shell is about to open.
pub fn advisory(message: &str) {
    println!("{}", message.cyan());
}
