//! Command implementations

use std::fmt::Display;

pub mod assemble;
pub mod clean;
pub mod configure;
pub mod devices;
pub mod install;

/// Print a right-aligned status line to stderr.
pub fn status(verb: &str, message: impl Display) {
    eprintln!("{:>12} {}", verb, message);
}
