//! Subcommand implementations.
//!
//! Each command returns a JSON value that `main` prints to stdout.

pub mod lookup;
pub mod replay;
pub mod visible;
