//! Isolated end-to-end scenario runner.
//!
//! Each scenario copies its fixtures into a fresh workspace, optionally seeds
//! external data, runs a script as a subprocess from inside the workspace, and
//! checks the exit status and captured output against declared expectations.
pub mod cli;
pub mod scenarios;
pub mod staging;
pub mod util;
pub mod workspace;
