//! Subcommand implementations

pub mod find;
pub mod install;
pub mod targets;
