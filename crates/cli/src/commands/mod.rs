//! CLI subcommand implementations

pub mod policy;
pub mod usage;
