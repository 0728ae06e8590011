//! CLI module organization

pub mod commands;
pub mod execute;

pub use commands::{Cli, Commands, EnvironmentArgs, ReportArgs};
pub use execute::execute;
