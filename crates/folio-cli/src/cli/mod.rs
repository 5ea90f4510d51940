pub mod commands;
pub mod config;

pub use commands::{execute, run, CliCommand};
pub use config::{CliConfig, Credentials};
