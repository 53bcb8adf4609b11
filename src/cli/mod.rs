//! Command-line interface definitions.

mod args;
mod commands;

pub use args::{Cli, ConfigArgs};
pub use commands::{
    AccountCommands, AssetCommands, Commands, ConfigCommands, PlatformCommands, TemplateCommands,
};
