//! Command handlers for the warden CLI.
//!
//! Each handler reads its payload, runs one library operation against the
//! SQLite store and prints the result as JSON.

mod account;
mod asset;
mod config_cmd;
mod platform;
mod push_log;
mod template;

pub use account::handle_account;
pub use asset::handle_asset;
pub use config_cmd::handle_config;
pub use platform::handle_platform;
pub use push_log::handle_push_log;
pub use template::handle_template;
