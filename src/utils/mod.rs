//! Utility functions shared across the application.

mod parsing;
pub(crate) mod permissions;

pub use parsing::{into_field_values, print_json, read_json, split_list};
pub use permissions::restrict_file_permissions;
