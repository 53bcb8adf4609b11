//! warden - account, template and platform rules for an asset inventory.
//!
//! This crate provides functionality to:
//! - Resolve account templates into default field values
//! - Keep account names unique per asset
//! - Reconcile new accounts against existing ones under a conflict policy
//! - Create one account across many assets with per-asset outcomes
//! - Validate asset protocol lists against their platform
//!
//! # Example
//!
//! ```no_run
//! use warden::accounts::create_account;
//! use warden::choices::OnInvalid;
//! use warden::db::{SqliteRepository, init_memory_db};
//! use serde_json::json;
//!
//! fn main() -> warden::Result<()> {
//!     let repo = SqliteRepository::new(init_memory_db()?);
//!     let payload = json!({"asset": "a1", "username": "root"});
//!     let (account, outcome) = create_account(
//!         &repo,
//!         &repo,
//!         payload.as_object().cloned().unwrap_or_default(),
//!         OnInvalid::Skip,
//!     )?;
//!     println!("{} {:?}", account.name, outcome);
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod assets;
pub mod choices;
pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod logging;
pub mod push;
pub mod utils;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use db::{MemoryStore, RecordStore, SqliteRepository, init_db};
pub use error::{Result, WardenError};
pub use push::PushQueue;
