//! Persistence: the record store interface and its SQLite and in-memory
//! implementations.

mod memory;
mod models;
mod repository;
mod schema;
mod store;

pub use memory::MemoryStore;
pub use models::{
    Account, AccountTemplate, Asset, Automation, CustomField, Label, Node, Platform, Protocol,
    PushTask,
};
pub use repository::SqliteRepository;
pub use schema::{init_db, init_memory_db};
pub use store::RecordStore;
