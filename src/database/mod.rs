//! Database module exports.
//!
//! - `models` - Typed group settings
//! - `store` - Durable blob storage backends
//! - `repository` - Cached, self-migrating settings access

mod error;
pub mod models;
mod mongo;
mod repository;
mod store;

pub use error::{ConfigError, StoreError};
pub use models::*;
pub use mongo::{Database, MongoGroupStore};
pub use repository::GroupConfigRepository;
pub use store::{GroupStore, MemoryGroupStore, StoredGroup};
