//! # rewardgate-store
//!
//! Local key-value persistence for rewardgate.
//!
//! The verification engine only needs four operations from its store:
//! `get`, `set`, `multi_remove` and `get_all_keys`. They are captured by the
//! [`KeyValueStore`] trait, with two implementations:
//!
//! - [`MemoryStore`]: a thread-safe `HashMap`, for tests and ephemeral use
//! - [`SledStore`]: durable storage backed by a sled tree
//!
//! ```
//! use rewardgate_store::{KeyValueStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.set("counter", b"1").unwrap();
//! assert_eq!(store.get("counter").unwrap(), Some(b"1".to_vec()));
//! ```
//!
//! No cross-process transactions are provided. Callers that perform
//! read-modify-write sequences hold their own in-process lock.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod kv;
pub mod sled_store;

pub use error::{Result, StoreError};
pub use kv::{KeyValueStore, MemoryStore};
pub use sled_store::SledStore;
