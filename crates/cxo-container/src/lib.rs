//! High-level API for CXO.
//!
//! A [`Container`] wraps any [`Database`](cxo_store::Database) backend with
//! a schema [`Registry`](cxo_schema::Registry) and a reference
//! [`Engine`](cxo_refs::Engine). It saves and loads object graphs, publishes
//! signed [`Root`](cxo_refs::Root)s to feeds, and collects garbage.
//!
//! ```
//! use std::sync::Arc;
//! use cxo_container::Container;
//! use cxo_schema::{Kind, Record, Registry, Schema};
//! use cxo_store::MemoryDb;
//!
//! let registry = Registry::new();
//! registry
//!     .register(Schema::builder("cxo.User").field("Name", Kind::String).build())
//!     .unwrap();
//! let container = Container::new(MemoryDb::new(), Arc::new(registry)).unwrap();
//!
//! let mut alice = Record::new().with("Name", "alice");
//! let digest = container.save("cxo.User", &mut alice).unwrap();
//! assert_eq!(container.load("cxo.User", &digest).unwrap(), alice);
//! ```

pub mod config;
pub mod container;
pub mod error;

pub use config::ContainerConfig;
pub use container::Container;
pub use error::{ContainerError, ContainerResult};
