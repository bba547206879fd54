//! Reference engine for CXO.
//!
//! Objects point at each other through three kinds of reference field:
//! `Ref` (one object), `Refs` (an ordered collection, stored as a small
//! tree of digest-addressed nodes) and `Dynamic` (an object of whatever
//! schema the reference names). The [`Engine`] uses the schema registry to
//! find those fields, so it can save a whole graph, resolve it again, and
//! [`walk`](Engine::walk) everything reachable from a set of roots.
//!
//! [`collect_garbage`] marks everything reachable from the [`Root`] of each
//! feed head and sweeps the rest, inside one write transaction.

pub mod engine;
pub mod error;
pub mod gc;
pub mod root;
pub mod tree;
pub mod walk;

pub use engine::Engine;
pub use error::{RefError, RefResult};
pub use gc::{collect_garbage, reachable, GcReport};
pub use root::Root;
pub use tree::RefsNode;
pub use walk::{Visit, Walk};
