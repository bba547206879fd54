//! Foundation types for CXO, a content-addressed, schema-typed object database.
//!
//! Every other CXO crate depends on `cxo-types`.
//!
//! # Key Types
//!
//! - [`Digest`] -- Content address of a stored object (BLAKE3 hash)
//! - [`PubKey`] -- Ed25519 public key identifying a feed
//! - [`ErrorKind`] -- Error taxonomy shared by every layer

pub mod digest;
pub mod error;
pub mod key;

pub use digest::Digest;
pub use error::{ErrorKind, TypeError};
pub use key::PubKey;
