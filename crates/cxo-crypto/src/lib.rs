//! Cryptographic primitives for CXO.
//!
//! Provides domain-separated BLAKE3 hashing, Ed25519 signing/verification for
//! feed root packs, the binary Merkle root used as the canonical hash of a
//! reference collection, and sequenced hash-chain verification.
//!
//! All crypto operations wrap established libraries.

pub mod chain;
pub mod hasher;
pub mod merkle;
pub mod signer;

pub use chain::{ChainError, ChainLink, ChainVerifier};
pub use hasher::ContentHasher;
pub use merkle::MerkleTree;
pub use signer::{verify_with, Signature, SignatureError, SigningKey, VerifyingKey};
