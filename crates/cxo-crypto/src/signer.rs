//! Feed ownership keys.
//!
//! A feed is named by the public half of an Ed25519 key pair; only the
//! holder of the secret half can append root packs to it.

use std::fmt;

use cxo_types::PubKey;
use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Secret key of a feed owner.
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Public key checked against root pack signatures.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Detached Ed25519 signature. The all-zero value stands for "unsigned".
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; Signature::LEN]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature does not verify")]
    InvalidSignature,
    #[error("bytes are not an Ed25519 public key")]
    InvalidKey,
}

impl SigningKey {
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()))
    }

    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&secret))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Identifier of the feed this key owns.
    pub fn pub_key(&self) -> PubKey {
        self.verifying_key().to_pub_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message).to_bytes())
    }
}

impl VerifyingKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| SignatureError::InvalidKey)
    }

    pub fn from_pub_key(pk: &PubKey) -> Result<Self, SignatureError> {
        Self::from_bytes(*pk.as_bytes())
    }

    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn to_pub_key(&self) -> PubKey {
        PubKey::from_bytes(self.as_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        self.0
            .verify(message, &sig)
            .map_err(|_| SignatureError::InvalidSignature)
    }
}

impl Signature {
    pub const LEN: usize = 64;

    /// Wrap raw bytes. Nothing is checked until verification.
    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Placeholder carried by packs that have not been signed yet.
    pub fn empty() -> Self {
        Self([0; Self::LEN])
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

/// Check `signature` over `message` against a feed identifier.
pub fn verify_with(pk: &PubKey, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
    VerifyingKey::from_pub_key(pk)?.verify(message, signature)
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        let arr: [u8; Self::LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            serde::de::Error::custom(format!("signature is {} bytes, want 64", b.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey({})", hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Signature(unsigned)");
        }
        write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
    }
}
