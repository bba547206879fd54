use cxo_crypto::{verify_with, ChainLink, ChainVerifier, ContentHasher, Signature, SigningKey};
use cxo_types::{Digest, PubKey};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// One signed, sequenced snapshot entry in a feed's chain.
///
/// Wire layout (little-endian):
/// ```text
/// [8 bytes: seq]
/// [32 bytes: prev]
/// [32 bytes: hash]
/// [4 bytes: root length][N bytes: root]
/// [64 bytes: sig over seq ‖ prev ‖ hash]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootPack {
    /// Position in the feed, starting at 0.
    pub seq: u64,
    /// `hash` of the preceding pack; zero for `seq == 0`.
    pub prev: Digest,
    /// Digest of `root`.
    pub hash: Digest,
    /// Opaque root payload.
    pub root: Vec<u8>,
    /// Feed owner's signature over `seq ‖ prev ‖ hash`.
    pub sig: Signature,
}

const SIGNED_LEN: usize = 8 + Digest::LEN * 2;
const FIXED_LEN: usize = SIGNED_LEN + 4 + Signature::LEN;

impl RootPack {
    /// Build the first pack of a feed (unsigned).
    pub fn genesis(root: Vec<u8>) -> Self {
        Self::new(0, Digest::zero(), root)
    }

    /// Build an unsigned pack; `hash` is computed from `root`.
    pub fn new(seq: u64, prev: Digest, root: Vec<u8>) -> Self {
        let hash = Self::hash_root(&root);
        Self {
            seq,
            prev,
            hash,
            root,
            sig: Signature::empty(),
        }
    }

    /// Build the unsigned pack that directly follows `head` (or the genesis
    /// pack when the feed is empty).
    pub fn following(head: Option<&RootPack>, root: Vec<u8>) -> Self {
        match head {
            Some(h) => Self::new(h.seq + 1, h.hash, root),
            None => Self::genesis(root),
        }
    }

    /// Digest of a root payload.
    pub fn hash_root(root: &[u8]) -> Digest {
        ContentHasher::ROOT.hash(root)
    }

    /// Sign the pack with the feed owner's key.
    pub fn sign(mut self, key: &SigningKey) -> Self {
        self.sig = key.sign(&self.signed_message());
        self
    }

    /// Bytes covered by the signature: `seq ‖ prev ‖ hash`.
    pub fn signed_message(&self) -> [u8; SIGNED_LEN] {
        let mut msg = [0u8; SIGNED_LEN];
        msg[..8].copy_from_slice(&self.seq.to_le_bytes());
        msg[8..40].copy_from_slice(self.prev.as_bytes());
        msg[40..].copy_from_slice(self.hash.as_bytes());
        msg
    }

    /// Check the signature against the feed key.
    pub fn verify_signature(&self, pk: &PubKey) -> StoreResult<()> {
        verify_with(pk, &self.signed_message(), &self.sig)
            .map_err(|_| StoreError::InvalidSignature { seq: self.seq })
    }

    /// Check that this pack may be appended to a feed whose current head is
    /// `head`: sequence, link, payload hash, then signature.
    pub fn verify_append(&self, pk: &PubKey, head: Option<&RootPack>) -> StoreResult<()> {
        ChainVerifier::verify_next(head, self)?;
        self.verify_signature(pk)
    }

    /// Encode to the wire layout. Fails if the root payload is too long for
    /// its 4-byte length prefix.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let prefix = root_len_prefix(self.root.len())?;
        let mut buf = Vec::with_capacity(FIXED_LEN + self.root.len());
        buf.extend_from_slice(&self.signed_message());
        buf.extend_from_slice(&prefix);
        buf.extend_from_slice(&self.root);
        buf.extend_from_slice(&self.sig.to_bytes());
        Ok(buf)
    }

    /// Decode from the wire layout. The whole buffer must be consumed.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        if data.len() < FIXED_LEN {
            return Err(StoreError::MalformedPack(format!(
                "too short: {} bytes, need at least {FIXED_LEN}",
                data.len()
            )));
        }
        let seq = u64::from_le_bytes(read_array(&data[0..8]));
        let prev = Digest::from_hash(read_array(&data[8..40]));
        let hash = Digest::from_hash(read_array(&data[40..72]));
        let root_len = u32::from_le_bytes(read_array(&data[72..76])) as usize;
        if data.len() != FIXED_LEN + root_len {
            return Err(StoreError::MalformedPack(format!(
                "length mismatch: root is {root_len} bytes but buffer is {}",
                data.len()
            )));
        }
        let root = data[76..76 + root_len].to_vec();
        let sig = Signature::from_bytes(read_array(&data[76 + root_len..]));
        Ok(Self {
            seq,
            prev,
            hash,
            root,
            sig,
        })
    }
}

fn root_len_prefix(len: usize) -> StoreResult<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| StoreError::MalformedPack(format!("root is {len} bytes, limit is {}", u32::MAX)))
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut arr = [0u8; N];
    arr.copy_from_slice(bytes);
    arr
}

impl ChainLink for RootPack {
    fn seq(&self) -> u64 {
        self.seq
    }
    fn prev(&self) -> Digest {
        self.prev
    }
    fn hash(&self) -> Digest {
        self.hash
    }
    fn payload_hash(&self) -> Digest {
        Self::hash_root(&self.root)
    }
}
