use cxo_types::Digest;

/// An entry of a sequenced hash chain (a feed's root packs).
pub trait ChainLink {
    /// Position in the chain, starting at 0.
    fn seq(&self) -> u64;
    /// Hash of the previous link (zero for the first link).
    fn prev(&self) -> Digest;
    /// The hash this link claims for its payload.
    fn hash(&self) -> Digest;
    /// The hash recomputed from the payload.
    fn payload_hash(&self) -> Digest;
}

/// Hash chain integrity verifier.
///
/// A valid chain starts at `seq == 0` with a zero `prev`, increments `seq`
/// by exactly one per link, links each `prev` to the preceding `hash`, and
/// every link's `hash` matches its payload.
pub struct ChainVerifier;

impl ChainVerifier {
    /// Check that `next` may directly follow `head` (`None` for an empty chain).
    pub fn verify_next(head: Option<&impl ChainLink>, next: &impl ChainLink) -> Result<(), ChainError> {
        let (expected_seq, expected_prev) = match head {
            Some(h) => (h.seq() + 1, h.hash()),
            None => (0, Digest::zero()),
        };

        if next.seq() != expected_seq {
            return Err(ChainError::SeqMismatch {
                expected: expected_seq,
                actual: next.seq(),
            });
        }
        if next.prev() != expected_prev {
            return Err(if head.is_none() {
                ChainError::GenesisHasPrev
            } else {
                ChainError::BrokenLink { seq: next.seq() }
            });
        }
        if next.payload_hash() != next.hash() {
            return Err(ChainError::HashMismatch { seq: next.seq() });
        }
        Ok(())
    }

    /// Verify a whole chain from its first link.
    pub fn verify_chain<L: ChainLink>(links: &[L]) -> Result<(), ChainError> {
        let mut head: Option<&L> = None;
        for link in links {
            Self::verify_next(head, link)?;
            head = Some(link);
        }
        Ok(())
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first link has a non-zero prev hash")]
    GenesisHasPrev,

    #[error("sequence mismatch: expected {expected}, got {actual}")]
    SeqMismatch { expected: u64, actual: u64 },

    #[error("broken link at seq {seq}: prev does not match the preceding hash")]
    BrokenLink { seq: u64 },

    #[error("hash mismatch at seq {seq}: payload does not hash to the claimed hash")]
    HashMismatch { seq: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestLink {
        seq: u64,
        prev: Digest,
        hash: Digest,
        payload: Vec<u8>,
    }

    impl ChainLink for TestLink {
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
            Digest::of(&self.payload)
        }
    }

    fn build_chain(count: u64) -> Vec<TestLink> {
        let mut chain = Vec::new();
        let mut prev = Digest::zero();
        for seq in 0..count {
            let payload = format!("root-{seq}").into_bytes();
            let hash = Digest::of(&payload);
            chain.push(TestLink {
                seq,
                prev,
                hash,
                payload,
            });
            prev = hash;
        }
        chain
    }

    #[test]
    fn empty_chain_is_valid() {
        assert!(ChainVerifier::verify_chain::<TestLink>(&[]).is_ok());
    }

    #[test]
    fn multi_link_chain() {
        assert!(ChainVerifier::verify_chain(&build_chain(10)).is_ok());
    }

    #[test]
    fn genesis_with_prev_fails() {
        let mut chain = build_chain(1);
        chain[0].prev = Digest::of(b"any");
        assert_eq!(
            ChainVerifier::verify_chain(&chain).unwrap_err(),
            ChainError::GenesisHasPrev
        );
    }

    #[test]
    fn genesis_must_be_seq_zero() {
        let mut chain = build_chain(1);
        chain[0].seq = 1;
        assert_eq!(
            ChainVerifier::verify_chain(&chain).unwrap_err(),
            ChainError::SeqMismatch {
                expected: 0,
                actual: 1
            }
        );
    }

    #[test]
    fn broken_link_detected() {
        let mut chain = build_chain(3);
        chain[2].prev = Digest::zero();
        assert_eq!(
            ChainVerifier::verify_chain(&chain).unwrap_err(),
            ChainError::BrokenLink { seq: 2 }
        );
    }

    #[test]
    fn skipped_seq_detected() {
        let chain = build_chain(3);
        assert_eq!(
            ChainVerifier::verify_next(Some(&chain[0]), &chain[2]).unwrap_err(),
            ChainError::SeqMismatch {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn tampered_payload_detected() {
        let mut chain = build_chain(3);
        chain[1].payload = b"tampered".to_vec();
        assert_eq!(
            ChainVerifier::verify_chain(&chain).unwrap_err(),
            ChainError::HashMismatch { seq: 1 }
        );
    }
}
