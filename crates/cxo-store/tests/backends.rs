//! Behaviour every backend must share, run against both.

use cxo_crypto::{ChainError, SigningKey};
use cxo_store::{Database, DriveDb, MemoryDb, RootPack, StoreError};
use cxo_types::{Digest, ErrorKind};

fn with_backends(test: impl Fn(&dyn Fn() -> Box<dyn Runner>)) {
    test(&|| Box::new(MemoryDb::new()));
    let dir = tempfile::tempdir().unwrap();
    let counter = std::cell::Cell::new(0u32);
    test(&|| {
        counter.set(counter.get() + 1);
        let path = dir.path().join(format!("db-{}.log", counter.get()));
        Box::new(DriveDb::open(path).unwrap())
    });
}

/// Object-safe wrapper so one test body drives both backends.
trait Runner {
    fn set(&self, data: &[u8]) -> Result<Digest, StoreError>;
    fn get(&self, d: &Digest) -> Result<Option<Vec<u8>>, StoreError>;
    fn append(&self, sk: &SigningKey, pack: RootPack) -> Result<(), StoreError>;
    fn chain_len(&self, sk: &SigningKey) -> Result<usize, StoreError>;
    fn set_then_fail(&self, data: &[u8]) -> Result<(), StoreError>;
    fn objects(&self) -> usize;
}

impl<D: Database> Runner for D {
    fn set(&self, data: &[u8]) -> Result<Digest, StoreError> {
        self.update(|tx| tx.set(data))
    }

    fn get(&self, d: &Digest) -> Result<Option<Vec<u8>>, StoreError> {
        self.view(|tx| tx.get(d))
    }

    fn append(&self, sk: &SigningKey, pack: RootPack) -> Result<(), StoreError> {
        let pk = sk.pub_key();
        self.update(|tx| {
            tx.add_feed(pk)?;
            tx.append(&pk, pack)
        })
    }

    fn chain_len(&self, sk: &SigningKey) -> Result<usize, StoreError> {
        self.view(|tx| Ok(tx.chain(&sk.pub_key())?.len()))
    }

    fn set_then_fail(&self, data: &[u8]) -> Result<(), StoreError> {
        self.update(|tx| {
            tx.set(data)?;
            Err(StoreError::Serialization("rollback".into()))
        })
    }

    fn objects(&self) -> usize {
        self.stat().unwrap().objects
    }
}

#[test]
fn content_addressing_is_deterministic() {
    with_backends(|open| {
        let db = open();
        let a = db.set(b"alpha").unwrap();
        let b = db.set(b"alpha").unwrap();
        assert_eq!(a, b);
        assert_eq!(db.objects(), 1);
        assert_eq!(db.get(&a).unwrap().as_deref(), Some(&b"alpha"[..]));
    });
}

#[test]
fn digests_agree_across_backends() {
    with_backends(|open| {
        let db = open();
        let expected = cxo_crypto::ContentHasher::OBJECT.hash(b"shared");
        assert_eq!(db.set(b"shared").unwrap(), expected);
    });
}

#[test]
fn rollback_leaves_no_trace() {
    with_backends(|open| {
        let db = open();
        assert!(db.set_then_fail(b"gone").is_err());
        assert_eq!(db.objects(), 0);
    });
}

#[test]
fn chain_rejects_bad_link_and_keeps_length() {
    with_backends(|open| {
        let db = open();
        let sk = SigningKey::generate();
        let p0 = RootPack::genesis(b"0".to_vec()).sign(&sk);
        let p1 = RootPack::following(Some(&p0), b"1".to_vec()).sign(&sk);
        db.append(&sk, p0).unwrap();
        db.append(&sk, p1).unwrap();

        // wrong seq
        let stale = RootPack::new(1, Digest::zero(), b"x".to_vec()).sign(&sk);
        let err = db.append(&sk, stale).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidChain);
        assert!(matches!(
            err,
            StoreError::InvalidChain(ChainError::SeqMismatch { expected: 2, actual: 1 })
        ));

        // right seq, wrong prev
        let unlinked = RootPack::new(2, Digest::zero(), b"x".to_vec()).sign(&sk);
        let err = db.append(&sk, unlinked).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidChain);

        assert_eq!(db.chain_len(&sk).unwrap(), 2);
    });
}

#[test]
fn unsigned_pack_is_rejected() {
    with_backends(|open| {
        let db = open();
        let sk = SigningKey::generate();
        let err = db.append(&sk, RootPack::genesis(vec![1])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidChain);
        // the failed transaction also discarded add_feed
        assert!(matches!(
            db.chain_len(&sk),
            Err(StoreError::FeedNotFound(_))
        ));
    });
}
