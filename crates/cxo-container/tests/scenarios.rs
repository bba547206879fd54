use std::sync::{Arc, Once};

use cxo_container::{Container, ContainerConfig, ContainerError};
use cxo_crypto::SigningKey;
use cxo_refs::{Root, Visit};
use cxo_schema::{Dynamic, Kind, Record, Ref, Refs, Registry, Schema, SchemaError};
use cxo_store::{Database, DriveDb, MemoryDb, RootPack, StoreError};
use cxo_types::{Digest, ErrorKind};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

fn registry() -> Arc<Registry> {
    Arc::new(
        Registry::from_schemas([
            Schema::builder("cxo.User")
                .field("Name", Kind::String)
                .field("Age", Kind::U32)
                .skip_field("Session", Kind::String)
                .build(),
            Schema::builder("cxo.Group")
                .field("Name", Kind::String)
                .field("Leader", Kind::reference("cxo.User"))
                .field("Members", Kind::references("cxo.User"))
                .field("Curator", Kind::Dynamic)
                .build(),
        ])
        .unwrap(),
    )
}

fn user(name: &str, age: u32) -> Record {
    Record::new()
        .with("Name", name)
        .with("Age", age)
        .with("Session", "")
}

fn group(name: &str, members: &[(&str, u32)]) -> Record {
    Record::new()
        .with("Name", name)
        .with("Leader", Ref::pending(user("alice", 30)))
        .with(
            "Members",
            Refs::from_values(members.iter().map(|(n, a)| user(n, *a))),
        )
        .with("Curator", Dynamic::empty())
}

#[test]
fn save_user_adds_exactly_one_object() {
    init_tracing();
    let c = Container::new(MemoryDb::new(), registry()).unwrap();
    let before = c.stat().unwrap().objects;

    let mut alice = user("alice", 30);
    let digest = c.save("cxo.User", &mut alice).unwrap();

    assert_eq!(c.stat().unwrap().objects, before + 1);
    assert_eq!(c.load("cxo.User", &digest).unwrap(), alice);
}

#[test]
fn skip_fields_are_not_persisted() {
    let c = Container::new(MemoryDb::new(), registry()).unwrap();
    let mut a = user("alice", 30);
    a.set("Session", "token-1");
    let mut b = user("alice", 30);
    b.set("Session", "token-2");
    let da = c.save("cxo.User", &mut a).unwrap();
    let db = c.save("cxo.User", &mut b).unwrap();
    assert_eq!(da, db);

    let back = c.load("cxo.User", &da).unwrap();
    assert_eq!(back.get("Session").and_then(|v| v.as_str()), Some(""));
}

fn encoded_root(descriptor: &[u8]) -> Vec<u8> {
    Root::new(vec![])
        .with_descriptor(descriptor.to_vec())
        .encode()
        .unwrap()
}

#[test]
fn chain_rejects_stale_append() {
    init_tracing();
    let c = Container::new(MemoryDb::new(), registry()).unwrap();
    let key = SigningKey::generate();
    let pk = key.pub_key();
    c.add_feed(pk).unwrap();

    let p0 = RootPack::new(0, Digest::zero(), encoded_root(b"zero")).sign(&key);
    c.append(&pk, p0.clone()).unwrap();
    let p1 = RootPack::new(1, p0.hash, encoded_root(b"one")).sign(&key);
    c.append(&pk, p1).unwrap();

    let stale = RootPack::new(1, Digest::zero(), encoded_root(b"again")).sign(&key);
    let err = c.append(&pk, stale).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidChain);
    assert_eq!(c.chain(&pk).unwrap().len(), 2);
    assert_eq!(c.last_root(&pk).unwrap().unwrap().descriptor, b"one");
}

#[test]
fn foreign_signature_is_rejected() {
    let c = Container::new(MemoryDb::new(), registry()).unwrap();
    let owner = SigningKey::generate();
    let intruder = SigningKey::generate();
    c.add_feed(owner.pub_key()).unwrap();

    let forged = RootPack::genesis(encoded_root(b"root")).sign(&intruder);
    let err = c.append(&owner.pub_key(), forged).unwrap_err();
    assert!(matches!(
        err,
        ContainerError::Store(StoreError::InvalidSignature { seq: 0 })
    ));
    assert!(c.chain(&owner.pub_key()).unwrap().is_empty());
}

#[test]
fn opaque_head_does_not_block_collection() {
    init_tracing();
    let c = Container::new(MemoryDb::new(), registry()).unwrap();
    let good = SigningKey::generate();
    let rogue = SigningKey::generate();
    c.add_feed(good.pub_key()).unwrap();
    c.add_feed(rogue.pub_key()).unwrap();

    let mut root = Root::new(vec![Dynamic::pending("cxo.User", user("alice", 30))]);
    c.publish(&good, &mut root).unwrap();
    let mut orphan = user("orphan", 1);
    let orphan = c.save("cxo.User", &mut orphan).unwrap();

    // bypass the container's payload check, as a peer writing straight to
    // the database could
    c.db()
        .update(|tx| {
            tx.append(
                &rogue.pub_key(),
                RootPack::genesis(b"opaque".to_vec()).sign(&rogue),
            )
        })
        .unwrap();

    let report = c.collect_garbage().unwrap();
    assert_eq!(report.bad_heads, vec![rogue.pub_key()]);
    assert_eq!(report.objects_removed, 1);
    assert!(c.load("cxo.User", &orphan).is_err());
    let head = c.last_root(&good.pub_key()).unwrap().unwrap();
    assert!(c.resolve_dynamic(&head.refs[0]).unwrap().is_some());
    assert!(c.last_root(&rogue.pub_key()).is_err());
}

#[test]
fn publish_walk_and_collect() {
    init_tracing();
    let c = Container::with_config(
        MemoryDb::new(),
        registry(),
        ContainerConfig {
            refs_degree: 2,
            gc_on_publish: false,
        },
    )
    .unwrap();
    let key = SigningKey::generate();
    c.add_feed(key.pub_key()).unwrap();

    let mut v1 = Root::new(vec![Dynamic::pending(
        "cxo.Group",
        group("v1", &[("bob", 20), ("eve", 25)]),
    )])
    .with_descriptor(b"demo".to_vec());
    c.publish(&key, &mut v1).unwrap();

    let mut v2 = Root::new(vec![Dynamic::pending(
        "cxo.Group",
        group("v2", &[("bob", 20), ("carol", 41), ("dan", 52)]),
    )]);
    c.publish(&key, &mut v2).unwrap();
    assert_eq!(c.chain(&key.pub_key()).unwrap().len(), 2);

    let visits = c.walk_root(&key.pub_key()).unwrap();
    assert!(visits.iter().all(Visit::is_present));
    let nodes = visits
        .iter()
        .filter(|v| matches!(v, Visit::Node { .. }))
        .count();
    // three members at degree 2: two leaves under one branch
    assert_eq!(nodes, 3);

    let report = c.collect_garbage().unwrap();
    assert_eq!(report.live, visits.len());
    assert_eq!(c.stat().unwrap().objects, visits.len());
    // v1's group and eve were only reachable from the old head
    assert!(report.objects_removed >= 2);

    let head = c.last_root(&key.pub_key()).unwrap().unwrap();
    let g = c.resolve_dynamic(&head.refs[0]).unwrap().unwrap();
    assert_eq!(g.get("Name").and_then(|v| v.as_str()), Some("v2"));
    assert!(head.descriptor.is_empty());
}

#[test]
fn registry_is_frozen_after_first_load() {
    let reg = registry();
    let c = Container::new(MemoryDb::new(), Arc::clone(&reg)).unwrap();
    let mut alice = user("alice", 30);
    let d = c.save("cxo.User", &mut alice).unwrap();
    c.load("cxo.User", &d).unwrap();

    let err = reg
        .register(Schema::builder("late").field("X", Kind::U8).build())
        .unwrap_err();
    assert!(matches!(err, SchemaError::Frozen(_)));
    assert_eq!(err.kind(), ErrorKind::FrozenRegistry);
}

#[test]
fn durable_container_survives_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cxo.log");
    let key = SigningKey::generate();
    let digest;
    {
        let c = Container::new(DriveDb::open(&path).unwrap(), registry()).unwrap();
        c.add_feed(key.pub_key()).unwrap();
        let mut root = Root::new(vec![Dynamic::pending(
            "cxo.Group",
            group("team", &[("bob", 20)]),
        )]);
        c.publish(&key, &mut root).unwrap();
        digest = root.refs[0].digest();
        c.close().unwrap();
    }

    let c = Container::new(DriveDb::open(&path).unwrap(), registry()).unwrap();
    let head = c.last_root(&key.pub_key()).unwrap().unwrap();
    assert_eq!(head.refs[0].digest(), digest);
    let g = c.load("cxo.Group", &digest).unwrap();
    assert_eq!(g.get("Name").and_then(|v| v.as_str()), Some("team"));
}

#[test]
fn close_is_idempotent_and_final() {
    let c = Container::new(MemoryDb::new(), registry()).unwrap();
    c.close().unwrap();
    c.close().unwrap();
    assert!(c.is_closed());
    assert!(c.db().is_closed());

    let mut alice = user("alice", 30);
    let err = c.save("cxo.User", &mut alice).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyClosed);
}
