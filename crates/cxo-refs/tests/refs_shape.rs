use std::sync::Arc;

use cxo_refs::{tree, Engine};
use cxo_schema::{Kind, Record, Refs, Registry, Schema, Value};
use cxo_store::{Database, MemoryDb};
use cxo_types::Digest;
use proptest::prelude::*;

fn digests(seeds: &[u16]) -> Vec<Digest> {
    seeds.iter().map(|s| Digest::of(&s.to_le_bytes())).collect()
}

proptest! {
    #[test]
    fn canonical_hash_ignores_degree(
        seeds in proptest::collection::vec(any::<u16>(), 1..80),
        a in 2usize..9,
        b in 2usize..9,
    ) {
        let ds = digests(&seeds);
        let db = MemoryDb::new();
        let (ra, rb) = db
            .update(|tx| {
                Ok::<_, cxo_refs::RefError>((tree::build(tx, a, &ds)?, tree::build(tx, b, &ds)?))
            })
            .unwrap();
        let (ha, hb) = db
            .view(|tx| {
                Ok::<_, cxo_refs::RefError>((
                    tree::load_node(tx, &ra)?.hash,
                    tree::load_node(tx, &rb)?.hash,
                ))
            })
            .unwrap();
        prop_assert_eq!(ha, hb);
        prop_assert_eq!(ha, tree::canonical_hash(&ds));
        prop_assert_eq!(db.view(|tx| tree::elements(tx, &rb)).unwrap(), ds);
    }

    #[test]
    fn paging_agrees_with_full_load(
        n in 1usize..120,
        degree in 2usize..6,
        start in 0u64..130,
        count in 0u64..40,
    ) {
        let seeds: Vec<u16> = (0..n as u16).collect();
        let ds = digests(&seeds);
        let db = MemoryDb::new();
        let root = db.update(|tx| tree::build(tx, degree, &ds)).unwrap();

        let page = db.view(|tx| tree::range(tx, &root, start, count)).unwrap();
        let from = (start as usize).min(n);
        let to = ((start + count) as usize).min(n);
        prop_assert_eq!(page, ds[from..to].to_vec());
        if (start as usize) < n {
            prop_assert_eq!(db.view(|tx| tree::get(tx, &root, start)).unwrap(), ds[start as usize]);
        }
    }
}

#[test]
fn same_members_same_hash_across_engines() {
    let reg = Arc::new(
        Registry::from_schemas([
            Schema::builder("item").field("N", Kind::U32).build(),
            Schema::builder("bag")
                .field("Items", Kind::references("item"))
                .build(),
        ])
        .unwrap(),
    );
    let narrow = Engine::new(Arc::clone(&reg), 2).unwrap();
    let wide = Engine::new(reg, 16).unwrap();
    let db = MemoryDb::new();

    let bag = || {
        Record::new().with(
            "Items",
            Refs::from_values((0..33u32).map(|n| Record::new().with("N", n))),
        )
    };
    let mut a = bag();
    let mut b = bag();
    let (da, db_) = db
        .update(|tx| {
            Ok::<_, cxo_refs::RefError>((
                narrow.save(tx, "bag", &mut a)?,
                wide.save(tx, "bag", &mut b)?,
            ))
        })
        .unwrap();
    // the stored trees differ, so the bag objects differ too
    assert_ne!(da, db_);

    let ra = a.get("Items").and_then(Value::as_refs).unwrap();
    let rb = b.get("Items").and_then(Value::as_refs).unwrap();
    assert_ne!(ra.root(), rb.root());
    let (ha, hb) = db
        .view(|tx| {
            Ok::<_, cxo_refs::RefError>((narrow.refs_hash(tx, ra)?, wide.refs_hash(tx, rb)?))
        })
        .unwrap();
    assert_eq!(ha, hb);
}
