//! Stored form of a `Refs` collection.
//!
//! Element digests are packed left to right into leaves of at most `degree`
//! digests; leaves are grouped the same way into branches until one node
//! remains. Every node except the last at each level is full, so the child
//! holding element `i` can be computed without loading its siblings.
//!
//! Each node also records the canonical hash of the elements beneath it.
//! That hash depends only on the element digests and their count, never on
//! the degree, so two trees over the same sequence agree on it.

use cxo_crypto::{ContentHasher, MerkleTree};
use cxo_store::{Tu, Tv};
use cxo_types::Digest;
use serde::{Deserialize, Serialize};

use crate::error::{RefError, RefResult};

/// One node of a stored Refs tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefsNode {
    /// Maximum number of items per node.
    pub degree: u32,
    /// 0 for leaves; a branch's children sit at `depth - 1`.
    pub depth: u32,
    /// Number of elements beneath this node.
    pub length: u64,
    /// Canonical hash of those elements.
    pub hash: Digest,
    /// Element digests in a leaf, child node digests in a branch.
    pub items: Vec<Digest>,
}

impl RefsNode {
    pub fn is_leaf(&self) -> bool {
        self.depth == 0
    }

    /// Number of elements a full child of this branch holds.
    fn child_capacity(&self) -> u64 {
        (self.degree as u64)
            .checked_pow(self.depth)
            .unwrap_or(u64::MAX)
    }
}

/// Canonical hash of an element sequence: the Merkle root of the digests,
/// mixed with their count.
pub fn canonical_hash(digests: &[Digest]) -> Digest {
    let root = MerkleTree::from_leaves(digests).root();
    ContentHasher::REFS.hash_parts(&[&(digests.len() as u64).to_le_bytes(), root.as_bytes()])
}

/// Store a tree over `digests` and return the root node's digest (zero for
/// an empty sequence).
pub fn build<T: Tu + ?Sized>(tu: &mut T, degree: usize, digests: &[Digest]) -> RefResult<Digest> {
    if degree < 2 {
        return Err(RefError::InvalidDegree(degree));
    }
    if digests.is_empty() {
        return Ok(Digest::zero());
    }

    // (node digest, first element, element count)
    let mut level: Vec<(Digest, usize, usize)> = Vec::new();
    for (i, chunk) in digests.chunks(degree).enumerate() {
        let node = RefsNode {
            degree: degree as u32,
            depth: 0,
            length: chunk.len() as u64,
            hash: canonical_hash(chunk),
            items: chunk.to_vec(),
        };
        level.push((store(tu, &node)?, i * degree, chunk.len()));
    }

    let mut depth = 0;
    while level.len() > 1 {
        depth += 1;
        let mut next = Vec::with_capacity(level.len().div_ceil(degree));
        for group in level.chunks(degree) {
            let start = group[0].1;
            let len: usize = group.iter().map(|(_, _, n)| n).sum();
            let node = RefsNode {
                degree: degree as u32,
                depth,
                length: len as u64,
                hash: canonical_hash(&digests[start..start + len]),
                items: group.iter().map(|(d, _, _)| *d).collect(),
            };
            next.push((store(tu, &node)?, start, len));
        }
        level = next;
    }
    Ok(level[0].0)
}

fn store<T: Tu + ?Sized>(tu: &mut T, node: &RefsNode) -> RefResult<Digest> {
    let bytes = bincode::serialize(node).map_err(|e| RefError::CorruptNode {
        digest: Digest::zero(),
        reason: e.to_string(),
    })?;
    Ok(tu.set(&bytes)?)
}

/// Load and check one node.
pub fn load_node<T: Tv + ?Sized>(tv: &T, digest: &Digest) -> RefResult<RefsNode> {
    let bytes = tv.get(digest)?.ok_or_else(|| RefError::Missing {
        digest: *digest,
        expected: "refs node".into(),
    })?;
    decode_node(digest, &bytes)
}

pub(crate) fn decode_node(digest: &Digest, bytes: &[u8]) -> RefResult<RefsNode> {
    let corrupt = |reason: String| RefError::CorruptNode {
        digest: *digest,
        reason,
    };
    let node: RefsNode = bincode::deserialize(bytes).map_err(|e| corrupt(e.to_string()))?;
    if node.degree < 2 {
        return Err(corrupt(format!("degree {}", node.degree)));
    }
    if node.items.is_empty() || node.items.len() > node.degree as usize {
        return Err(corrupt(format!(
            "{} items for degree {}",
            node.items.len(),
            node.degree
        )));
    }
    if node.is_leaf() && node.length != node.items.len() as u64 {
        return Err(corrupt(format!(
            "leaf length {} but {} items",
            node.length,
            node.items.len()
        )));
    }
    Ok(node)
}

/// Every element digest under `root`, in order.
pub fn elements<T: Tv + ?Sized>(tv: &T, root: &Digest) -> RefResult<Vec<Digest>> {
    let mut out = Vec::new();
    if !root.is_zero() {
        collect(tv, root, &mut out)?;
    }
    Ok(out)
}

fn collect<T: Tv + ?Sized>(tv: &T, digest: &Digest, out: &mut Vec<Digest>) -> RefResult<()> {
    let node = load_node(tv, digest)?;
    if node.is_leaf() {
        out.extend_from_slice(&node.items);
    } else {
        for child in &node.items {
            collect(tv, child, out)?;
        }
    }
    Ok(())
}

/// Number of elements under `root`.
pub fn len<T: Tv + ?Sized>(tv: &T, root: &Digest) -> RefResult<u64> {
    if root.is_zero() {
        return Ok(0);
    }
    Ok(load_node(tv, root)?.length)
}

/// Element at `index`, loading one node per level.
pub fn get<T: Tv + ?Sized>(tv: &T, root: &Digest, index: u64) -> RefResult<Digest> {
    let out_of_range = |len| RefError::IndexOutOfRange { index, len };
    if root.is_zero() {
        return Err(out_of_range(0));
    }
    let mut node = load_node(tv, root)?;
    if index >= node.length {
        return Err(out_of_range(node.length));
    }

    let mut offset = index;
    loop {
        if node.is_leaf() {
            return node
                .items
                .get(offset as usize)
                .copied()
                .ok_or_else(|| out_of_range(node.length));
        }
        let cap = node.child_capacity();
        let child = node
            .items
            .get((offset / cap) as usize)
            .copied()
            .ok_or_else(|| out_of_range(node.length))?;
        offset %= cap;
        node = load_node(tv, &child)?;
    }
}

/// Up to `count` elements starting at `start`, loading only the nodes that
/// overlap the range.
pub fn range<T: Tv + ?Sized>(
    tv: &T,
    root: &Digest,
    start: u64,
    count: u64,
) -> RefResult<Vec<Digest>> {
    let mut out = Vec::new();
    if root.is_zero() || count == 0 {
        return Ok(out);
    }
    let end = start.saturating_add(count);
    collect_range(tv, root, 0, start, end, &mut out)?;
    Ok(out)
}

fn collect_range<T: Tv + ?Sized>(
    tv: &T,
    digest: &Digest,
    offset: u64,
    start: u64,
    end: u64,
    out: &mut Vec<Digest>,
) -> RefResult<()> {
    let node = load_node(tv, digest)?;
    if node.is_leaf() {
        for (i, d) in node.items.iter().enumerate() {
            let pos = offset + i as u64;
            if pos >= start && pos < end {
                out.push(*d);
            }
        }
        return Ok(());
    }
    let cap = node.child_capacity();
    for (i, child) in node.items.iter().enumerate() {
        let child_start = offset.saturating_add((i as u64).saturating_mul(cap));
        let child_end = child_start.saturating_add(cap);
        if child_end <= start || child_start >= end {
            continue;
        }
        collect_range(tv, child, child_start, start, end, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxo_store::{Database, MemoryDb};

    fn digests(n: usize) -> Vec<Digest> {
        (0..n).map(|i| Digest::of(&(i as u64).to_le_bytes())).collect()
    }

    fn stored(db: &MemoryDb, degree: usize, ds: &[Digest]) -> Digest {
        db.update(|tx| build(tx, degree, ds)).unwrap()
    }

    #[test]
    fn empty_sequence_has_no_node() {
        let db = MemoryDb::new();
        assert!(stored(&db, 4, &[]).is_zero());
        assert_eq!(db.stat().unwrap().objects, 0);
        assert_eq!(db.view(|tx| len(tx, &Digest::zero())).unwrap(), 0);
    }

    #[test]
    fn single_leaf() {
        let db = MemoryDb::new();
        let ds = digests(3);
        let root = stored(&db, 4, &ds);
        let node = db.view(|tx| load_node(tx, &root)).unwrap();
        assert!(node.is_leaf());
        assert_eq!(node.items, ds);
        assert_eq!(node.hash, canonical_hash(&ds));
    }

    #[test]
    fn multi_level_tree_shape() {
        let db = MemoryDb::new();
        let ds = digests(10);
        let root = stored(&db, 3, &ds);
        let node = db.view(|tx| load_node(tx, &root)).unwrap();
        // 10 elements at degree 3: 4 leaves, 2 branches, 1 root
        assert_eq!(node.depth, 2);
        assert_eq!(node.length, 10);
        assert_eq!(db.stat().unwrap().objects, 7);
        assert_eq!(db.view(|tx| elements(tx, &root)).unwrap(), ds);
    }

    #[test]
    fn get_every_index() {
        let db = MemoryDb::new();
        let ds = digests(29);
        let root = stored(&db, 3, &ds);
        for (i, d) in ds.iter().enumerate() {
            assert_eq!(db.view(|tx| get(tx, &root, i as u64)).unwrap(), *d);
        }
        let err = db.view(|tx| get(tx, &root, 29)).unwrap_err();
        assert!(matches!(err, RefError::IndexOutOfRange { index: 29, len: 29 }));
    }

    #[test]
    fn range_pages() {
        let db = MemoryDb::new();
        let ds = digests(50);
        let root = stored(&db, 4, &ds);
        assert_eq!(db.view(|tx| range(tx, &root, 10, 7)).unwrap(), ds[10..17]);
        assert_eq!(db.view(|tx| range(tx, &root, 45, 100)).unwrap(), ds[45..]);
        assert!(db.view(|tx| range(tx, &root, 60, 5)).unwrap().is_empty());
        assert_eq!(db.view(|tx| len(tx, &root)).unwrap(), 50);
    }

    #[test]
    fn degree_below_two_is_rejected() {
        let db = MemoryDb::new();
        let err = db.update(|tx| build(tx, 1, &digests(3))).unwrap_err();
        assert!(matches!(err, RefError::InvalidDegree(1)));
    }

    #[test]
    fn corrupt_node_is_reported() {
        let db = MemoryDb::new();
        let bogus = db.update(|tx| tx.set(b"not a node")).unwrap();
        let err = db.view(|tx| load_node(tx, &bogus)).unwrap_err();
        assert!(matches!(err, RefError::CorruptNode { .. }));
    }

    #[test]
    fn count_is_part_of_canonical_hash() {
        let a = Digest::of(b"a");
        let b = Digest::of(b"b");
        let c = Digest::of(b"c");
        // the Merkle root alone cannot tell these apart
        assert_ne!(canonical_hash(&[a, b, c]), canonical_hash(&[a, b, c, c]));
        assert_ne!(canonical_hash(&[a, b]), canonical_hash(&[b, a]));
    }
}
