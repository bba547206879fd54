use cxo_types::Digest;

/// Binary Merkle tree over a sequence of digests.
///
/// The root depends only on the leaves and their order. It is used as the
/// canonical hash of a reference collection, so that collections stored with
/// different internal node layouts still agree on one hash.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    root: Digest,
    leaf_count: usize,
    depth: usize,
}

impl MerkleTree {
    /// Build a Merkle tree from leaf digests.
    ///
    /// An empty list produces the zero root. A single leaf is its own root.
    /// An odd node at any level is paired with itself, so callers that need to
    /// tell `[a, b, c]` from `[a, b, c, c]` must mix the leaf count into
    /// whatever they derive from the root.
    pub fn from_leaves(leaves: &[Digest]) -> Self {
        if leaves.is_empty() {
            return Self {
                root: Digest::zero(),
                leaf_count: 0,
                depth: 0,
            };
        }

        let mut current = leaves.to_vec();
        let mut depth = 0;
        while current.len() > 1 {
            current = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [single] => hash_pair(single, single),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            depth += 1;
        }

        Self {
            root: current[0],
            leaf_count: leaves.len(),
            depth,
        }
    }

    /// The root hash of the tree.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Number of hashing levels above the leaves.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"cxo-merkle-v1:");
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest::from_hash(*hasher.finalize().as_bytes())
}
