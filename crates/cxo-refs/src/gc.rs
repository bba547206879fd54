use std::collections::HashSet;

use cxo_store::Tu;
use cxo_types::{Digest, PubKey};
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::RefResult;
use crate::root::Root;
use crate::walk::Visit;

/// Summary of one garbage collection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Entry points taken from feed heads.
    pub roots: usize,
    /// Digests found reachable and present.
    pub live: usize,
    pub objects_removed: usize,
    pub bytes_freed: u64,
    /// Reachable digests that were already absent.
    pub missing: usize,
    /// Feeds whose head root payload did not decode. They contribute no
    /// entry points.
    pub bad_heads: Vec<PubKey>,
}

/// Mark and sweep inside the caller's write transaction.
///
/// The roots are the references of every feed's head root. Everything
/// reachable from them is kept and every other object is deleted. A head
/// whose payload is not a root is skipped and listed in
/// [`GcReport::bad_heads`]. An object that fails to decode aborts the pass,
/// since its children cannot be known; the caller's transaction then
/// discards the partial sweep.
pub fn collect_garbage<T: Tu + ?Sized>(engine: &Engine, tu: &mut T) -> RefResult<GcReport> {
    let mut roots = Vec::new();
    let mut bad_heads = Vec::new();
    for pk in tu.feeds()? {
        let Some(head) = tu.head(&pk)? else {
            continue;
        };
        match Root::decode(&head.root) {
            Ok(root) => roots.extend(root.entry_points()),
            Err(e) => {
                warn!(feed = %pk, seq = head.seq, error = %e, "head root does not decode; feed skipped");
                bad_heads.push(pk);
            }
        }
    }

    let mut report = GcReport {
        roots: roots.len(),
        bad_heads,
        ..GcReport::default()
    };
    let mut live = HashSet::new();
    for visit in engine.walk(&*tu, roots) {
        match visit? {
            Visit::Missing { .. } => report.missing += 1,
            v => {
                live.insert(v.digest());
            }
        }
    }
    report.live = live.len();

    for digest in tu.digests()? {
        if live.contains(&digest) {
            continue;
        }
        let size = tu.get(&digest)?.map_or(0, |b| b.len() as u64);
        if tu.delete(&digest)? {
            debug!(digest = %digest.short_hex(), "collected");
            report.objects_removed += 1;
            report.bytes_freed += size;
        }
    }

    info!(
        roots = report.roots,
        live = report.live,
        removed = report.objects_removed,
        missing = report.missing,
        bad_heads = report.bad_heads.len(),
        "garbage collected"
    );
    Ok(report)
}

/// Digests reachable from `roots`, present or not.
pub fn reachable<T: cxo_store::Tv + ?Sized>(
    engine: &Engine,
    tv: &T,
    roots: impl IntoIterator<Item = (String, Digest)>,
) -> RefResult<HashSet<Digest>> {
    engine
        .walk(tv, roots)
        .map(|v| v.map(|v| v.digest()))
        .collect()
}
