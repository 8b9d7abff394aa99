//! # Chain Graph Store
//!
//! Persists headers keyed by hash and derives their place in the chain.
//!
//! ## Key layout
//!
//! ```text
//! hdr/<hash>                 -> bincode HeaderRecord (raw bytes + linkage)
//! hgt/<height u64 BE><hash>  -> empty   (root and linked headers only)
//! flt/<hash>                 -> empty   (floating headers only)
//! ```
//!
//! Big-endian heights keep the height index ordered under prefix scans.
//! The highest and heaviest tip sets live in memory: they are rebuilt by
//! one scan at open and then only ever grow, because linkage never
//! lowers a height or a work total.
//!
//! ## Failure semantics
//!
//! `store`, `batch_store` and the queries swallow errors: storage failures
//! are logged and become `false` or an empty result. The `try_*` variants
//! return the cause.

use num_bigint::BigUint;
use num_traits::Zero;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::algorithms::{check_work, header_work, parse_header};
use crate::domain::{
    child_linkage, invariant_linked_to_parent, BlockHash, Header, HeaderInput, HeaderLinkage,
    HeaderSyncError, StoredHeader,
};
use crate::ports::outbound::{BatchOperation, KeyValueStore};

const HEADER_PREFIX: &[u8] = b"hdr/";
const HEIGHT_PREFIX: &[u8] = b"hgt/";
const FLOATING_PREFIX: &[u8] = b"flt/";

/// Store handle shared between sync tasks.
///
/// Every operation is a synchronous critical section; never hold the lock
/// across an await.
pub type SharedChainStore<K> = Arc<Mutex<ChainGraphStore<K>>>;

/// What is persisted under `hdr/<hash>`.
#[derive(Serialize, Deserialize)]
struct HeaderRecord {
    raw: Vec<u8>,
    linkage: HeaderLinkage,
}

fn header_key(hash: &BlockHash) -> Vec<u8> {
    [HEADER_PREFIX, &hash.as_wire_bytes()[..]].concat()
}

fn height_prefix(height: u64) -> Vec<u8> {
    [HEIGHT_PREFIX, &height.to_be_bytes()[..]].concat()
}

fn height_key(height: u64, hash: &BlockHash) -> Vec<u8> {
    [&height_prefix(height)[..], &hash.as_wire_bytes()[..]].concat()
}

fn floating_key(hash: &BlockHash) -> Vec<u8> {
    [FLOATING_PREFIX, &hash.as_wire_bytes()[..]].concat()
}

/// Hash stored as the last 32 bytes of an index key.
fn hash_suffix(key: &[u8]) -> Result<BlockHash, HeaderSyncError> {
    let start = key.len().checked_sub(32).ok_or_else(|| {
        HeaderSyncError::Serialization(format!("index key too short: {} bytes", key.len()))
    })?;
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&key[start..]);
    Ok(BlockHash::from_wire_bytes(bytes))
}

fn decode_record(bytes: &[u8]) -> Result<HeaderRecord, HeaderSyncError> {
    Ok(bincode::deserialize(bytes)?)
}

fn decode_stored(bytes: &[u8]) -> Result<StoredHeader, HeaderSyncError> {
    let record = decode_record(bytes)?;
    let header = parse_header(&record.raw)
        .map_err(|e| HeaderSyncError::Serialization(format!("stored header unreadable: {}", e)))?;
    Ok(StoredHeader {
        header,
        linkage: record.linkage,
    })
}

/// Log a swallowed error and fall back to the empty result.
fn or_log<T: Default>(result: Result<T, HeaderSyncError>, op: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e @ (HeaderSyncError::Storage(_) | HeaderSyncError::Serialization(_))) => {
            warn!("[zeta-store] {} failed: {}", op, e);
            T::default()
        }
        Err(e) => {
            debug!("[zeta-store] {} rejected: {}", op, e);
            T::default()
        }
    }
}

/// Highest and heaviest header sets.
#[derive(Debug, Default)]
struct TipSummary {
    highest: Option<(u64, Vec<BlockHash>)>,
    heaviest: Option<(BigUint, Vec<BlockHash>)>,
}

impl TipSummary {
    fn observe(&mut self, hash: BlockHash, linkage: &HeaderLinkage) {
        let Some(height) = linkage.height() else {
            return;
        };
        let work = linkage.accumulated_work();

        match &mut self.highest {
            Some((best, hashes)) if height == *best => {
                if !hashes.contains(&hash) {
                    hashes.push(hash);
                }
            }
            Some((best, _)) if height < *best => {}
            _ => self.highest = Some((height, vec![hash])),
        }

        match &mut self.heaviest {
            Some((best, hashes)) if work == *best => {
                if !hashes.contains(&hash) {
                    hashes.push(hash);
                }
            }
            Some((best, _)) if work < *best => {}
            _ => self.heaviest = Some((work, vec![hash])),
        }
    }
}

/// Writes staged for one atomic commit.
#[derive(Default)]
struct Pending {
    ops: Vec<BatchOperation>,
    written: Vec<(StoredHeader, bool)>,
    overlay: HashMap<BlockHash, HeaderLinkage>,
}

/// Chain graph over a key-value store.
pub struct ChainGraphStore<K: KeyValueStore> {
    kv: K,
    tips: TipSummary,
    count: usize,
}

impl<K: KeyValueStore> ChainGraphStore<K> {
    /// Open over `kv`, rebuilding the tip summary with one scan.
    pub fn open(kv: K) -> Result<Self, HeaderSyncError> {
        let mut tips = TipSummary::default();
        let mut count = 0;
        for (key, value) in kv.prefix_scan(HEADER_PREFIX)? {
            let record = decode_record(&value)?;
            tips.observe(hash_suffix(&key)?, &record.linkage);
            count += 1;
        }
        info!("[zeta-store] Opened chain store with {} headers", count);
        Ok(Self { kv, tips, count })
    }

    /// Wrap in the shared handle used by the sync tasks.
    pub fn into_shared(self) -> SharedChainStore<K> {
        Arc::new(Mutex::new(self))
    }

    /// Number of stored headers.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Is the store empty?
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Underlying key-value store.
    pub fn kv(&self) -> &K {
        &self.kv
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Store one header. `false` if malformed, failing proof-of-work, a
    /// conflicting root, or on storage failure.
    pub fn store(&mut self, input: impl Into<HeaderInput>) -> bool {
        self.try_store(input)
            .map(|_| true)
            .unwrap_or_else(|e| or_log(Err(e), "store"))
    }

    /// Store one header, returning its resulting record.
    ///
    /// An already linked header is returned unchanged and nothing is
    /// written. Linkage is not pushed down to floating descendants; that
    /// is [`Self::repair_floating`]'s job.
    pub fn try_store(
        &mut self,
        input: impl Into<HeaderInput>,
    ) -> Result<StoredHeader, HeaderSyncError> {
        let header = validate(input.into())?;
        let mut pending = Pending::default();
        let stored = self.resolve(header, &mut pending)?;
        self.commit(pending)?;
        Ok(stored)
    }

    /// Store every header or none of them.
    pub fn batch_store<I, T>(&mut self, inputs: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: Into<HeaderInput>,
    {
        self.try_batch_store(inputs)
            .map(|_| true)
            .unwrap_or_else(|e| or_log(Err(e), "batch_store"))
    }

    /// Store every header or none of them, returning the resolved records
    /// in input order.
    ///
    /// Every item is parsed and work-checked before anything is resolved.
    /// Items then resolve in order against the store plus what this batch
    /// already resolved, so a parent listed before its child links in one
    /// pass while the reverse leaves the child floating.
    pub fn try_batch_store<I, T>(&mut self, inputs: I) -> Result<Vec<StoredHeader>, HeaderSyncError>
    where
        I: IntoIterator<Item = T>,
        T: Into<HeaderInput>,
    {
        let headers = inputs
            .into_iter()
            .map(|input| validate(input.into()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut pending = Pending::default();
        let mut stored = Vec::with_capacity(headers.len());
        for header in headers {
            stored.push(self.resolve(header, &mut pending)?);
        }
        self.commit(pending)?;
        Ok(stored)
    }

    /// Store a trusted root at a fixed height. `false` on rejection.
    pub fn store_checkpoint(
        &mut self,
        input: impl Into<HeaderInput>,
        height: u64,
        chain_work: Option<BigUint>,
    ) -> bool {
        self.try_store_checkpoint(input, height, chain_work)
            .map(|_| true)
            .unwrap_or_else(|e| or_log(Err(e), "store_checkpoint"))
    }

    /// Store a trusted root at a fixed height.
    ///
    /// The root's work is `chain_work` when given, otherwise the header's
    /// own work. Proof-of-work is still checked. A header that is already
    /// linked keeps its linkage.
    pub fn try_store_checkpoint(
        &mut self,
        input: impl Into<HeaderInput>,
        height: u64,
        chain_work: Option<BigUint>,
    ) -> Result<StoredHeader, HeaderSyncError> {
        let header = validate(input.into())?;

        let existing = self.read_record(&header.hash)?;
        if let Some(record) = &existing {
            if !record.linkage.is_floating() {
                return Ok(StoredHeader {
                    header,
                    linkage: record.linkage.clone(),
                });
            }
        }

        let mut pending = Pending::default();
        self.ensure_no_root_conflict(&header.hash, height, &pending.overlay)?;

        let accumulated_work = chain_work.unwrap_or_else(|| header_work(&header));
        let hash = header.hash;
        let linkage = HeaderLinkage::Root {
            height,
            accumulated_work,
        };
        let stored = self.stage(&mut pending, header, linkage, existing.is_none())?;
        self.commit(pending)?;

        info!("[zeta-store] Checkpoint {} stored at height {}", hash, height);
        Ok(stored)
    }

    /// Link floating headers whose parent is now known. Returns how many
    /// were linked; 0 on storage failure.
    pub fn repair_floating(&mut self) -> usize {
        or_log(self.try_repair_floating(), "repair_floating")
    }

    /// Link floating headers whose parent is now known.
    ///
    /// Walks breadth-first from every linked parent through a
    /// `prev_block -> children` index of the floating set, so descendants
    /// link in topological order. Everything commits in one batch.
    pub fn try_repair_floating(&mut self) -> Result<usize, HeaderSyncError> {
        let floating = self.try_find_floating()?;
        if floating.is_empty() {
            return Ok(0);
        }

        let mut children: HashMap<BlockHash, Vec<Header>> = HashMap::new();
        for stored in floating {
            children
                .entry(stored.header.prev_block)
                .or_default()
                .push(stored.header);
        }

        let mut queue = VecDeque::new();
        for parent_hash in children.keys() {
            if let Some(record) = self.read_record(parent_hash)? {
                if !record.linkage.is_floating() {
                    queue.push_back((*parent_hash, record.linkage));
                }
            }
        }

        let mut pending = Pending::default();
        while let Some((parent_hash, parent_linkage)) = queue.pop_front() {
            for child in children.remove(&parent_hash).unwrap_or_default() {
                let linkage = child_linkage(&parent_linkage, &header_work(&child));
                let child_hash = child.hash;
                self.stage(&mut pending, child, linkage.clone(), false)?;
                queue.push_back((child_hash, linkage));
            }
        }

        let linked = pending.written.len();
        self.commit(pending)?;

        if linked > 0 {
            info!(
                "[zeta-store] Repaired {} floating headers ({} still floating)",
                linked,
                children.values().map(Vec::len).sum::<usize>()
            );
        }
        Ok(linked)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Exact lookup.
    pub fn find_by_hash(&self, hash: &BlockHash) -> Option<StoredHeader> {
        or_log(self.try_find_by_hash(hash), "find_by_hash")
    }

    /// Exact lookup.
    pub fn try_find_by_hash(
        &self,
        hash: &BlockHash,
    ) -> Result<Option<StoredHeader>, HeaderSyncError> {
        self.kv
            .get(&header_key(hash))?
            .map(|bytes| decode_stored(&bytes))
            .transpose()
    }

    /// Every root or linked header at `height`.
    pub fn find_by_height(&self, height: u64) -> Vec<StoredHeader> {
        or_log(self.try_find_by_height(height), "find_by_height")
    }

    /// Every root or linked header at `height`.
    pub fn try_find_by_height(&self, height: u64) -> Result<Vec<StoredHeader>, HeaderSyncError> {
        let hashes = self.hashes_at_height(height)?;
        self.load_all(&hashes)
    }

    /// Headers still waiting for their parent.
    pub fn find_floating(&self) -> Vec<StoredHeader> {
        or_log(self.try_find_floating(), "find_floating")
    }

    /// Headers still waiting for their parent.
    pub fn try_find_floating(&self) -> Result<Vec<StoredHeader>, HeaderSyncError> {
        let hashes = self
            .kv
            .prefix_scan(FLOATING_PREFIX)?
            .iter()
            .map(|(key, _)| hash_suffix(key))
            .collect::<Result<Vec<_>, _>>()?;
        self.load_all(&hashes)
    }

    /// All headers at the greatest known height.
    ///
    /// Height alone is not a safe notion of best chain; prefer
    /// [`Self::find_heaviest`].
    pub fn find_highest(&self) -> Vec<StoredHeader> {
        or_log(self.try_find_highest(), "find_highest")
    }

    /// All headers at the greatest known height.
    pub fn try_find_highest(&self) -> Result<Vec<StoredHeader>, HeaderSyncError> {
        match &self.tips.highest {
            Some((_, hashes)) => self.load_all(hashes),
            None => Ok(Vec::new()),
        }
    }

    /// All headers with the greatest accumulated work.
    pub fn find_heaviest(&self) -> Vec<StoredHeader> {
        or_log(self.try_find_heaviest(), "find_heaviest")
    }

    /// All headers with the greatest accumulated work.
    pub fn try_find_heaviest(&self) -> Result<Vec<StoredHeader>, HeaderSyncError> {
        match &self.tips.heaviest {
            Some((_, hashes)) => self.load_all(hashes),
            None => Ok(Vec::new()),
        }
    }

    /// Height and work of `header`'s parent; `(None, 0)` when the parent
    /// is unknown or floating.
    pub fn parent_height_and_work(&self, header: &Header) -> (Option<u64>, BigUint) {
        match self.try_parent_height_and_work(header) {
            Ok(result) => result,
            Err(e) => {
                or_log::<()>(Err(e), "parent_height_and_work");
                (None, BigUint::zero())
            }
        }
    }

    /// Height and work of `header`'s parent.
    pub fn try_parent_height_and_work(
        &self,
        header: &Header,
    ) -> Result<(Option<u64>, BigUint), HeaderSyncError> {
        Ok(match self.read_record(&header.prev_block)? {
            Some(record) => (record.linkage.height(), record.linkage.accumulated_work()),
            None => (None, BigUint::zero()),
        })
    }

    /// Check every linked header against its parent. Returns how many were
    /// checked.
    pub fn verify_linkage(&self) -> Result<usize, HeaderSyncError> {
        let mut checked = 0;
        for (_, value) in self.kv.prefix_scan(HEADER_PREFIX)? {
            let stored = decode_stored(&value)?;
            if !matches!(stored.linkage, HeaderLinkage::Linked { .. }) {
                continue;
            }
            let parent = self
                .read_record(&stored.header.prev_block)?
                .map(|r| r.linkage)
                .unwrap_or(HeaderLinkage::Floating);
            invariant_linked_to_parent(&parent, &stored.linkage, &header_work(&stored.header))?;
            checked += 1;
        }
        Ok(checked)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn read_record(&self, hash: &BlockHash) -> Result<Option<HeaderRecord>, HeaderSyncError> {
        self.kv
            .get(&header_key(hash))?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }

    fn lookup(
        &self,
        hash: &BlockHash,
        overlay: &HashMap<BlockHash, HeaderLinkage>,
    ) -> Result<Option<HeaderLinkage>, HeaderSyncError> {
        if let Some(linkage) = overlay.get(hash) {
            return Ok(Some(linkage.clone()));
        }
        Ok(self.read_record(hash)?.map(|r| r.linkage))
    }

    fn hashes_at_height(&self, height: u64) -> Result<Vec<BlockHash>, HeaderSyncError> {
        self.kv
            .prefix_scan(&height_prefix(height))?
            .iter()
            .map(|(key, _)| hash_suffix(key))
            .collect()
    }

    fn load_all(&self, hashes: &[BlockHash]) -> Result<Vec<StoredHeader>, HeaderSyncError> {
        let mut out = Vec::with_capacity(hashes.len());
        for hash in hashes {
            if let Some(stored) = self.try_find_by_hash(hash)? {
                out.push(stored);
            }
        }
        Ok(out)
    }

    fn ensure_no_root_conflict(
        &self,
        hash: &BlockHash,
        height: u64,
        overlay: &HashMap<BlockHash, HeaderLinkage>,
    ) -> Result<(), HeaderSyncError> {
        let overlay_conflict = overlay.iter().any(|(other, linkage)| {
            other != hash && linkage.is_root() && linkage.height() == Some(height)
        });
        if overlay_conflict {
            return Err(HeaderSyncError::RootConflict { height });
        }

        for other in self.hashes_at_height(height)? {
            if other == *hash {
                continue;
            }
            if let Some(record) = self.read_record(&other)? {
                if record.linkage.is_root() {
                    return Err(HeaderSyncError::RootConflict { height });
                }
            }
        }
        Ok(())
    }

    /// Decide the linkage of `header` and stage the write if anything
    /// changes.
    fn resolve(
        &self,
        header: Header,
        pending: &mut Pending,
    ) -> Result<StoredHeader, HeaderSyncError> {
        let existing = self.lookup(&header.hash, &pending.overlay)?;
        if let Some(linkage) = &existing {
            if !linkage.is_floating() {
                return Ok(StoredHeader {
                    header,
                    linkage: linkage.clone(),
                });
            }
        }

        let work = header_work(&header);
        let linkage = if header.has_null_parent() {
            self.ensure_no_root_conflict(&header.hash, 0, &pending.overlay)?;
            HeaderLinkage::Root {
                height: 0,
                accumulated_work: work,
            }
        } else {
            match self.lookup(&header.prev_block, &pending.overlay)? {
                Some(parent) => child_linkage(&parent, &work),
                None => HeaderLinkage::Floating,
            }
        };

        if existing.is_some() && linkage.is_floating() {
            // Still floating, already recorded as such
            return Ok(StoredHeader { header, linkage });
        }

        self.stage(pending, header, linkage, existing.is_none())
    }

    fn stage(
        &self,
        pending: &mut Pending,
        header: Header,
        linkage: HeaderLinkage,
        is_new: bool,
    ) -> Result<StoredHeader, HeaderSyncError> {
        let hash = header.hash;
        let record = HeaderRecord {
            raw: header.raw.to_vec(),
            linkage: linkage.clone(),
        };
        pending
            .ops
            .push(BatchOperation::put(header_key(&hash), bincode::serialize(&record)?));

        match linkage.height() {
            Some(height) => {
                pending
                    .ops
                    .push(BatchOperation::put(height_key(height, &hash), Vec::new()));
                if !is_new {
                    pending.ops.push(BatchOperation::delete(floating_key(&hash)));
                }
            }
            None => pending
                .ops
                .push(BatchOperation::put(floating_key(&hash), Vec::new())),
        }

        pending.overlay.insert(hash, linkage.clone());
        let stored = StoredHeader { header, linkage };
        pending.written.push((stored.clone(), is_new));
        Ok(stored)
    }

    fn commit(&mut self, pending: Pending) -> Result<(), HeaderSyncError> {
        if pending.ops.is_empty() {
            return Ok(());
        }
        self.kv.atomic_batch_write(pending.ops)?;

        for (stored, is_new) in &pending.written {
            if *is_new {
                self.count += 1;
            }
            self.tips.observe(stored.hash(), &stored.linkage);
        }
        debug!(
            "[zeta-store] Committed {} headers ({} total)",
            pending.written.len(),
            self.count
        );
        Ok(())
    }
}

/// Parse and work-check.
fn validate(input: HeaderInput) -> Result<Header, HeaderSyncError> {
    let header = input.into_header()?;
    if !check_work(&header) {
        return Err(HeaderSyncError::ProofOfWork { hash: header.hash });
    }
    Ok(header)
}
