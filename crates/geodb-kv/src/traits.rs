use crate::entry::Entry;
use crate::error::KvResult;

/// A transactional key-value engine.
///
/// Implementations must provide:
/// - Snapshot isolation: a transaction sees the state committed when it began.
/// - Read-your-own-writes: reads and scans include the transaction's pending
///   writes.
/// - Ordered iteration by key.
/// - Per-entry expiry: expired entries are invisible.
/// - Write-write conflict detection at commit.
pub trait KvEngine: Send + Sync + 'static {
    type Txn: KvTxn + 'static;

    /// Open a transaction. `update = false` yields a read-only view.
    fn begin(&self, update: bool) -> Self::Txn;
}

/// A single transaction. Dropping it without committing discards it.
pub trait KvTxn: Send {
    /// Fetch one entry.
    ///
    /// Returns `Err(KeyNotFound)` when the key is absent, deleted, or expired.
    fn get(&self, key: &[u8]) -> KvResult<Entry>;

    /// Stage a write.
    fn set_entry(&mut self, entry: Entry) -> KvResult<()>;

    /// Stage a delete. Deleting an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> KvResult<()>;

    /// Every visible entry whose key starts with `prefix`, in key order.
    /// An empty prefix scans the whole key space.
    fn scan_prefix(&self, prefix: &[u8]) -> KvResult<Vec<Entry>>;

    /// Make the staged writes visible atomically.
    fn commit(self) -> KvResult<()>;
}
