use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use geodb_types::unix_now;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::entry::Entry;
use crate::error::{KvError, KvResult};
use crate::log::{CommitLog, LogOp, LogRecord};
use crate::traits::{KvEngine, KvTxn};

/// Commit log file name inside the data directory.
pub const LOG_FILE_NAME: &str = "geodb.log";

/// One committed version of a key. `entry == None` is a tombstone.
#[derive(Clone, Debug)]
struct Version {
    ts: u64,
    entry: Option<Entry>,
}

#[derive(Debug, Default)]
struct State {
    /// Versions per key, oldest first.
    versions: BTreeMap<Vec<u8>, Vec<Version>>,
    last_commit: u64,
    /// Snapshot timestamps of open transactions, with reference counts.
    active: BTreeMap<u64, usize>,
}

impl State {
    fn acquire(&mut self) -> u64 {
        let ts = self.last_commit;
        *self.active.entry(ts).or_insert(0) += 1;
        ts
    }

    fn release(&mut self, ts: u64) {
        if let Some(count) = self.active.get_mut(&ts) {
            *count -= 1;
            if *count == 0 {
                self.active.remove(&ts);
            }
        }
    }

    /// Oldest snapshot any open transaction may still read.
    fn watermark(&self) -> u64 {
        self.active
            .keys()
            .next()
            .copied()
            .unwrap_or(self.last_commit)
    }

    fn visible(&self, key: &[u8], read_ts: u64, now: u64) -> Option<&Entry> {
        self.versions
            .get(key)
            .and_then(|versions| visible_version(versions, read_ts, now))
    }

    fn apply(&mut self, ts: u64, ops: Vec<LogOp>) {
        for op in ops {
            let (key, entry) = match op {
                LogOp::Put(entry) => (entry.key.clone(), Some(entry)),
                LogOp::Delete(key) => (key, None),
            };
            self.versions
                .entry(key)
                .or_default()
                .push(Version { ts, entry });
        }
        self.last_commit = self.last_commit.max(ts);
    }

    /// Drop versions no open snapshot can observe.
    fn prune_keys<'a>(&mut self, keys: impl IntoIterator<Item = &'a Vec<u8>>) {
        let watermark = self.watermark();
        for key in keys {
            let empty = match self.versions.get_mut(key) {
                Some(versions) => prune(versions, watermark),
                None => false,
            };
            if empty {
                self.versions.remove(key);
            }
        }
    }

    fn prune_all(&mut self) {
        let watermark = self.watermark();
        self.versions
            .retain(|_, versions| !prune(versions, watermark));
    }

    fn replay(records: Vec<LogRecord>) -> Self {
        let mut state = Self::default();
        for record in records {
            state.apply(record.commit_ts, record.ops);
        }
        state.prune_all();
        state
    }

    fn live_entries(&self, now: u64) -> Vec<Entry> {
        let ts = self.last_commit;
        self.versions
            .values()
            .filter_map(|versions| visible_version(versions, ts, now))
            .cloned()
            .collect()
    }
}

fn visible_version(versions: &[Version], read_ts: u64, now: u64) -> Option<&Entry> {
    versions
        .iter()
        .rev()
        .find(|v| v.ts <= read_ts)
        .and_then(|v| v.entry.as_ref())
        .filter(|e| !e.is_expired(now))
}

/// Keep the newest version at or below `watermark` plus everything after it.
/// Returns `true` when nothing but an obsolete tombstone is left.
fn prune(versions: &mut Vec<Version>, watermark: u64) -> bool {
    if let Some(pos) = versions.iter().rposition(|v| v.ts <= watermark) {
        versions.drain(..pos);
    }
    versions.len() == 1 && versions[0].entry.is_none() && versions[0].ts <= watermark
}

fn now_secs() -> u64 {
    unix_now().max(0) as u64
}

struct Shared {
    state: RwLock<State>,
    log: Option<CommitLog>,
}

impl Shared {
    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().expect("engine lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().expect("engine lock poisoned")
    }
}

/// Multi-version in-memory engine with optional commit-log durability.
///
/// Cloning is cheap; clones share the same data.
#[derive(Clone)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl MemoryEngine {
    /// Create an empty, purely in-memory engine.
    pub fn new() -> Self {
        Self::from_parts(State::default(), None)
    }

    /// Open an engine per `config`, replaying the commit log if one exists.
    pub fn open(config: &EngineConfig) -> KvResult<Self> {
        let Some(dir) = &config.data_dir else {
            return Ok(Self::new());
        };
        if dir.exists() && !dir.is_dir() {
            return Err(KvError::InvalidDataDir(dir.clone()));
        }
        fs::create_dir_all(dir)?;

        let log = CommitLog::open(&dir.join(LOG_FILE_NAME), config.sync_mode)?;
        let state = State::replay(log.recover()?);

        info!(
            data_dir = %dir.display(),
            keys = state.versions.len(),
            last_commit = state.last_commit,
            "engine opened"
        );
        Ok(Self::from_parts(state, Some(log)))
    }

    /// Load the committed contents of `dir` without opening its log for
    /// writing. Nothing in `dir` is created or modified, and later commits
    /// stay in memory.
    pub fn open_read_only(dir: &Path) -> KvResult<Self> {
        if !dir.is_dir() {
            return Err(KvError::InvalidDataDir(dir.to_path_buf()));
        }
        let state = State::replay(CommitLog::read_records(&dir.join(LOG_FILE_NAME))?);

        debug!(data_dir = %dir.display(), keys = state.versions.len(), "engine loaded read-only");
        Ok(Self::from_parts(state, None))
    }

    fn from_parts(state: State, log: Option<CommitLog>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                log,
            }),
        }
    }

    /// Number of live (visible, unexpired) entries.
    pub fn len(&self) -> usize {
        let state = self.shared.read_state();
        let now = now_secs();
        let ts = state.last_commit;
        state
            .versions
            .values()
            .filter(|versions| visible_version(versions, ts, now).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the most recent commit.
    pub fn last_commit(&self) -> u64 {
        self.shared.read_state().last_commit
    }

    /// Returns `true` when commits are persisted to a log.
    pub fn is_persistent(&self) -> bool {
        self.shared.log.is_some()
    }

    /// Delete every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> KvResult<usize> {
        let now = now_secs();
        let expired: Vec<Vec<u8>> = {
            let state = self.shared.read_state();
            state
                .versions
                .iter()
                .filter(|(_, versions)| {
                    versions
                        .last()
                        .and_then(|v| v.entry.as_ref())
                        .is_some_and(|e| e.is_expired(now))
                })
                .map(|(key, _)| key.clone())
                .collect()
        };
        if expired.is_empty() {
            return Ok(0);
        }

        let mut txn = self.begin(true);
        for key in &expired {
            txn.delete(key)?;
        }
        txn.commit()?;
        self.shared.write_state().prune_all();

        debug!(count = expired.len(), "purged expired entries");
        Ok(expired.len())
    }

    /// Rewrite the commit log as a single record of the live entries.
    ///
    /// A no-op for in-memory engines. Blocks commits while running.
    pub fn compact(&self) -> KvResult<()> {
        let Some(log) = &self.shared.log else {
            return Ok(());
        };
        let mut state = self.shared.write_state();
        let live = state.live_entries(now_secs());
        let record = LogRecord {
            commit_ts: state.last_commit,
            ops: live.into_iter().map(LogOp::Put).collect(),
        };
        let before = log.offset();
        log.rewrite(std::slice::from_ref(&record))?;
        state.prune_all();

        info!(
            entries = record.ops.len(),
            bytes_before = before,
            bytes_after = log.offset(),
            "commit log compacted"
        );
        Ok(())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KvEngine for MemoryEngine {
    type Txn = MemoryTxn;

    fn begin(&self, update: bool) -> MemoryTxn {
        let read_ts = self.shared.write_state().acquire();
        MemoryTxn {
            shared: Arc::clone(&self.shared),
            read_ts,
            update,
            pending: BTreeMap::new(),
            finished: false,
        }
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.read_state();
        f.debug_struct("MemoryEngine")
            .field("keys", &state.versions.len())
            .field("last_commit", &state.last_commit)
            .field("persistent", &self.shared.log.is_some())
            .finish()
    }
}

/// Transaction over a [`MemoryEngine`] snapshot.
pub struct MemoryTxn {
    shared: Arc<Shared>,
    read_ts: u64,
    update: bool,
    /// Staged writes; `None` stages a delete.
    pending: BTreeMap<Vec<u8>, Option<Entry>>,
    finished: bool,
}

impl MemoryTxn {
    /// Snapshot timestamp this transaction reads at.
    pub fn read_ts(&self) -> u64 {
        self.read_ts
    }

    pub fn is_update(&self) -> bool {
        self.update
    }

    fn stage(&mut self, key: Vec<u8>, entry: Option<Entry>) -> KvResult<()> {
        if !self.update {
            return Err(KvError::ReadOnly);
        }
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        self.pending.insert(key, entry);
        Ok(())
    }
}

impl KvTxn for MemoryTxn {
    fn get(&self, key: &[u8]) -> KvResult<Entry> {
        let now = now_secs();
        let not_found = || KvError::KeyNotFound(String::from_utf8_lossy(key).into_owned());

        if let Some(staged) = self.pending.get(key) {
            return staged
                .as_ref()
                .filter(|e| !e.is_expired(now))
                .cloned()
                .ok_or_else(not_found);
        }
        self.shared
            .read_state()
            .visible(key, self.read_ts, now)
            .cloned()
            .ok_or_else(not_found)
    }

    fn set_entry(&mut self, entry: Entry) -> KvResult<()> {
        let key = entry.key.clone();
        self.stage(key, Some(entry))
    }

    fn delete(&mut self, key: &[u8]) -> KvResult<()> {
        self.stage(key.to_vec(), None)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> KvResult<Vec<Entry>> {
        let now = now_secs();
        let mut merged: BTreeMap<Vec<u8>, Entry> = {
            let state = self.shared.read_state();
            state
                .versions
                .range(prefix.to_vec()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .filter_map(|(key, versions)| {
                    visible_version(versions, self.read_ts, now).map(|e| (key.clone(), e.clone()))
                })
                .collect()
        };

        for (key, staged) in self
            .pending
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            match staged {
                Some(entry) if !entry.is_expired(now) => {
                    merged.insert(key.clone(), entry.clone());
                }
                _ => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_values().collect())
    }

    fn commit(mut self) -> KvResult<()> {
        self.finished = true;
        let shared = Arc::clone(&self.shared);
        let mut state = shared.write_state();
        state.release(self.read_ts);

        if !self.update || self.pending.is_empty() {
            return Ok(());
        }

        for key in self.pending.keys() {
            let newer = state
                .versions
                .get(key)
                .and_then(|versions| versions.last())
                .is_some_and(|v| v.ts > self.read_ts);
            if newer {
                return Err(KvError::Conflict(String::from_utf8_lossy(key).into_owned()));
            }
        }

        let commit_ts = state.last_commit + 1;
        let pending = std::mem::take(&mut self.pending);
        let keys: Vec<Vec<u8>> = pending.keys().cloned().collect();
        let ops: Vec<LogOp> = pending
            .into_iter()
            .map(|(key, entry)| match entry {
                Some(entry) => LogOp::Put(entry),
                None => LogOp::Delete(key),
            })
            .collect();

        let record = LogRecord { commit_ts, ops };
        if let Some(log) = &shared.log {
            log.append(&record)?;
        }
        state.apply(commit_ts, record.ops);
        state.prune_keys(&keys);

        debug!(commit_ts, keys = keys.len(), "transaction committed");
        Ok(())
    }
}

impl Drop for MemoryTxn {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(mut state) = self.shared.state.write() {
            state.release(self.read_ts);
        }
    }
}

impl std::fmt::Debug for MemoryTxn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTxn")
            .field("read_ts", &self.read_ts)
            .field("update", &self.update)
            .field("pending", &self.pending.len())
            .finish()
    }
}
