use std::collections::BTreeMap;
use std::sync::Arc;

use geodb_hub::Hub;
use geodb_kv::{Entry, KvEngine, KvError, KvTxn, MemoryEngine};
use geodb_types::{unix_now, Object, RecordKind};
use regex::Regex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::GeoDbConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::proximity;

/// Outcome of a batch write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetReport {
    /// Keys committed.
    pub written: usize,
    /// Keys abandoned (invalid, encode failure, conflict, storage error).
    pub failed: usize,
    /// Proximity events published by the committed keys.
    pub events: usize,
}

/// The geospatial object store.
///
/// Cloning is cheap; clones share the engine and the hub.
pub struct GeoDb<E: KvEngine = MemoryEngine> {
    pub(crate) engine: Arc<E>,
    pub(crate) hub: Arc<Hub>,
    config: GeoDbConfig,
}

impl<E: KvEngine> Clone for GeoDb<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            hub: Arc::clone(&self.hub),
            config: self.config.clone(),
        }
    }
}

impl<E: KvEngine> GeoDb<E> {
    pub fn new(engine: E, hub: Arc<Hub>) -> Self {
        Self::with_config(engine, hub, GeoDbConfig::default())
    }

    pub fn with_config(engine: E, hub: Arc<Hub>, config: GeoDbConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            hub,
            config,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn config(&self) -> &GeoDbConfig {
        &self.config
    }

    pub fn ping(&self) -> bool {
        true
    }

    // ---- Writes ----

    /// Upsert a batch of objects, one transaction per key.
    ///
    /// Keys are written concurrently and independently. A key that fails is
    /// logged and abandoned without affecting the others; the report is the
    /// only trace the caller gets.
    pub async fn set(&self, objects: BTreeMap<String, Object>) -> SetReport {
        let mut tasks = JoinSet::new();
        for (key, object) in objects {
            let engine = Arc::clone(&self.engine);
            let hub = Arc::clone(&self.hub);
            let include_self = self.config.include_self_matches;
            tasks.spawn_blocking(move || {
                let result = write_one(engine.as_ref(), &hub, &key, object, include_self);
                if let Err(e) = &result {
                    warn!(key = %key, error = %e, "write abandoned");
                }
                result
            });
        }

        let mut report = SetReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(events)) => {
                    report.written += 1;
                    report.events += events;
                }
                Ok(Err(_)) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "write task failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            written = report.written,
            failed = report.failed,
            events = report.events,
            "batch write finished"
        );
        report
    }

    /// Delete `keys` in one transaction. Absent keys are ignored.
    pub fn delete(&self, keys: &[String]) -> ServiceResult<()> {
        let mut txn = self.engine.begin(true);
        for key in keys {
            txn.delete(key.as_bytes())?;
        }
        txn.commit()?;
        info!(count = keys.len(), "objects deleted");
        Ok(())
    }

    // ---- Reads ----

    /// Fetch `keys`. Any missing key fails the whole call with `NotFound`;
    /// entries that are not objects are left out.
    pub fn get(&self, keys: &[String]) -> ServiceResult<BTreeMap<String, Object>> {
        let txn = self.engine.begin(false);
        let mut objects = BTreeMap::new();
        for key in keys {
            let entry = txn.get(key.as_bytes()).map_err(|e| match e {
                KvError::KeyNotFound(_) => ServiceError::NotFound(key.clone()),
                other => other.into(),
            })?;
            if !RecordKind::Object.matches(entry.meta) {
                continue;
            }
            objects.insert(key.clone(), decode(&entry)?);
        }
        Ok(objects)
    }

    /// Every object key, in key order.
    pub fn keys(&self) -> ServiceResult<Vec<String>> {
        let txn = self.engine.begin(false);
        Ok(txn
            .scan_prefix(&[])?
            .into_iter()
            .filter(|entry| RecordKind::Object.matches(entry.meta))
            .map(|entry| entry.key_str())
            .collect())
    }

    /// Objects whose key starts with `prefix`. An empty prefix matches
    /// nothing.
    pub fn seek(&self, prefix: &str) -> ServiceResult<BTreeMap<String, Object>> {
        if prefix.is_empty() {
            return Ok(BTreeMap::new());
        }
        let txn = self.engine.begin(false);
        collect_objects(txn.scan_prefix(prefix.as_bytes())?, |_| true)
    }

    /// Objects whose key matches `pattern`.
    ///
    /// The pattern is compiled before anything is read; an undecodable
    /// matching entry fails the call.
    pub fn get_regex(&self, pattern: &str) -> ServiceResult<BTreeMap<String, Object>> {
        let regex = Regex::new(pattern)?;
        let txn = self.engine.begin(false);
        collect_objects(txn.scan_prefix(&[])?, |key| regex.is_match(key))
    }
}

impl GeoDb<MemoryEngine> {
    /// Remove expired objects from the engine. Returns how many were purged.
    pub fn purge_expired(&self) -> ServiceResult<usize> {
        Ok(self.engine.purge_expired()?)
    }
}

impl<E: KvEngine> std::fmt::Debug for GeoDb<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoDb")
            .field("hub", &self.hub)
            .field("config", &self.config)
            .finish()
    }
}

/// Stage `object` under `key`, publish its proximity events and the object
/// itself, then commit. Returns the number of events published.
fn write_one<E: KvEngine>(
    engine: &E,
    hub: &Hub,
    key: &str,
    mut object: Object,
    include_self: bool,
) -> ServiceResult<usize> {
    object.stamp(key, unix_now());
    object.validate()?;
    let value = object.encode()?;

    let mut txn = engine.begin(true);
    txn.set_entry(
        Entry::new(key.as_bytes(), value)
            .with_meta(RecordKind::Object.as_byte())
            .with_expires_at(object.expires_at()),
    )?;

    let events = proximity::scan(&txn, &object, include_self)?;
    let published = events.len();
    for event in events {
        hub.publish_event(event);
    }
    hub.publish_object(object);

    txn.commit()?;
    debug!(key = %key, events = published, "object written");
    Ok(published)
}

fn decode(entry: &Entry) -> ServiceResult<Object> {
    Object::decode(&entry.value).map_err(|source| ServiceError::Decode {
        key: entry.key_str(),
        source,
    })
}

fn collect_objects(
    entries: Vec<Entry>,
    mut keep: impl FnMut(&str) -> bool,
) -> ServiceResult<BTreeMap<String, Object>> {
    let mut objects = BTreeMap::new();
    for entry in entries {
        if !RecordKind::Object.matches(entry.meta) {
            continue;
        }
        let key = entry.key_str();
        if !keep(&key) {
            continue;
        }
        let object = decode(&entry)?;
        objects.insert(key, object);
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodb_types::Point;
    use tokio_util::sync::CancellationToken;

    fn db() -> GeoDb {
        GeoDb::new(MemoryEngine::new(), Arc::new(Hub::new()))
    }

    fn batch(objects: impl IntoIterator<Item = (&'static str, Object)>) -> BTreeMap<String, Object> {
        objects
            .into_iter()
            .map(|(key, object)| (key.to_string(), object))
            .collect()
    }

    fn at(lat: f64, lon: f64, radius: f64) -> Object {
        Object {
            point: Some(Point::new(lat, lon)),
            radius,
            ..Default::default()
        }
    }

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn ping_is_true() {
        assert!(db().ping());
    }

    #[tokio::test]
    async fn set_then_get_stamps_key_and_time() {
        let db = db();
        let before = unix_now();
        let report = db
            .set(batch([("truck", at(1.0, 1.0, 10.0).with_metadata("driver", "ada"))]))
            .await;
        assert_eq!(report.written, 1);
        assert_eq!(report.failed, 0);

        let got = db.get(&keys(&["truck"])).unwrap();
        let truck = &got["truck"];
        assert_eq!(truck.key, "truck");
        assert!(truck.updated_unix >= before);
        assert_eq!(truck.metadata["driver"], "ada");
    }

    #[tokio::test]
    async fn caller_timestamp_is_kept() {
        let db = db();
        db.set(batch([("a", at(0.0, 0.0, 1.0).with_updated_unix(42))])).await;
        assert_eq!(db.get(&keys(&["a"])).unwrap()["a"].updated_unix, 42);
    }

    #[tokio::test]
    async fn single_write_yields_self_event() {
        let db = db();
        let report = db.set(batch([("a", at(0.0, 0.0, 10.0))])).await;
        assert_eq!(report.events, 1);
    }

    #[tokio::test]
    async fn self_events_can_be_disabled() {
        let config = GeoDbConfig {
            include_self_matches: false,
        };
        let db = GeoDb::with_config(MemoryEngine::new(), Arc::new(Hub::new()), config);
        assert_eq!(db.set(batch([("a", at(0.0, 0.0, 10.0))])).await.events, 0);
        assert_eq!(db.set(batch([("b", at(0.0, 0.0, 10.0))])).await.events, 1);
    }

    #[tokio::test]
    async fn overlapping_pair_detected_in_either_order() {
        for (first, second) in [("a", "b"), ("b", "a")] {
            let db = db();
            let hub = Arc::clone(db.hub());
            let cancel = CancellationToken::new();
            hub.start(cancel.clone()).unwrap();
            let id = hub.add_event_stream_client(None);
            let mut events = hub.client_event_stream(&id).unwrap();

            db.set(batch([(first, at(0.0, 0.0, 60.0))])).await;
            // ~111 m away, radii sum to 120 m.
            db.set(batch([(second, at(0.001, 0.0, 60.0))])).await;

            let mut received = Vec::new();
            for _ in 0..3 {
                received.push(events.recv().await.unwrap());
            }
            let self_event = &received[0];
            assert!(self_event.is_self_match());
            assert_eq!(self_event.distance, 0.0);

            let pair = received
                .iter()
                .find(|e| !e.is_self_match())
                .expect("pair event");
            assert_eq!(pair.trigger_object.key, second);
            assert_eq!(pair.object.key, first);
            assert!(pair.distance > 100.0 && pair.distance <= 120.0);
            cancel.cancel();
        }
    }

    #[tokio::test]
    async fn distant_objects_produce_only_self_events() {
        let db = db();
        db.set(batch([("a", at(0.0, 0.0, 10.0))])).await;
        let report = db.set(batch([("b", at(45.0, 45.0, 10.0))])).await;
        assert_eq!(report.events, 1);
    }

    #[tokio::test]
    async fn keys_lists_each_write_once() {
        let db = db();
        db.set(batch([
            ("c", at(0.0, 0.0, 1.0)),
            ("a", at(0.0, 0.0, 1.0)),
            ("b", at(0.0, 0.0, 1.0)),
        ]))
        .await;
        db.set(batch([("a", at(1.0, 1.0, 1.0))])).await;
        assert_eq!(db.keys().unwrap(), keys(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn concurrent_batch_writes_all_commit() {
        let db = db();
        let objects: BTreeMap<String, Object> = (0..32)
            .map(|i| (format!("k{i:02}"), at(0.0, 0.0, 10.0)))
            .collect();
        let report = db.set(objects).await;
        assert_eq!(report.written, 32);
        assert_eq!(report.failed, 0);
        assert_eq!(db.keys().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn invalid_object_is_abandoned_alone() {
        let db = db();
        let report = db
            .set(batch([("bad", at(0.0, 0.0, -1.0)), ("good", at(0.0, 0.0, 1.0))]))
            .await;
        assert_eq!(report.written, 1);
        assert_eq!(report.failed, 1);
        assert!(matches!(
            db.get(&keys(&["bad"])),
            Err(ServiceError::NotFound(k)) if k == "bad"
        ));
        assert_eq!(db.keys().unwrap(), keys(&["good"]));
    }

    #[tokio::test]
    async fn seek_matches_prefix_only() {
        let db = db();
        db.set(batch([
            ("car:1", at(0.0, 0.0, 1.0)),
            ("car:2", at(0.0, 0.0, 1.0)),
            ("bike:1", at(0.0, 0.0, 1.0)),
        ]))
        .await;

        let cars = db.seek("car:").unwrap();
        assert_eq!(cars.keys().cloned().collect::<Vec<_>>(), keys(&["car:1", "car:2"]));
        for key in cars.keys() {
            assert!(db.keys().unwrap().contains(key));
        }
        assert!(db.seek("").unwrap().is_empty());
        assert!(db.seek("plane").unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let db = db();
        db.set(batch([("a", at(0.0, 0.0, 1.0)), ("b", at(0.0, 0.0, 1.0))]))
            .await;
        db.delete(&keys(&["a", "missing"])).unwrap();

        assert!(matches!(db.get(&keys(&["a"])), Err(ServiceError::NotFound(_))));
        assert!(matches!(db.get(&keys(&["b", "a"])), Err(ServiceError::NotFound(_))));
        assert_eq!(db.keys().unwrap(), keys(&["b"]));
    }

    #[tokio::test]
    async fn get_regex_returns_matching_keys() {
        let db = db();
        db.set(batch([
            ("user-1", at(0.0, 0.0, 1.0)),
            ("user-22", at(0.0, 0.0, 1.0)),
            ("admin", at(0.0, 0.0, 1.0)),
        ]))
        .await;

        let users = db.get_regex(r"^user-\d+$").unwrap();
        assert_eq!(users.keys().cloned().collect::<Vec<_>>(), keys(&["user-1", "user-22"]));
        assert!(matches!(db.get_regex("("), Err(ServiceError::InvalidPattern(_))));
    }

    #[tokio::test]
    async fn expired_objects_are_invisible() {
        let db = db();
        db.set(batch([
            ("gone", at(0.0, 0.0, 1.0).with_expires_unix(1)),
            ("kept", at(0.0, 0.0, 1.0).with_expires_unix(unix_now() + 3600)),
        ]))
        .await;
        assert_eq!(db.keys().unwrap(), keys(&["kept"]));
        assert!(matches!(db.get(&keys(&["gone"])), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let db = db();
        let mut txn = db.engine().begin(true);
        txn.set_entry(Entry::new("evt", vec![1, 2, 3]).with_meta(RecordKind::Event.as_byte()))
            .unwrap();
        txn.commit().unwrap();

        assert!(db.keys().unwrap().is_empty());
        assert!(db.get(&keys(&["evt"])).unwrap().is_empty());
        assert!(db.get_regex(".*").unwrap().is_empty());
    }

    #[tokio::test]
    async fn undecodable_object_fails_reads_but_not_writes() {
        let db = db();
        let mut txn = db.engine().begin(true);
        txn.set_entry(Entry::new("junk", vec![0xff]).with_meta(RecordKind::Object.as_byte()))
            .unwrap();
        txn.commit().unwrap();

        assert!(matches!(
            db.get(&keys(&["junk"])),
            Err(ServiceError::Decode { key, .. }) if key == "junk"
        ));
        assert!(matches!(db.get_regex("j"), Err(ServiceError::Decode { .. })));

        let report = db.set(batch([("ok", at(0.0, 0.0, 1.0))])).await;
        assert_eq!(report.written, 1);
        assert_eq!(report.events, 1);
    }

    #[tokio::test]
    async fn writes_publish_objects() {
        let db = db();
        let hub = Arc::clone(db.hub());
        let cancel = CancellationToken::new();
        hub.start(cancel.clone()).unwrap();
        let id = hub.add_object_stream_client(Some("watcher"));
        let mut objects = hub.client_object_stream(&id).unwrap();

        db.set(batch([("a", at(0.0, 0.0, 1.0))])).await;
        let object = objects.recv().await.unwrap();
        assert_eq!(object.key, "a");
        assert!(object.updated_unix > 0);
        cancel.cancel();
    }

    #[tokio::test]
    async fn purge_removes_expired() {
        let db = db();
        db.set(batch([("gone", at(0.0, 0.0, 1.0).with_expires_unix(1))])).await;
        assert_eq!(db.purge_expired().unwrap(), 1);
        assert_eq!(db.purge_expired().unwrap(), 0);
    }
}
