//! Proximity detection run inside each write transaction.
//!
//! There is no spatial index: every write compares the new object against
//! every object visible to its transaction.

use geodb_kv::{KvResult, KvTxn};
use geodb_types::{Event, Object, RecordKind};
use tracing::warn;

/// Distance between `a` and `b` if their influence radii overlap.
///
/// Returns `None` when either object has no point or the distance exceeds
/// the sum of the radii. Touching circles count as overlapping.
pub fn within_range(a: &Object, b: &Object) -> Option<f64> {
    let distance = a.distance_to(b)?;
    (distance <= a.radius + b.radius).then_some(distance)
}

/// Compare `trigger` with every object visible in `txn`.
///
/// The trigger's own staged entry is visible, so with `include_self` the
/// result contains a self-event at distance 0. Entries that fail to decode
/// are logged and skipped.
pub fn scan<T: KvTxn>(txn: &T, trigger: &Object, include_self: bool) -> KvResult<Vec<Event>> {
    if trigger.point.is_none() {
        return Ok(Vec::new());
    }

    let mut events = Vec::new();
    for entry in txn.scan_prefix(&[])? {
        if !RecordKind::Object.matches(entry.meta) {
            continue;
        }
        if !include_self && entry.key == trigger.key.as_bytes() {
            continue;
        }
        let candidate = match Object::decode(&entry.value) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(key = %entry.key_str(), error = %e, "skipping undecodable object in proximity scan");
                continue;
            }
        };
        if let Some(distance) = within_range(trigger, &candidate) {
            events.push(Event::new(trigger.clone(), candidate, distance));
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodb_kv::{Entry, KvEngine, MemoryEngine};
    use geodb_types::Point;

    fn put(txn: &mut impl KvTxn, object: &Object) {
        txn.set_entry(
            Entry::new(object.key.as_bytes(), object.encode().unwrap())
                .with_meta(RecordKind::Object.as_byte()),
        )
        .unwrap();
    }

    #[test]
    fn overlapping_radii_are_in_range() {
        let a = Object::new("a", Point::new(0.0, 0.0), 100.0);
        // ~111 m north.
        let b = Object::new("b", Point::new(0.001, 0.0), 20.0);
        let distance = within_range(&a, &b).unwrap();
        assert!(distance > 100.0 && distance < 120.0);
        assert_eq!(within_range(&b, &a), Some(distance));
    }

    #[test]
    fn distant_objects_are_out_of_range() {
        let a = Object::new("a", Point::new(0.0, 0.0), 10.0);
        let b = Object::new("b", Point::new(1.0, 1.0), 10.0);
        assert_eq!(within_range(&a, &b), None);
    }

    #[test]
    fn missing_point_is_never_in_range() {
        let a = Object::new("a", Point::new(0.0, 0.0), 1e9);
        let b = Object {
            key: "b".into(),
            radius: 1e9,
            ..Default::default()
        };
        assert_eq!(within_range(&a, &b), None);
    }

    #[test]
    fn zero_radius_same_point_matches() {
        let a = Object::new("a", Point::new(10.0, 10.0), 0.0);
        assert_eq!(within_range(&a, &a), Some(0.0));
    }

    #[test]
    fn scan_sees_staged_trigger() {
        let engine = MemoryEngine::new();
        let mut txn = engine.begin(true);
        let a = Object::new("a", Point::new(0.0, 0.0), 10.0);
        put(&mut txn, &a);

        let events = scan(&txn, &a, true).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_self_match());
        assert_eq!(events[0].distance, 0.0);

        assert!(scan(&txn, &a, false).unwrap().is_empty());
    }

    #[test]
    fn scan_skips_other_tags_and_bad_values() {
        let engine = MemoryEngine::new();
        let mut txn = engine.begin(true);
        let a = Object::new("a", Point::new(0.0, 0.0), 10.0);
        let b = Object::new("b", Point::new(0.0, 0.0), 10.0);
        put(&mut txn, &a);
        txn.set_entry(
            Entry::new("b", b.encode().unwrap()).with_meta(RecordKind::Event.as_byte()),
        )
        .unwrap();
        txn.set_entry(Entry::new("c", vec![0xff]).with_meta(RecordKind::Object.as_byte()))
            .unwrap();

        let events = scan(&txn, &a, false).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn pointless_trigger_scans_nothing() {
        let engine = MemoryEngine::new();
        let mut txn = engine.begin(true);
        put(&mut txn, &Object::new("a", Point::new(0.0, 0.0), 10.0));
        let trigger = Object {
            key: "t".into(),
            radius: 1e9,
            ..Default::default()
        };
        assert!(scan(&txn, &trigger, true).unwrap().is_empty());
    }

    #[test]
    fn events_carry_trigger_timestamp() {
        let engine = MemoryEngine::new();
        let mut txn = engine.begin(true);
        put(&mut txn, &Object::new("old", Point::new(0.0, 0.0), 10.0).with_updated_unix(5));
        let trigger = Object::new("new", Point::new(0.0, 0.0), 10.0).with_updated_unix(77);
        put(&mut txn, &trigger);

        let events = scan(&txn, &trigger, false).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].object.key, "old");
        assert_eq!(events[0].timestamp_unix, 77);
    }
}
