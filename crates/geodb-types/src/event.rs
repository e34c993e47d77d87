use serde::{Deserialize, Serialize};

use crate::object::Object;

/// A derived, transient notice that two objects' influence radii overlap.
///
/// Built during a write's proximity scan, published once, never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The object whose write produced this event.
    pub trigger_object: Object,
    /// The object found within combined radius of the trigger.
    pub object: Object,
    /// Great-circle distance between the two, in metres.
    pub distance: f64,
    /// Copied from the trigger object's `updated_unix`.
    pub timestamp_unix: i64,
}

impl Event {
    pub fn new(trigger_object: Object, object: Object, distance: f64) -> Self {
        let timestamp_unix = trigger_object.updated_unix;
        Self {
            trigger_object,
            object,
            distance,
            timestamp_unix,
        }
    }

    /// Returns `true` when the trigger matched its own record.
    pub fn is_self_match(&self) -> bool {
        self.trigger_object.key == self.object.key
    }
}
