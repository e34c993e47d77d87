use std::sync::Arc;

use geodb_types::{Event, Object};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HubConfig;
use crate::error::HubResult;
use crate::topic::{ClientStream, Topic};

/// Handles of the two running dispatch loops.
#[derive(Debug)]
pub struct DispatchHandle {
    objects: JoinHandle<()>,
    events: JoinHandle<()>,
}

impl DispatchHandle {
    /// Wait for both loops to exit (after their cancellation token fires).
    /// Returns `false` if either loop panicked or was aborted.
    pub async fn join(self) -> bool {
        let mut clean = true;
        for (topic, handle) in [("objects", self.objects), ("events", self.events)] {
            if let Err(e) = handle.await {
                warn!(topic, error = %e, "dispatch loop failed");
                clean = false;
            }
        }
        clean
    }
}

/// Publish/subscribe broker fanning out objects and proximity events.
///
/// Clients register per kind and receive every item published after they
/// register, until they are removed. Publishing never blocks the writer.
#[derive(Debug)]
pub struct Hub {
    objects: Arc<Topic<Object>>,
    events: Arc<Topic<Event>>,
    config: HubConfig,
}

impl Hub {
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self {
            objects: Arc::new(Topic::new("object", config.clone())),
            events: Arc::new(Topic::new("event", config.clone())),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Spawn the object and event dispatch loops on the current runtime.
    ///
    /// Fails with `AlreadyStarted` on a second call.
    pub fn start(&self, cancel: CancellationToken) -> HubResult<DispatchHandle> {
        let object_ingress = self.objects.take_ingress()?;
        let event_ingress = self.events.take_ingress()?;

        let objects = tokio::spawn(Arc::clone(&self.objects).run(object_ingress, cancel.clone()));
        let events = tokio::spawn(Arc::clone(&self.events).run(event_ingress, cancel));

        info!(
            client_buffer = self.config.client_buffer,
            overflow = ?self.config.overflow,
            "hub started"
        );
        Ok(DispatchHandle { objects, events })
    }

    // ---- Object stream ----

    pub fn add_object_stream_client(&self, client_id: Option<&str>) -> String {
        self.objects.add_client(client_id)
    }

    pub fn remove_object_stream_client(&self, client_id: &str) -> bool {
        self.objects.remove_client(client_id)
    }

    pub fn client_object_stream(&self, client_id: &str) -> HubResult<ClientStream<Object>> {
        self.objects.client_stream(client_id)
    }

    /// Register an object client and take its channel atomically.
    pub fn subscribe_objects(&self, client_id: Option<&str>) -> ClientStream<Object> {
        self.objects.subscribe(client_id)
    }

    pub fn publish_object(&self, object: Object) {
        self.objects.publish(object);
    }

    // ---- Event stream ----

    pub fn add_event_stream_client(&self, client_id: Option<&str>) -> String {
        self.events.add_client(client_id)
    }

    pub fn remove_event_stream_client(&self, client_id: &str) -> bool {
        self.events.remove_client(client_id)
    }

    pub fn client_event_stream(&self, client_id: &str) -> HubResult<ClientStream<Event>> {
        self.events.client_stream(client_id)
    }

    /// Register an event client and take its channel atomically.
    pub fn subscribe_events(&self, client_id: Option<&str>) -> ClientStream<Event> {
        self.events.subscribe(client_id)
    }

    pub fn publish_event(&self, event: Event) {
        self.events.publish(event);
    }

    // ---- Topic access ----

    pub fn objects(&self) -> &Topic<Object> {
        &self.objects
    }

    pub fn events(&self) -> &Topic<Event> {
        &self.events
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
