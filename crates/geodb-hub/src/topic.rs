use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{HubConfig, OverflowPolicy};
use crate::error::{HubError, HubResult};

/// The receiving half of one client's registration.
///
/// Yields `None` once the registration is removed, replaced by a newer
/// registration under the same ID, or disconnected for overflow.
#[derive(Debug)]
pub struct ClientStream<T> {
    client_id: String,
    generation: u64,
    receiver: mpsc::Receiver<T>,
}

impl<T> ClientStream<T> {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Registration generation, unique within a topic.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the next item.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// One registered client. Dropping the slot drops the only sender, which
/// closes the channel for whoever holds the receiver.
struct Slot<T> {
    sender: mpsc::Sender<T>,
    receiver: Option<mpsc::Receiver<T>>,
    generation: u64,
}

struct Clients<T> {
    slots: HashMap<String, Slot<T>>,
    next_generation: u64,
}

/// Client table plus ingress queue for one kind of broadcast item.
///
/// Membership changes and dispatch are serialized by a single mutex; dispatch
/// never waits on a client, so holding it across fan-out is cheap.
pub struct Topic<T> {
    name: &'static str,
    config: HubConfig,
    clients: Mutex<Clients<T>>,
    ingress_tx: mpsc::UnboundedSender<T>,
    ingress_rx: Mutex<Option<mpsc::UnboundedReceiver<T>>>,
}

impl<T: Clone + Send + 'static> Topic<T> {
    pub fn new(name: &'static str, config: HubConfig) -> Self {
        let (ingress_tx, ingress_rx) = mpsc::unbounded_channel();
        Self {
            name,
            config,
            clients: Mutex::new(Clients {
                slots: HashMap::new(),
                next_generation: 1,
            }),
            ingress_tx,
            ingress_rx: Mutex::new(Some(ingress_rx)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a client and return its effective ID.
    ///
    /// A missing or empty ID is replaced with a fresh UUID. Registering an ID
    /// that is already present replaces its channel and closes the old one.
    pub fn add_client(&self, client_id: Option<&str>) -> String {
        let (sender, receiver) = mpsc::channel(self.config.effective_buffer());
        let mut clients = self.lock();
        self.register(&mut clients, client_id, sender, Some(receiver))
            .0
    }

    /// Register a client and take its delivery channel in one step.
    pub fn subscribe(&self, client_id: Option<&str>) -> ClientStream<T> {
        let (sender, receiver) = mpsc::channel(self.config.effective_buffer());
        let mut clients = self.lock();
        let (client_id, generation) = self.register(&mut clients, client_id, sender, None);
        ClientStream {
            client_id,
            generation,
            receiver,
        }
    }

    fn register(
        &self,
        clients: &mut Clients<T>,
        client_id: Option<&str>,
        sender: mpsc::Sender<T>,
        receiver: Option<mpsc::Receiver<T>>,
    ) -> (String, u64) {
        let client_id = match client_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let generation = clients.next_generation;
        clients.next_generation += 1;

        let previous = clients.slots.insert(
            client_id.clone(),
            Slot {
                sender,
                receiver,
                generation,
            },
        );
        if let Some(previous) = previous {
            warn!(
                topic = self.name,
                client_id = %client_id,
                replaced_generation = previous.generation,
                "client re-registered; previous channel closed"
            );
        }

        debug!(topic = self.name, client_id = %client_id, generation, "client added");
        (client_id, generation)
    }

    /// Deregister a client, closing its channel. Returns `true` if it existed.
    pub fn remove_client(&self, client_id: &str) -> bool {
        let removed = self.lock().slots.remove(client_id).is_some();
        if removed {
            debug!(topic = self.name, client_id = %client_id, "client removed");
        }
        removed
    }

    /// Hand out the delivery channel of a registered client.
    ///
    /// The receiving half can be taken once per registration.
    pub fn client_stream(&self, client_id: &str) -> HubResult<ClientStream<T>> {
        let mut clients = self.lock();
        let slot = clients
            .slots
            .get_mut(client_id)
            .ok_or_else(|| HubError::ClientNotFound {
                topic: self.name,
                client_id: client_id.to_string(),
            })?;
        let receiver = slot.receiver.take().ok_or_else(|| HubError::StreamTaken {
            topic: self.name,
            client_id: client_id.to_string(),
        })?;
        Ok(ClientStream {
            client_id: client_id.to_string(),
            generation: slot.generation,
            receiver,
        })
    }

    /// Deregister `stream`'s client only if it is still the current
    /// registration for that ID.
    pub fn release(&self, stream: &ClientStream<T>) -> bool {
        let mut clients = self.lock();
        let current = clients
            .slots
            .get(&stream.client_id)
            .is_some_and(|slot| slot.generation == stream.generation);
        if current {
            clients.slots.remove(&stream.client_id);
            debug!(topic = self.name, client_id = %stream.client_id, "client released");
        }
        current
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.lock().slots.contains_key(client_id)
    }

    pub fn client_count(&self) -> usize {
        self.lock().slots.len()
    }

    /// Queue an item for the dispatch loop. Never blocks.
    pub fn publish(&self, item: T) {
        if self.ingress_tx.send(item).is_err() {
            debug!(topic = self.name, "ingress closed; item dropped");
        }
    }

    /// Deliver one item to every registered client. Returns the number of
    /// clients that accepted it.
    pub fn dispatch(&self, item: &T) -> usize {
        let mut clients = self.lock();
        let mut delivered = 0;
        let mut evicted = Vec::new();

        for (client_id, slot) in &clients.slots {
            match slot.sender.try_send(item.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => match self.config.overflow {
                    OverflowPolicy::DropMessage => {
                        warn!(topic = self.name, client_id = %client_id, "client buffer full; item dropped");
                    }
                    OverflowPolicy::Disconnect => {
                        warn!(topic = self.name, client_id = %client_id, "client buffer full; disconnecting");
                        evicted.push(client_id.clone());
                    }
                },
                Err(TrySendError::Closed(_)) => {
                    debug!(topic = self.name, client_id = %client_id, "client stream dropped; pruning");
                    evicted.push(client_id.clone());
                }
            }
        }

        for client_id in evicted {
            clients.slots.remove(&client_id);
        }
        delivered
    }

    pub(crate) fn take_ingress(&self) -> HubResult<mpsc::UnboundedReceiver<T>> {
        self.ingress_rx
            .lock()
            .expect("topic ingress lock poisoned")
            .take()
            .ok_or(HubError::AlreadyStarted)
    }

    /// Drain the ingress queue until `cancel` fires.
    pub(crate) async fn run(
        self: Arc<Self>,
        mut ingress: mpsc::UnboundedReceiver<T>,
        cancel: CancellationToken,
    ) {
        info!(topic = self.name, "dispatch loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = ingress.recv() => match next {
                    Some(item) => {
                        let delivered = self.dispatch(&item);
                        debug!(topic = self.name, delivered, "item dispatched");
                    }
                    None => break,
                },
            }
        }
        info!(topic = self.name, "dispatch loop stopped");
    }

    fn lock(&self) -> MutexGuard<'_, Clients<T>> {
        self.clients.lock().expect("client table lock poisoned")
    }
}

impl<T> std::fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clients = self.clients.lock().map(|c| c.slots.len()).unwrap_or(0);
        f.debug_struct("Topic")
            .field("name", &self.name)
            .field("clients", &clients)
            .finish()
    }
}
