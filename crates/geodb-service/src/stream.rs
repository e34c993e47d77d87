//! Filtered live streams of objects and proximity events.

use std::fmt::Display;

use async_trait::async_trait;
use geodb_hub::{ClientStream, Topic};
use geodb_kv::KvEngine;
use geodb_types::{Event, Object};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::GeoDb;
use crate::error::{ServiceError, ServiceResult};

/// Parameters of a streaming call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Reused when present and non-empty; otherwise a UUID is generated.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Only items whose key matches are forwarded. Empty means everything.
    #[serde(default)]
    pub regex: Option<String>,
}

impl StreamRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_regex(mut self, regex: impl Into<String>) -> Self {
        self.regex = Some(regex.into());
        self
    }

    /// Compile the filter. `None` when no pattern (or an empty one) was given.
    pub fn filter(&self) -> ServiceResult<Option<Regex>> {
        match self.regex.as_deref() {
            Some(pattern) if !pattern.is_empty() => Ok(Some(Regex::new(pattern)?)),
            _ => Ok(None),
        }
    }
}

/// Destination of a streaming call.
#[async_trait]
pub trait StreamSink<M: Send + 'static>: Send {
    type Error: Display + Send;

    async fn send(&mut self, message: M) -> Result<(), Self::Error>;
}

#[async_trait]
impl<M: Send + 'static> StreamSink<M> for mpsc::Sender<M> {
    type Error = mpsc::error::SendError<M>;

    async fn send(&mut self, message: M) -> Result<(), Self::Error> {
        mpsc::Sender::send(self, message).await
    }
}

impl<E: KvEngine> GeoDb<E> {
    /// Forward every written object whose key matches the request's filter
    /// to `sink` until `cancel` fires.
    ///
    /// An invalid pattern fails before the client is registered.
    pub async fn stream_objects<S: StreamSink<Object>>(
        &self,
        request: StreamRequest,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> ServiceResult<()> {
        let filter = request.filter()?;
        let stream = self.hub.subscribe_objects(request.client_id.as_deref());
        forward(self.hub.objects(), stream, filter, object_key, sink, cancel).await
    }

    /// Forward every proximity event whose trigger key matches the request's
    /// filter to `sink` until `cancel` fires.
    pub async fn stream_events<S: StreamSink<Event>>(
        &self,
        request: StreamRequest,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> ServiceResult<()> {
        let filter = request.filter()?;
        let stream = self.hub.subscribe_events(request.client_id.as_deref());
        forward(self.hub.events(), stream, filter, trigger_key, sink, cancel).await
    }
}

fn object_key(object: &Object) -> &str {
    &object.key
}

fn trigger_key(event: &Event) -> &str {
    &event.trigger_object.key
}

async fn forward<T, S>(
    topic: &Topic<T>,
    mut stream: ClientStream<T>,
    filter: Option<Regex>,
    key_of: fn(&T) -> &str,
    sink: &mut S,
    cancel: CancellationToken,
) -> ServiceResult<()>
where
    T: Clone + Send + 'static,
    S: StreamSink<T>,
{
    info!(topic = topic.name(), client_id = %stream.client_id(), "stream opened");

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => None,
            item = stream.recv() => Some(item),
        };

        let item = match received {
            None => {
                cancelled(topic, &stream);
                return Ok(());
            }
            Some(None) => {
                warn!(topic = topic.name(), client_id = %stream.client_id(), "delivery channel closed");
                return Err(ServiceError::StreamClosed {
                    client_id: stream.client_id().to_string(),
                });
            }
            Some(Some(item)) => item,
        };

        if let Some(filter) = &filter {
            if !filter.is_match(key_of(&item)) {
                debug!(topic = topic.name(), client_id = %stream.client_id(), "filtered out");
                continue;
            }
        }

        // Cancellation also wins over a stalled sink.
        let delivered = tokio::select! {
            _ = cancel.cancelled() => None,
            result = sink.send(item) => Some(result),
        };
        match delivered {
            None => {
                cancelled(topic, &stream);
                return Ok(());
            }
            Some(Err(e)) => {
                warn!(topic = topic.name(), client_id = %stream.client_id(), error = %e, "delivery failed");
            }
            Some(Ok(())) => {}
        }
    }
}

fn cancelled<T: Clone + Send + 'static>(topic: &Topic<T>, stream: &ClientStream<T>) {
    topic.release(stream);
    info!(topic = topic.name(), client_id = %stream.client_id(), "stream cancelled");
}
