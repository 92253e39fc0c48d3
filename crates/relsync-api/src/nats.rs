//! NATS wiring: event subscriptions and the JetStream KV cache bucket.
//!
//! Everything NATS-specific lives here, behind the [`BusMessage`] and
//! [`KvBucket`] seams; the rest of the workspace never sees the client
//! types.

use std::sync::Arc;

use async_nats::jetstream;
use async_nats::jetstream::kv;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{error, info, warn};

use relsync_server::config::BusSettings;
use relsync_storage::{KvBucket, KvEntry, RelationClient, StoreError, StoreResult};

use crate::dispatch::{BusMessage, DispatchError, Dispatcher};
use crate::subjects;

/// A NATS message paired with the client used to answer it.
pub struct NatsMessage {
    client: async_nats::Client,
    message: async_nats::Message,
}

impl NatsMessage {
    pub fn new(client: async_nats::Client, message: async_nats::Message) -> Self {
        Self { client, message }
    }
}

#[async_trait]
impl BusMessage for NatsMessage {
    fn subject(&self) -> &str {
        self.message.subject.as_str()
    }

    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn reply(&self) -> Option<&str> {
        self.message.reply.as_ref().map(|s| s.as_str())
    }

    async fn respond(&self, data: &[u8]) -> Result<(), DispatchError> {
        let Some(reply) = self.message.reply.clone() else {
            return Ok(());
        };
        self.client
            .publish(reply, Bytes::copy_from_slice(data))
            .await
            .map_err(|e| DispatchError::Reply {
                message: e.to_string(),
            })
    }
}

/// The shared KV cache, backed by a JetStream key-value bucket.
pub struct JetStreamBucket {
    store: kv::Store,
}

impl JetStreamBucket {
    /// Opens the bucket, creating it when it does not exist yet.
    pub async fn open_or_create(
        context: &jetstream::Context,
        bucket: &str,
    ) -> anyhow::Result<Self> {
        let store = match context.get_key_value(bucket).await {
            Ok(store) => store,
            Err(_) => {
                info!(bucket, "cache bucket missing, creating it");
                context
                    .create_key_value(kv::Config {
                        bucket: bucket.to_string(),
                        ..Default::default()
                    })
                    .await?
            }
        };
        Ok(Self { store })
    }
}

fn to_chrono(created: time::OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(created.unix_timestamp(), created.nanosecond())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[async_trait]
impl KvBucket for JetStreamBucket {
    async fn get(&self, key: &str) -> StoreResult<Option<KvEntry>> {
        let entry = self
            .store
            .entry(key)
            .await
            .map_err(|e| StoreError::Transport {
                message: e.to_string(),
            })?;

        Ok(entry.and_then(|entry| {
            // Delete and purge markers mean the key is gone.
            (entry.operation == kv::Operation::Put).then(|| KvEntry {
                value: entry.value.to_vec(),
                created: to_chrono(entry.created),
            })
        }))
    }

    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<u64> {
        self.store
            .put(key, Bytes::copy_from_slice(value))
            .await
            .map_err(|e| StoreError::Transport {
                message: e.to_string(),
            })
    }
}

/// Subscribes to every handled subject and dispatches messages until the
/// connection closes.
///
/// Subscriptions share a queue group so horizontally-scaled instances
/// split the load. Events are processed concurrently up to the
/// configured in-flight bound; a handler failure is answered with the
/// error string when the producer supplied a reply inbox, and otherwise
/// only logged, leaving redelivery to the bus.
pub async fn run<C, K>(
    client: async_nats::Client,
    dispatcher: Arc<Dispatcher<C, K>>,
    settings: &BusSettings,
) -> anyhow::Result<()>
where
    C: RelationClient + 'static,
    K: KvBucket + 'static,
{
    let mut subscriptions = Vec::with_capacity(subjects::ALL.len());
    for subject in subjects::ALL {
        let subscription = client
            .queue_subscribe(subject.to_string(), settings.queue.clone())
            .await?;
        subscriptions.push(subscription);
    }
    info!(
        subjects = subjects::ALL.len(),
        queue = %settings.queue,
        "subscribed to bus subjects"
    );

    let merged = futures::stream::select_all(subscriptions);
    merged
        .for_each_concurrent(settings.max_in_flight, |message| {
            let dispatcher = Arc::clone(&dispatcher);
            let client = client.clone();
            async move {
                let message = NatsMessage::new(client, message);
                if let Err(err) = dispatcher.dispatch(&message).await {
                    error!(
                        subject = message.subject(),
                        error = %err,
                        "event handling failed"
                    );
                    if message.reply().is_some() {
                        if let Err(reply_err) =
                            message.respond(err.to_string().as_bytes()).await
                        {
                            warn!(error = %reply_err, "failed to send error reply");
                        }
                    }
                }
            }
        })
        .await;

    Ok(())
}
