//! # Pub/Sub
//!
//! Publishing side: [`PubSubClient`] queues [`PublishMessage`]s for a background
//! [`PublishBuffer`], which flushes them when `buffer_size` messages are pending or the
//! `buffer_time_span` window elapses. When the last client is dropped, the buffer
//! flushes whatever is left and stops.
//!
//! ```rust,ignore
//! let (buffer, client) = PublishBuffer::new(options, transport);
//! let handle = tokio::spawn(buffer.run());
//! client.publish("orders", json!({"total": 10}), "order-1").await?;
//! drop(client);
//! handle.await?; // remaining messages are flushed
//! ```
//!
//! Subscribing side: [`Subscriptions`] dispatches topic messages to handlers and maps
//! handler failures to a [`PubSubStatus`] for the broker.
use crate::config::PubSubOptions;
use crate::context::ContextStore;
use crate::error::{ActorError, Result};
use crate::registry::ActorClientRegistry;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const PARTITION_KEY: &str = "partitionKey";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishMessage {
    pub id: Uuid,
    pub name: String,
    pub topic: String,
    pub producer_id: Option<String>,
    pub payload: Value,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub content_type: Option<String>,
}

impl PublishMessage {
    pub fn new(name: impl Into<String>, topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            topic: topic.into(),
            producer_id: None,
            payload,
            metadata: BTreeMap::new(),
            content_type: None,
        }
    }

    /// Metadata sent with a direct publish: the producer id becomes the partition key,
    /// unless the message already sets one.
    pub fn publish_metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = self.metadata.clone();
        if let Some(producer_id) = &self.producer_id {
            metadata
                .entry(PARTITION_KEY.to_string())
                .or_insert_with(|| producer_id.clone());
        }
        metadata
    }
}

/// Broker-facing publish API.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    async fn publish(
        &self,
        name: &str,
        topic: &str,
        payload: &Value,
        metadata: &BTreeMap<String, String>,
    ) -> Result<()>;

    async fn publish_bulk(
        &self,
        name: &str,
        topic: &str,
        payloads: &[Value],
        metadata: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// Receives messages whose publish failed.
pub trait PublishErrorHandler: Send + Sync {
    fn on_publish_error(&self, messages: &[PublishMessage], error: &ActorError);
}

#[derive(Debug, Default)]
pub struct LogPublishErrors;

impl PublishErrorHandler for LogPublishErrors {
    fn on_publish_error(&self, messages: &[PublishMessage], error: &ActorError) {
        for message in messages {
            error!(
                message_id = %message.id,
                name = %message.name,
                topic = %message.topic,
                error = %error,
                "Failed to publish message"
            );
        }
    }
}

/// One unit of work of a flush.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushBatch {
    Single(PublishMessage),
    Bulk {
        name: String,
        topic: String,
        producer_id: Option<String>,
        messages: Vec<PublishMessage>,
    },
}

/// Groups pending messages by `(name, topic, producer_id)` in first-seen order.
pub fn plan_flush(messages: Vec<PublishMessage>) -> Vec<FlushBatch> {
    if messages.len() == 1 {
        return messages.into_iter().map(FlushBatch::Single).collect();
    }

    type GroupKey = (String, String, Option<String>);
    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: HashMap<GroupKey, Vec<PublishMessage>> = HashMap::new();
    for message in messages {
        let key = (
            message.name.clone(),
            message.topic.clone(),
            message.producer_id.clone(),
        );
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(message);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let mut messages = groups.remove(&key)?;
            if messages.len() == 1 {
                return messages.pop().map(FlushBatch::Single);
            }
            let (name, topic, producer_id) = key;
            Some(FlushBatch::Bulk {
                name,
                topic,
                producer_id,
                messages,
            })
        })
        .collect()
}

enum BufferCommand {
    Publish(PublishMessage),
    Flush(oneshot::Sender<()>),
}

/// Background worker that owns the pending messages.
pub struct PublishBuffer {
    receiver: mpsc::Receiver<BufferCommand>,
    transport: Arc<dyn PubSubTransport>,
    error_handler: Arc<dyn PublishErrorHandler>,
    options: PubSubOptions,
}

impl PublishBuffer {
    pub fn new(
        options: PubSubOptions,
        transport: Arc<dyn PubSubTransport>,
    ) -> (Self, PubSubClient) {
        Self::with_error_handler(options, transport, Arc::new(LogPublishErrors))
    }

    pub fn with_error_handler(
        options: PubSubOptions,
        transport: Arc<dyn PubSubTransport>,
        error_handler: Arc<dyn PublishErrorHandler>,
    ) -> (Self, PubSubClient) {
        let (sender, receiver) = mpsc::channel(options.buffer_size.max(1) * 16);
        let client = PubSubClient {
            sender,
            transport: transport.clone(),
            default_name: options.default_name.clone(),
        };
        let buffer = Self {
            receiver,
            transport,
            error_handler,
            options,
        };
        (buffer, client)
    }

    /// Runs until every client is dropped, then flushes what is left.
    pub async fn run(mut self) {
        info!(
            buffer_size = self.options.buffer_size,
            window_ms = self.options.buffer_time_span_ms,
            "Publish buffer started"
        );
        let mut pending: Vec<PublishMessage> = Vec::with_capacity(self.options.buffer_size);
        let mut window = tokio::time::interval(self.options.buffer_time_span());
        window.set_missed_tick_behavior(MissedTickBehavior::Delay);
        window.tick().await;

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(BufferCommand::Publish(message)) => {
                        pending.push(message);
                        if pending.len() >= self.options.buffer_size {
                            self.flush(&mut pending).await;
                        }
                    }
                    Some(BufferCommand::Flush(respond_to)) => {
                        self.flush(&mut pending).await;
                        let _ = respond_to.send(());
                    }
                    None => break,
                },
                _ = window.tick() => {
                    if !pending.is_empty() {
                        self.flush(&mut pending).await;
                    }
                }
            }
        }

        self.flush(&mut pending).await;
        info!("Publish buffer stopped");
    }

    async fn flush(&self, pending: &mut Vec<PublishMessage>) {
        if pending.is_empty() {
            return;
        }
        let messages = std::mem::take(pending);
        debug!(count = messages.len(), "Flushing publish buffer");
        for batch in plan_flush(messages) {
            match batch {
                FlushBatch::Single(message) => {
                    if let Err(e) = publish_single(self.transport.as_ref(), &message).await {
                        self.error_handler.on_publish_error(&[message], &e);
                    }
                }
                FlushBatch::Bulk {
                    name,
                    topic,
                    producer_id,
                    messages,
                } => {
                    let payloads: Vec<Value> = messages.iter().map(|m| m.payload.clone()).collect();
                    let mut metadata = BTreeMap::new();
                    if let Some(producer_id) = producer_id {
                        metadata.insert(PARTITION_KEY.to_string(), producer_id);
                    }
                    if let Err(e) = self
                        .transport
                        .publish_bulk(&name, &topic, &payloads, &metadata)
                        .await
                    {
                        self.error_handler.on_publish_error(&messages, &e);
                    }
                }
            }
        }
    }
}

async fn publish_single(transport: &dyn PubSubTransport, message: &PublishMessage) -> Result<()> {
    transport
        .publish(
            &message.name,
            &message.topic,
            &message.payload,
            &message.publish_metadata(),
        )
        .await
}

/// Options for [`PubSubClient::publish_with`].
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub name: Option<String>,
    pub topic: String,
    pub producer_id: Option<String>,
    pub payload: Value,
    pub buffer: bool,
    pub metadata: BTreeMap<String, String>,
    pub content_type: Option<String>,
}

impl PublishOptions {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            name: None,
            topic: topic.into(),
            producer_id: None,
            payload,
            buffer: true,
            metadata: BTreeMap::new(),
            content_type: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn producer(mut self, producer_id: impl Into<String>) -> Self {
        self.producer_id = Some(producer_id.into());
        self
    }

    /// Skip the buffer and publish before returning.
    pub fn direct(mut self) -> Self {
        self.buffer = false;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Clone)]
pub struct PubSubClient {
    sender: mpsc::Sender<BufferCommand>,
    transport: Arc<dyn PubSubTransport>,
    default_name: String,
}

impl PubSubClient {
    /// Buffered publish on the default pubsub.
    pub async fn publish(&self, topic: &str, payload: Value, producer_id: &str) -> Result<()> {
        self.publish_with(PublishOptions::new(topic, payload).producer(producer_id))
            .await
    }

    pub async fn publish_with(&self, request: PublishOptions) -> Result<()> {
        let name = request
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.default_name.clone());
        let message = PublishMessage {
            id: Uuid::new_v4(),
            name,
            topic: request.topic,
            producer_id: request.producer_id,
            payload: request.payload,
            metadata: request.metadata,
            content_type: request.content_type,
        };

        if !request.buffer {
            debug!(message_id = %message.id, topic = %message.topic, "Publishing directly");
            return publish_single(self.transport.as_ref(), &message).await;
        }
        self.sender
            .send(BufferCommand::Publish(message))
            .await
            .map_err(|_| ActorError::Transport("publish buffer is closed".into()))
    }

    /// Flushes everything queued so far and waits for it to be published.
    pub async fn flush(&self) -> Result<()> {
        let (respond_to, done) = oneshot::channel();
        self.sender
            .send(BufferCommand::Flush(respond_to))
            .await
            .map_err(|_| ActorError::Transport("publish buffer is closed".into()))?;
        done.await
            .map_err(|_| ActorError::Transport("publish buffer dropped the flush".into()))
    }
}

/// Acknowledgement returned to the broker for one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PubSubStatus {
    Success,
    Retry,
    Drop,
}

#[async_trait]
pub trait TopicHandler: Send + Sync {
    async fn handle(&self, data: Value) -> Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> TopicHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, data: Value) -> Result<()> {
        (self.0)(data).await
    }
}

pub type ErrorPolicy = Arc<dyn Fn(&str, &str, &ActorError) -> PubSubStatus + Send + Sync>;

/// Topic subscriptions of this process.
#[derive(Default)]
pub struct Subscriptions {
    handlers: RwLock<HashMap<(String, String), Arc<dyn TopicHandler>>>,
    on_error: RwLock<Option<ErrorPolicy>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, name: &str, topic: &str, handler: Arc<dyn TopicHandler>) {
        info!(name, topic, "Subscribing");
        self.handlers
            .write()
            .insert((name.to_string(), topic.to_string()), handler);
    }

    pub fn subscribe_fn<F, Fut>(&self, name: &str, topic: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.subscribe(name, topic, Arc::new(FnHandler(handler)));
    }

    /// Replaces the default policy, which asks the broker to retry.
    pub fn set_error_policy(
        &self,
        policy: impl Fn(&str, &str, &ActorError) -> PubSubStatus + Send + Sync + 'static,
    ) {
        *self.on_error.write() = Some(Arc::new(policy));
    }

    pub fn topics(&self) -> Vec<(String, String)> {
        let mut topics: Vec<(String, String)> = self.handlers.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Delivers one message. Each delivery starts a new call chain.
    pub async fn dispatch(&self, name: &str, topic: &str, data: Value) -> PubSubStatus {
        let handler = self
            .handlers
            .read()
            .get(&(name.to_string(), topic.to_string()))
            .cloned();
        let Some(handler) = handler else {
            warn!(name, topic, "No subscription for topic, dropping message");
            return PubSubStatus::Drop;
        };

        match ContextStore::scope(handler.handle(data)).await {
            Ok(()) => PubSubStatus::Success,
            Err(e) => {
                error!(name, topic, error = %e, "Error in pubsub handler");
                let policy = self.on_error.read().clone();
                let status = match policy {
                    Some(policy) => policy(name, topic, &e),
                    None => PubSubStatus::Retry,
                };
                match status {
                    PubSubStatus::Retry => info!(topic, "Retrying pubsub handler"),
                    PubSubStatus::Drop => debug!(topic, "Dropping message"),
                    PubSubStatus::Success => {}
                }
                status
            }
        }
    }
}

/// Routes topic messages to one method of an actor, picking the actor id from the
/// message itself.
pub struct ActorTopicRoute {
    registry: Arc<ActorClientRegistry>,
    actor_type: String,
    method: String,
    actor_id: fn(&Value) -> Option<String>,
}

impl ActorTopicRoute {
    pub fn new(
        registry: Arc<ActorClientRegistry>,
        actor_type: impl Into<String>,
        method: impl Into<String>,
        actor_id: fn(&Value) -> Option<String>,
    ) -> Self {
        Self {
            registry,
            actor_type: actor_type.into(),
            method: method.into(),
            actor_id,
        }
    }
}

#[async_trait]
impl TopicHandler for ActorTopicRoute {
    async fn handle(&self, data: Value) -> Result<()> {
        let id = (self.actor_id)(&data).ok_or_else(|| {
            ActorError::NotFound(format!("no actor id in message for {}", self.actor_type))
        })?;
        let proxy = self.registry.get_actor(&self.actor_type, &id)?;
        proxy.call(&self.method, vec![data]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(name: &str, topic: &str, producer: Option<&str>, n: i64) -> PublishMessage {
        let mut m = PublishMessage::new(name, topic, json!(n));
        m.producer_id = producer.map(str::to_owned);
        m
    }

    #[test]
    fn single_pending_message_is_published_directly() {
        let batches = plan_flush(vec![message("pubsub", "orders", Some("p1"), 1)]);
        assert!(matches!(batches.as_slice(), [FlushBatch::Single(_)]));
    }

    #[test]
    fn groups_by_name_topic_and_producer() {
        let batches = plan_flush(vec![
            message("pubsub", "orders", Some("p1"), 1),
            message("pubsub", "orders", Some("p2"), 2),
            message("pubsub", "orders", Some("p1"), 3),
            message("other", "orders", Some("p1"), 4),
        ]);
        assert_eq!(batches.len(), 3);
        match &batches[0] {
            FlushBatch::Bulk {
                producer_id,
                messages,
                ..
            } => {
                assert_eq!(producer_id.as_deref(), Some("p1"));
                let payloads: Vec<&Value> = messages.iter().map(|m| &m.payload).collect();
                assert_eq!(payloads, vec![&json!(1), &json!(3)]);
            }
            other => panic!("expected bulk batch, got {other:?}"),
        }
        assert!(matches!(&batches[1], FlushBatch::Single(m) if m.payload == json!(2)));
        assert!(matches!(&batches[2], FlushBatch::Single(m) if m.name == "other"));
    }

    #[test]
    fn names_containing_colons_stay_intact() {
        let batches = plan_flush(vec![
            message("ns:pubsub", "a:b", Some("p:1"), 1),
            message("ns:pubsub", "a:b", Some("p:1"), 2),
        ]);
        match &batches[0] {
            FlushBatch::Bulk {
                name,
                topic,
                producer_id,
                ..
            } => {
                assert_eq!(name, "ns:pubsub");
                assert_eq!(topic, "a:b");
                assert_eq!(producer_id.as_deref(), Some("p:1"));
            }
            other => panic!("expected bulk batch, got {other:?}"),
        }
    }

    #[test]
    fn producer_becomes_partition_key() {
        let mut m = message("pubsub", "orders", Some("p1"), 1);
        m.metadata.insert("ttl".into(), "60".into());
        let metadata = m.publish_metadata();
        assert_eq!(metadata.get(PARTITION_KEY).map(String::as_str), Some("p1"));
        assert_eq!(metadata.get("ttl").map(String::as_str), Some("60"));
    }

    #[tokio::test]
    async fn handler_errors_default_to_retry() {
        let subscriptions = Subscriptions::new();
        subscriptions.subscribe_fn("pubsub", "ok", |_| async { Ok(()) });
        subscriptions.subscribe_fn("pubsub", "fails", |_| async {
            Err(ActorError::Unexpected("boom".into()))
        });

        assert_eq!(
            subscriptions.dispatch("pubsub", "ok", json!({})).await,
            PubSubStatus::Success
        );
        assert_eq!(
            subscriptions.dispatch("pubsub", "fails", json!({})).await,
            PubSubStatus::Retry
        );
        assert_eq!(
            subscriptions.dispatch("pubsub", "missing", json!({})).await,
            PubSubStatus::Drop
        );

        subscriptions.set_error_policy(|_, topic, _| {
            if topic == "fails" {
                PubSubStatus::Drop
            } else {
                PubSubStatus::Retry
            }
        });
        assert_eq!(
            subscriptions.dispatch("pubsub", "fails", json!({})).await,
            PubSubStatus::Drop
        );
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(serde_json::to_value(PubSubStatus::Retry).unwrap(), json!("RETRY"));
    }
}
