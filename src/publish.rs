use crate::correlation::{self, CORRELATION_HEADER};
use crate::kafka::KafkaProducer;
use crate::metrics::Metrics;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::Result;
use async_trait::async_trait;
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Non-blocking notification dispatch. `publish` never raises to its
/// caller: every transport failure is logged and swallowed. The correlation
/// id comes from the explicit argument, or from the ambient operation
/// context when absent.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
        correlation_id: Option<String>,
    );

    /// Drain anything buffered. Used during shutdown.
    async fn flush(&self) {}
}

/// Kafka-backed publisher with one shared, lazily established producer per
/// process. The first use connects with bounded exponential backoff; a
/// failed connection surfaces only to that attempt. On a transport error
/// the producer slot is cleared and re-established on next use.
pub struct KafkaEventPublisher {
    client_config: ClientConfig,
    retry: RetryConfig,
    producer: Mutex<Option<KafkaProducer>>,
    metrics: Option<Arc<Metrics>>,
}

impl KafkaEventPublisher {
    pub fn new(client_config: ClientConfig, retry: RetryConfig) -> Self {
        Self {
            client_config,
            retry,
            producer: Mutex::new(None),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn producer(&self) -> Result<KafkaProducer> {
        let mut slot = self.producer.lock().await;
        if let Some(producer) = slot.as_ref() {
            return Ok(producer.clone());
        }

        let config = self.client_config.clone();
        let producer = retry_with_backoff(&self.retry, "kafka-producer-connect", || {
            let config = config.clone();
            async move { KafkaProducer::new(config) }
        })
        .await?;

        *slot = Some(producer.clone());
        Ok(producer)
    }

    async fn reset(&self) {
        *self.producer.lock().await = None;
    }

    fn record_outcome(&self, success: bool) {
        if let Some(m) = &self.metrics {
            if success {
                m.events_published.inc();
            } else {
                m.publish_failures.inc();
            }
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
        correlation_id: Option<String>,
    ) {
        let correlation_id = correlation_id.unwrap_or_else(correlation::current_or_generate);

        let producer = match self.producer().await {
            Ok(producer) => producer,
            Err(e) => {
                error!(
                    "Publish to {} dropped, producer unavailable: {}",
                    topic, e
                );
                self.record_outcome(false);
                return;
            }
        };

        let headers = [(CORRELATION_HEADER, correlation_id.as_str())];
        match producer.send(topic, key, &payload, &headers).await {
            Ok(()) => {
                debug!(
                    "Published to {} key={} correlation_id={}",
                    topic, key, correlation_id
                );
                self.record_outcome(true);
            }
            Err(e) => {
                error!("Publish to {} key={} failed: {}", topic, key, e);
                self.record_outcome(false);
                // Force a fresh connection on the next publish.
                self.reset().await;
            }
        }
    }

    async fn flush(&self) {
        let slot = self.producer.lock().await;
        if let Some(producer) = slot.as_ref() {
            if let Err(e) = producer.flush(Duration::from_secs(10)).await {
                error!("Producer flush failed: {}", e);
            }
        }
    }
}

/// Publisher for disabled configurations. Accepts and discards everything.
#[derive(Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        _payload: serde_json::Value,
        _correlation_id: Option<String>,
    ) {
        debug!("Publishing disabled, dropping event for {} key={}", topic, key);
    }
}
