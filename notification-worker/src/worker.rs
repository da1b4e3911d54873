use crate::tasks::{NotificationSender, TicketRenderer};
use box_office::correlation::{self, CORRELATION_HEADER};
use box_office::domain::SeatSold;
use box_office::kafka::{KafkaConsumer, KafkaMessage};
use box_office::metrics::Metrics;
use box_office::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// What the worker tells the transport after handling a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Fully processed: permanently remove the message.
    Ack,
    /// Something failed: return the message for redelivery, never drop it.
    Requeue,
}

/// Runs the downstream tasks for one sold-seat message: ticket rendering,
/// then notification dispatch, sequentially. Delivery is at-least-once, so
/// every task must tolerate reprocessing.
pub struct SoldSeatProcessor {
    renderer: Box<dyn TicketRenderer>,
    notifier: Box<dyn NotificationSender>,
    metrics: Option<Arc<Metrics>>,
}

impl SoldSeatProcessor {
    pub fn new(renderer: Box<dyn TicketRenderer>, notifier: Box<dyn NotificationSender>) -> Self {
        Self {
            renderer,
            notifier,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn handle(&self, message: &KafkaMessage) -> Disposition {
        let disposition = self.handle_inner(message).await;
        if let Some(metrics) = &self.metrics {
            match disposition {
                Disposition::Ack => metrics.worker_messages_processed.inc(),
                Disposition::Requeue => metrics.worker_messages_requeued.inc(),
            }
        }
        disposition
    }

    async fn handle_inner(&self, message: &KafkaMessage) -> Disposition {
        let sale: SeatSold = match message.deserialize_value() {
            Ok(sale) => sale,
            Err(e) => {
                error!(
                    "Undecodable message at {}[{}]@{}: {}",
                    message.topic, message.partition, message.offset, e
                );
                return Disposition::Requeue;
            }
        };

        // Header beats body beats a fresh id.
        let correlation_id = correlation::resolve(
            message.header(CORRELATION_HEADER),
            Some(sale.correlation_id.as_str()),
        );

        let outcome = correlation::with_correlation_id(correlation_id.clone(), async {
            self.renderer.render(&sale).await?;
            self.notifier.send(&sale).await?;
            Ok::<(), box_office::BoxOfficeError>(())
        })
        .await;

        match outcome {
            Ok(()) => {
                info!(
                    "Processed sale of seat {} correlation_id={}",
                    sale.seat_id, correlation_id
                );
                Disposition::Ack
            }
            Err(e) => {
                warn!(
                    "Processing sale of seat {} failed, requeueing (correlation_id={}): {}",
                    sale.seat_id, correlation_id, e
                );
                Disposition::Requeue
            }
        }
    }
}

/// Consumer loop with exactly one message in flight: the next message is
/// not fetched until the current one is committed or re-sought.
pub struct NotificationWorker {
    consumer: KafkaConsumer,
    processor: SoldSeatProcessor,
}

impl NotificationWorker {
    pub fn new(consumer: KafkaConsumer, processor: SoldSeatProcessor) -> Self {
        Self { consumer, processor }
    }

    pub async fn run(self) -> Result<()> {
        info!("Notification worker is running...");

        loop {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }

                message_result = self.consumer.recv_message(Duration::from_millis(100)) => {
                    match message_result? {
                        Some(message) => self.settle(&message).await,
                        None => continue,
                    }
                }
            }
        }

        // The in-flight message, if any, finished inside the loop body
        // before we got here; only then is the channel closed.
        info!("Notification worker shutting down...");
        self.consumer.close();
        Ok(())
    }

    async fn settle(&self, message: &KafkaMessage) {
        match self.processor.handle(message).await {
            Disposition::Ack => {
                if let Err(e) = self.consumer.ack(message) {
                    error!("Error committing message: {}", e);
                }
            }
            Disposition::Requeue => {
                if let Err(e) = self.consumer.nack_requeue(message) {
                    error!("Error requeueing message: {}", e);
                }
            }
        }
    }
}
