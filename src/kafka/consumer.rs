use crate::{BoxOfficeError, Result};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Headers;
use rdkafka::{ClientConfig, Message, TopicPartitionList};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

/// Manual-acknowledgment consumer. The worker loop pulls one message,
/// finishes it, and only then fetches the next, so exactly one message is
/// in flight at a time.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let consumer: StreamConsumer = config.create()?;
        Ok(Self { consumer })
    }

    pub fn subscribe(&self, topics: &[&str]) -> Result<()> {
        self.consumer.subscribe(topics)?;
        Ok(())
    }

    pub async fn recv_message(&self, timeout_duration: Duration) -> Result<Option<KafkaMessage>> {
        match timeout(timeout_duration, self.consumer.recv()).await {
            Ok(Ok(message)) => {
                let key = message
                    .key()
                    .map(|k| String::from_utf8_lossy(k).to_string());

                let payload = message
                    .payload()
                    .map(|p| String::from_utf8_lossy(p).to_string());

                let mut headers = HashMap::new();
                if let Some(borrowed) = message.headers() {
                    for header in borrowed.iter() {
                        if let Some(value) = header.value {
                            headers.insert(
                                header.key.to_string(),
                                String::from_utf8_lossy(value).to_string(),
                            );
                        }
                    }
                }

                Ok(Some(KafkaMessage {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                    key,
                    payload,
                    headers,
                }))
            }
            Ok(Err(e)) => Err(BoxOfficeError::Kafka(e)),
            Err(_) => Ok(None), // Timeout
        }
    }

    /// Acknowledge: commit past the message so it is never redelivered.
    pub fn ack(&self, message: &KafkaMessage) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            rdkafka::Offset::Offset(message.offset + 1),
        )?;
        self.consumer
            .commit(&tpl, rdkafka::consumer::CommitMode::Sync)?;
        Ok(())
    }

    /// Negative acknowledgment with requeue: seek back to the failed
    /// message's offset so the same message is redelivered before any later
    /// one. Nothing is committed, nothing is dropped.
    pub fn nack_requeue(&self, message: &KafkaMessage) -> Result<()> {
        self.consumer.seek(
            &message.topic,
            message.partition,
            rdkafka::Offset::Offset(message.offset),
            Duration::from_secs(5),
        )?;
        Ok(())
    }

    pub fn close(self) {
        self.consumer.unsubscribe();
    }
}

#[derive(Debug, Clone)]
pub struct KafkaMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Option<String>,
    pub headers: HashMap<String, String>,
}

impl KafkaMessage {
    pub fn deserialize_value<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match &self.payload {
            Some(payload) => {
                let value = serde_json::from_str(payload)?;
                Ok(value)
            }
            None => Err(BoxOfficeError::InvalidArgument(
                "Empty message payload".to_string(),
            )),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}
