use crate::{BoxOfficeError, Result};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use serde::Serialize;
use std::time::Duration;

#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let producer: FutureProducer = config.create()?;
        Ok(Self { producer })
    }

    pub async fn send<T>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
        headers: &[(&str, &str)],
    ) -> Result<()>
    where
        T: Serialize,
    {
        let payload = serde_json::to_string(value)?;

        let mut owned_headers = OwnedHeaders::new();
        for (name, value) in headers {
            owned_headers = owned_headers.insert(Header {
                key: name,
                value: Some(*value),
            });
        }

        let record = FutureRecord::to(topic)
            .key(key)
            .payload(&payload)
            .headers(owned_headers);

        self.producer
            .send(record, Duration::from_secs(10))
            .await
            .map_err(|(kafka_err, _)| BoxOfficeError::Kafka(kafka_err))?;

        Ok(())
    }

    pub async fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout)?;
        Ok(())
    }
}
