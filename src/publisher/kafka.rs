//! Kafka delivery through an rdkafka producer

use log::info;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{BaseProducer, BaseRecord, Producer};
use std::time::Duration;

use super::{EventSink, PublishError};
use crate::simulation::PublishParams;

/// Kafka producer sink
pub struct KafkaSink {
    producer: BaseProducer,
}

impl KafkaSink {
    /// Create the producer and check the broker answers a metadata request
    pub fn connect(brokers: &str, topic: &str, params: &PublishParams) -> Result<Self, PublishError> {
        let producer: BaseProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("message.timeout.ms", params.message_timeout_ms.to_string())
            .create()
            .map_err(|err| PublishError::Connect(err.to_string()))?;

        producer
            .client()
            .fetch_metadata(Some(topic), Duration::from_secs(params.connect_timeout_secs))
            .map_err(|err| PublishError::Connect(format!("broker {} unreachable: {}", brokers, err)))?;

        info!("Kafka producer initialized for broker(s): {}", brokers);
        Ok(Self { producer })
    }
}

impl EventSink for KafkaSink {
    fn send(&mut self, topic: &str, key: Option<&[u8]>, payload: &[u8]) -> Result<(), PublishError> {
        let mut record = BaseRecord::<[u8], [u8]>::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        let result = self
            .producer
            .send(record)
            .map_err(|(err, _)| PublishError::Transport(err.to_string()));
        // Serve delivery callbacks so the local queue keeps draining
        self.producer.poll(Duration::ZERO);
        result
    }

    fn flush(&mut self, timeout: Duration) -> Result<(), PublishError> {
        self.producer
            .flush(timeout)
            .map_err(|err| PublishError::Transport(err.to_string()))
    }
}
