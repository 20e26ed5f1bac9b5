//! Delivery of status events to the message broker
//!
//! The simulation hands snapshots to a [`Publisher`], which serializes them and
//! queues them for a dedicated worker thread. Only the worker talks to the
//! [`EventSink`], so broker latency or outages never stall a tick.

#[cfg(feature = "kafka")]
mod kafka;
mod sink;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, info, warn};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::simulation::{FleetConfig, PublishParams, SinkKind, StatusSnapshot};

#[cfg(feature = "kafka")]
pub use kafka::KafkaSink;
pub use sink::{EventSink, WriterSink};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot connect to broker: {0}")]
    Connect(String),

    #[error("publisher is shut down")]
    Closed,
}

/// Outcome of the delivery worker once the queue is drained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: u64,
    /// Events given up on after exhausting retries
    pub dropped: u64,
    pub flushed: bool,
}

struct Envelope {
    key: Vec<u8>,
    payload: Vec<u8>,
}

/// Buffered, asynchronous publisher of status snapshots
pub struct Publisher {
    sender: Option<Sender<Envelope>>,
    worker: Option<JoinHandle<DeliveryReport>>,
}

impl Publisher {
    /// Spawn the delivery worker for `sink`
    pub fn start(
        sink: Box<dyn EventSink>,
        topic: impl Into<String>,
        params: PublishParams,
    ) -> Result<Self, PublishError> {
        let topic = topic.into();
        let (sender, receiver) = channel::unbounded();
        let worker = thread::Builder::new()
            .name("publisher".to_string())
            .spawn(move || deliver_all(sink, receiver, &topic, &params))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Serialize a snapshot and queue it; never waits for the broker
    pub fn publish(&self, snapshot: &StatusSnapshot) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(snapshot)?;
        let envelope = Envelope {
            key: snapshot.key().to_vec(),
            payload,
        };
        self.sender
            .as_ref()
            .ok_or(PublishError::Closed)?
            .send(envelope)
            .map_err(|_| PublishError::Closed)
    }

    /// Close the queue, wait for pending events to be delivered and flushed
    pub fn shutdown(mut self) -> DeliveryReport {
        self.finish()
    }

    fn finish(&mut self) -> DeliveryReport {
        drop(self.sender.take());
        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(report)) => report,
            Some(Err(_)) => {
                error!("Publisher worker panicked, pending events are lost");
                DeliveryReport::default()
            }
            None => DeliveryReport::default(),
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.finish();
    }
}

fn deliver_all(
    mut sink: Box<dyn EventSink>,
    receiver: Receiver<Envelope>,
    topic: &str,
    params: &PublishParams,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    let backoff = Duration::from_millis(params.retry_backoff_ms);

    for envelope in receiver.iter() {
        let mut attempt: u32 = 0;
        loop {
            match sink.send(topic, Some(&envelope.key), &envelope.payload) {
                Ok(()) => {
                    report.delivered += 1;
                    break;
                }
                Err(err) if attempt < params.max_retries => {
                    attempt += 1;
                    debug!("Retrying event (attempt {}): {}", attempt + 1, err);
                    thread::sleep(backoff * attempt);
                }
                Err(err) => {
                    warn!(
                        "Dropping event for vehicle {} after {} attempt(s): {}",
                        String::from_utf8_lossy(&envelope.key),
                        attempt + 1,
                        err
                    );
                    report.dropped += 1;
                    break;
                }
            }
        }
    }

    match sink.flush(Duration::from_secs(params.flush_timeout_secs)) {
        Ok(()) => report.flushed = true,
        Err(err) => warn!("Failed to flush pending events: {}", err),
    }
    debug!(
        "Publisher drained: {} delivered, {} dropped",
        report.delivered, report.dropped
    );
    report
}

/// Open the sink selected by the configuration
pub fn open_sink(config: &FleetConfig) -> Result<Box<dyn EventSink>, PublishError> {
    match config.sink {
        SinkKind::Stdout => {
            info!("Publishing events to stdout");
            Ok(Box::new(WriterSink::new(std::io::stdout())))
        }
        #[cfg(feature = "kafka")]
        SinkKind::Kafka => {
            let sink = KafkaSink::connect(&config.broker_address, &config.topic_name, &config.publish)?;
            Ok(Box::new(sink))
        }
        #[cfg(not(feature = "kafka"))]
        SinkKind::Kafka => Err(PublishError::Connect(
            "Kafka support is not enabled. Rebuild with --features kafka".to_string(),
        )),
    }
}
