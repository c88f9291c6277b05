use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use flume::Receiver;
use lora_packet::{MessagePacket, PeerNode};

use crate::{
    consumer::{Record, RecordConsumer},
    source::{self, SourceError},
};

/// takes records from the source and hands them to every consumer
pub struct Ingestor {
    node: PeerNode,
    source: PathBuf,
    max_errors: usize,
    errors: usize,
    consumers: Vec<Box<dyn RecordConsumer>>,
}

impl Ingestor {
    pub fn new(
        node: PeerNode,
        source: PathBuf,
        max_errors: usize,
        consumers: Vec<Box<dyn RecordConsumer>>,
    ) -> Self {
        Self {
            node,
            source,
            max_errors,
            errors: 0,
            consumers,
        }
    }

    /// runs until the source closes, or more than `max_errors` errors have come out of it.
    ///
    /// a source that could not be opened at all is fatal straight away.
    pub async fn run(&mut self, rx: Receiver<source::Item>) -> Result<()> {
        while let Ok(item) = rx.recv_async().await {
            match item {
                Ok(packet) => self.ingest(packet).await,
                Err(e @ SourceError::Open(_)) => {
                    error!("Could not follow {:?}: {e}", self.source);
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(
                        "[{}/{}] failed to poll {:?}: {e}",
                        self.errors, self.max_errors, self.source
                    );
                    self.errors += 1;
                    if self.errors > self.max_errors {
                        error!("Too many errors reading {:?}, giving up", self.source);
                        bail!("exhausted file poller error counter");
                    }
                }
            }
        }
        info!("Source closed, stopping");
        Ok(())
    }

    async fn ingest(&mut self, packet: MessagePacket) {
        info!(
            "Ingested message (node {}): pressure: {:.2}, temperature: {:.2}, altitude: {:.2}, current_mA: {:.2}, loadVoltage: {:.2}, power_mW: {:.2}",
            self.node,
            packet.pressure,
            packet.temperature,
            packet.altitude,
            packet.current_ma,
            packet.load_voltage,
            packet.power_mw,
        );
        if !packet.is_finite() {
            warn!("Message holds NaN or infinite readings, json output will show them as null");
        }
        let record = Record {
            received_at: Utc::now(),
            received_by: self.node,
            packet,
        };
        for consumer in &mut self.consumers {
            if let Err(e) = consumer.handle(&record).await {
                error!("Failed to hand off node state: {e:?}");
            }
        }
    }

    pub async fn close(self) {
        for consumer in self.consumers {
            consumer.close().await;
        }
    }
}
