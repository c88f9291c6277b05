use anyhow::Result;
use chrono::{DateTime, Utc};
use lora_packet::{MessagePacket, PeerNode};

use crate::state::StatePostRequest;

pub mod api;
pub mod jsonl;

#[derive(Debug, Clone)]
pub struct Record {
    pub received_at: DateTime<Utc>,
    /// the node that received the packet
    pub received_by: PeerNode,
    pub packet: MessagePacket,
}

impl Record {
    pub fn state(&self) -> StatePostRequest {
        StatePostRequest::from(&self.packet)
    }
}

#[async_trait]
pub trait RecordConsumer: Send {
    /// handle one ingested record.
    async fn handle(&mut self, record: &Record) -> Result<()>;
    /// flush and release whatever the consumer holds
    async fn close(self: Box<Self>);
}
