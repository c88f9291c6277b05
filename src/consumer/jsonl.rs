use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use lora_packet::PeerNode;
use serde::Serialize;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

use super::{Record, RecordConsumer};
use crate::state::StatePostRequest;

/// appends one json object per record to a file
pub struct JsonLinesConsumer {
    path: PathBuf,
    file: File,
}

#[derive(Serialize)]
struct Line<'a> {
    received_at: &'a DateTime<Utc>,
    node: &'a PeerNode,
    state: StatePostRequest,
}

impl JsonLinesConsumer {
    #[instrument]
    pub async fn open(path: &Path) -> Result<Self> {
        if path.exists() && !path.is_file() {
            error!("Could not open `{path:?}` -- directory exists here");
            bail!("JsonLinesConsumer::open failed - invalid path");
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

#[async_trait]
impl RecordConsumer for JsonLinesConsumer {
    async fn handle(&mut self, record: &Record) -> Result<()> {
        let line = Line {
            received_at: &record.received_at,
            node: &record.received_by,
            state: record.state(),
        };
        let mut buf = serde_json::to_vec(&line)?;
        buf.push(b'\n');
        self.file.write_all(&buf).await?;
        self.file.flush().await?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.file.sync_all().await {
            error!("Error syncing {:?}: {e:#?}", self.path);
        }
    }
}
