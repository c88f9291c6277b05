//! follows the receiver's output file (tail -f style) and turns it into records

use std::{io::SeekFrom, path::PathBuf, time::Duration};

use flume::Sender;
use lora_packet::{message, MessagePacket};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{self, AsyncReadExt, AsyncSeekExt},
    time::sleep,
};

use crate::{
    config::{self, Format},
    parse::{ParseError, TextParser},
};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to tail file: {0}")]
    Open(io::Error),
    #[error("failed to read file: {0}")]
    Read(io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Packet(#[from] lora_packet::Error),
}

pub type Item = Result<MessagePacket, SourceError>;

const CHUNK: usize = 512;

/// outcome of one `Follower::read`
#[derive(Debug, PartialEq, Eq)]
enum Read {
    /// this many new bytes were read into the buffer
    Data(usize),
    /// the file shrank and reading starts over at byte 0.
    /// anything buffered from before is stale.
    Truncated,
}

/// file reader that waits for more data at EOF instead of stopping
struct Follower {
    path: PathBuf,
    file: File,
    pos: u64,
    poll: Duration,
}

impl Follower {
    async fn open(cfg: &config::Source) -> io::Result<Self> {
        let mut file = File::open(&cfg.file).await?;
        let pos = if cfg.from_start {
            0
        } else {
            file.seek(SeekFrom::End(0)).await?
        };
        Ok(Self {
            path: cfg.file.clone(),
            file,
            pos,
            poll: cfg.poll_interval(),
        })
    }

    /// read whatever is new, waiting for data to show up if there is none
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<Read> {
        loop {
            let n = self.file.read(buf).await?;
            if n > 0 {
                self.pos += n as u64;
                return Ok(Read::Data(n));
            }
            if self.file.metadata().await?.len() < self.pos {
                warn!("{:?} was truncated, reading from the start", self.path);
                self.pos = self.file.seek(SeekFrom::Start(0)).await?;
                return Ok(Read::Truncated);
            }
            sleep(self.poll).await;
        }
    }
}

/// runs until the receiving side of `tx` is dropped, or the file can not be opened
#[instrument(skip(tx))]
pub async fn follow(cfg: config::Source, max_buffer: usize, tx: Sender<Item>) {
    let follower = match Follower::open(&cfg).await {
        Ok(f) => f,
        Err(e) => {
            let _ = tx.send_async(Err(SourceError::Open(e))).await;
            return;
        }
    };
    debug!("following {:?} from byte {}", cfg.file, follower.pos);
    match cfg.format {
        Format::Text => follow_text(follower, max_buffer, &tx).await,
        Format::Binary => follow_binary(follower, &tx).await,
    }
    debug!("receiver dropped, no longer following {:?}", cfg.file);
}

async fn follow_text(mut follower: Follower, max_buffer: usize, tx: &Sender<Item>) {
    let mut parser = TextParser::new(max_buffer);
    let mut pending = Vec::<u8>::new();
    let mut chunk = [0u8; CHUNK];
    loop {
        let mut items: Vec<Item> = vec![];
        match follower.read(&mut chunk).await {
            Ok(Read::Truncated) => {
                pending.clear();
                parser = TextParser::new(max_buffer);
            }
            Ok(Read::Data(n)) => {
                pending.extend_from_slice(&chunk[..n]);
                while let Some(end) = pending.iter().position(|&b| b == b'\n') {
                    let line = pending.drain(..=end).collect::<Vec<_>>();
                    let line = String::from_utf8_lossy(&line);
                    if let Some(res) = parser.push_line(line.trim_end()) {
                        items.push(res.map_err(SourceError::from));
                    }
                }
                trace!("{} byte(s) of text buffered", parser.buffered());
                // a "line" that never ends would otherwise grow forever
                if pending.len() > max_buffer {
                    pending.clear();
                    items.push(Err(ParseError::BufferOverflow.into()));
                }
            }
            Err(e) => items.push(Err(SourceError::Read(e))),
        }
        for item in items {
            if tx.send_async(item).await.is_err() {
                return;
            }
        }
    }
}

async fn follow_binary(mut follower: Follower, tx: &Sender<Item>) {
    let mut pending = Vec::<u8>::new();
    let mut chunk = [0u8; CHUNK];
    loop {
        let mut items: Vec<Item> = vec![];
        match follower.read(&mut chunk).await {
            Ok(Read::Truncated) => pending.clear(),
            Ok(Read::Data(n)) => {
                pending.extend_from_slice(&chunk[..n]);
                let whole = pending.len() - pending.len() % message::SIZE;
                items.extend(
                    pending[..whole]
                        .chunks_exact(message::SIZE)
                        .map(|raw| MessagePacket::read_from_prefix(raw).map_err(SourceError::from)),
                );
                pending.drain(..whole);
            }
            Err(e) => items.push(Err(SourceError::Read(e))),
        }
        for item in items {
            if tx.send_async(item).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tokio::{fs::OpenOptions, io::AsyncWriteExt, time::timeout};

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lora-ingest-{}-{name}", std::process::id()))
    }

    fn source(file: &Path, format: Format, from_start: bool) -> config::Source {
        config::Source {
            file: file.to_path_buf(),
            format,
            from_start,
            poll_interval_ms: 10,
        }
    }

    async fn append(path: &Path, data: &[u8]) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .unwrap();
        file.write_all(data).await.unwrap();
        file.flush().await.unwrap();
    }

    async fn next(rx: &flume::Receiver<Item>) -> Item {
        timeout(Duration::from_secs(5), rx.recv_async())
            .await
            .expect("no record within 5s")
            .expect("source stopped")
    }

    fn example() -> MessagePacket {
        MessagePacket::new(1013.25, 22.5, 120.0, 150.0, 3.7, 555.0)
    }

    #[tokio::test]
    async fn text_from_start() {
        let path = temp_path("text-from-start.log");
        let _ = tokio::fs::remove_file(&path).await;
        let second = MessagePacket::new(1000.5, -3.25, 80.0, 10.0, 4.2, 42.0);
        append(&path, format!("boot\n{}{}", example(), second).as_bytes()).await;

        let (tx, rx) = flume::unbounded();
        let task = tokio::spawn(follow(source(&path, Format::Text, true), 4096, tx));
        assert_eq!(next(&rx).await.unwrap(), example());
        assert_eq!(next(&rx).await.unwrap(), second);

        task.abort();
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn text_follows_new_data_only() {
        let path = temp_path("text-follow.log");
        let _ = tokio::fs::remove_file(&path).await;
        // already there when we start, must be skipped
        append(&path, example().to_string().as_bytes()).await;

        let (tx, rx) = flume::unbounded();
        let task = tokio::spawn(follow(source(&path, Format::Text, false), 4096, tx));
        sleep(Duration::from_millis(200)).await;

        let fresh = MessagePacket::new(990.0, 18.0, 200.0, 75.5, 3.3, 249.15);
        let text = fresh.to_string();
        // split mid-line to check partial lines are held back
        let (a, b) = text.split_at(text.len() / 2 + 3);
        append(&path, a.as_bytes()).await;
        sleep(Duration::from_millis(50)).await;
        append(&path, b.as_bytes()).await;

        let got = next(&rx).await.unwrap();
        assert_eq!(got.pressure, 990.0);
        assert_eq!(got.power_mw, 249.15);
        assert!(rx.is_empty());

        task.abort();
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn binary_records() {
        let path = temp_path("binary.bin");
        let _ = tokio::fs::remove_file(&path).await;
        let second = MessagePacket::new(-0.0, f32::MIN_POSITIVE / 4.0, 1.0, 2.0, 3.0, 6.0);
        let mut data = example().to_bytes().to_vec();
        data.extend_from_slice(&second.to_bytes());
        // first half of a third record
        data.extend_from_slice(&example().to_bytes()[..12]);
        append(&path, &data).await;

        let (tx, rx) = flume::unbounded();
        let task = tokio::spawn(follow(source(&path, Format::Binary, true), 4096, tx));
        assert_eq!(next(&rx).await.unwrap(), example());
        let got = next(&rx).await.unwrap();
        assert_eq!(got.pressure.to_bits(), (-0.0f32).to_bits());
        assert_eq!(got.temperature.to_bits(), second.temperature.to_bits());

        // the rest of the third record
        append(&path, &example().to_bytes()[12..]).await;
        assert_eq!(next(&rx).await.unwrap(), example());

        task.abort();
        tokio::fs::remove_file(&path).await.unwrap();
    }

    async fn truncate(path: &Path) {
        tokio::fs::File::create(path).await.unwrap();
    }

    #[tokio::test]
    async fn binary_restarts_aligned_after_truncation() {
        let path = temp_path("binary-truncate.bin");
        let _ = tokio::fs::remove_file(&path).await;
        // one and a half records
        let mut data = example().to_bytes().to_vec();
        data.extend_from_slice(&example().to_bytes()[..12]);
        append(&path, &data).await;

        let (tx, rx) = flume::unbounded();
        let task = tokio::spawn(follow(source(&path, Format::Binary, true), 4096, tx));
        assert_eq!(next(&rx).await.unwrap(), example());
        sleep(Duration::from_millis(100)).await;

        truncate(&path).await;
        sleep(Duration::from_millis(100)).await;
        let fresh = MessagePacket::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        append(&path, &fresh.to_bytes()).await;

        assert_eq!(next(&rx).await.unwrap(), fresh);
        assert!(rx.is_empty());

        task.abort();
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn text_drops_stale_lines_after_truncation() {
        let path = temp_path("text-truncate.log");
        let _ = tokio::fs::remove_file(&path).await;
        let text = example().to_string();
        // a whole block, then half of one with no line ending
        append(&path, format!("{text}{}", &text[..text.len() / 2 + 3]).as_bytes()).await;

        let (tx, rx) = flume::unbounded();
        let task = tokio::spawn(follow(source(&path, Format::Text, true), 4096, tx));
        assert_eq!(next(&rx).await.unwrap(), example());
        sleep(Duration::from_millis(100)).await;

        truncate(&path).await;
        sleep(Duration::from_millis(100)).await;
        let fresh = MessagePacket::new(1.5, 2.5, 3.5, 4.5, 5.5, 6.5);
        append(&path, fresh.to_string().as_bytes()).await;

        assert_eq!(next(&rx).await.unwrap(), fresh);
        assert!(rx.is_empty());

        task.abort();
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file() {
        let path = temp_path("does-not-exist.log");
        let (tx, rx) = flume::unbounded();
        follow(source(&path, Format::Text, true), 4096, tx).await;
        assert!(matches!(next(&rx).await, Err(SourceError::Open(_))));
        assert!(rx.recv_async().await.is_err());
    }

    #[tokio::test]
    async fn garbage_overflows() {
        let path = temp_path("garbage.log");
        let _ = tokio::fs::remove_file(&path).await;
        append(&path, "noise noise noise noise\n".repeat(20).as_bytes()).await;

        let (tx, rx) = flume::unbounded();
        let task = tokio::spawn(follow(source(&path, Format::Text, true), 128, tx));
        assert!(matches!(
            next(&rx).await,
            Err(SourceError::Parse(ParseError::BufferOverflow))
        ));

        task.abort();
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
