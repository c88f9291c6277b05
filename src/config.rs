use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use lora_packet::PeerNode;
use serde::Deserialize;

#[cfg(test)]
#[test]
fn load_example_config() {
    let settings = from_str(include_str!("../config.example.toml")).unwrap();

    assert_eq!(settings.source.format, Format::Text);
    assert!(!settings.source.from_start);
    assert_eq!(settings.source.poll_interval(), Duration::from_millis(250));
    assert_eq!(settings.ingest.max_errors, 10);
    assert_eq!(settings.ingest.max_buffer, 4096);
    assert_eq!(settings.node, PeerNode::new(0x01, 0x02, 0x17));
    assert_eq!(settings.output.path, Some(PathBuf::from("node-state.jsonl")));
    let api = settings.api.unwrap();
    assert_eq!(api.endpoint, "localhost:3000");
    assert_eq!(api.timeout(), Duration::from_secs(5));
    assert_eq!(api.tls, None);
}

#[cfg(test)]
#[test]
fn api_tls_is_all_or_nothing() {
    const BASE: &str = r#"
        [source]
        file = "rx.log"
        format = "text"

        [node]
        addh = 0
        addl = 9
        chan = 23

        [api]
        endpoint = "https://api.example.net"
        "#;

    let settings = from_str(&format!(
        "{BASE}
        [api.tls]
        cert = \"client.crt\"
        key = \"client.key\"
        trusted_cas = \"cas\"
        "
    ))
    .unwrap();
    assert_eq!(
        settings.api.unwrap().tls,
        Some(Tls {
            cert: "client.crt".into(),
            key: "client.key".into(),
            trusted_cas: "cas".into(),
        })
    );

    // a key without a certificate is a mistake, not plain tls
    assert!(from_str(&format!(
        "{BASE}
        [api.tls]
        key = \"client.key\"
        "
    ))
    .is_err());
}

#[cfg(test)]
#[test]
fn defaults() {
    let settings = from_str(
        r#"
        [source]
        file = "rx.bin"
        format = "binary"

        [node]
        addh = 0
        addl = 9
        chan = 23
        "#,
    )
    .unwrap();

    assert_eq!(settings.source.format, Format::Binary);
    assert_eq!(settings.source.poll_interval_ms, 250);
    assert_eq!(settings.ingest, Ingest::default());
    assert_eq!(settings.output.path, None);
    assert_eq!(settings.api, None);
}

pub fn from_str(buf: &str) -> Result<self::Config> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(buf, config::FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    Ok(settings)
}

pub async fn open(path: PathBuf) -> Result<self::Config> {
    let config_file = tokio::fs::read_to_string(path).await?;
    from_str(&config_file)
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// where records come from
    pub source: Source,
    /// error budget and buffering
    #[serde(default)]
    pub ingest: Ingest,
    /// radio identity of the node doing the receiving
    pub node: PeerNode,
    /// where node state goes
    #[serde(default)]
    pub output: Output,
    /// api server node state is posted to
    #[serde(default)]
    pub api: Option<Api>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Source {
    /// file the receiver's output is written to
    pub file: PathBuf,
    pub format: Format,
    /// read existing content too, instead of starting at the end of the file
    #[serde(default)]
    pub from_start: bool,
    /// how long to wait for new data once the end of the file is reached
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Source {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `key: value` lines, as printed by the receiver
    Text,
    /// concatenated raw records
    Binary,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Ingest {
    /// source errors tolerated before the ingestor gives up
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
    /// bytes of text buffered without a complete record before the buffer is dropped
    #[serde(default = "default_max_buffer")]
    pub max_buffer: usize,
}

impl Default for Ingest {
    fn default() -> Self {
        Self {
            max_errors: default_max_errors(),
            max_buffer: default_max_buffer(),
        }
    }
}

fn default_max_errors() -> usize {
    10
}

fn default_max_buffer() -> usize {
    4096
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Output {
    /// json lines file node state is appended to
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Api {
    /// `host[:port]` (https is assumed) or a full base url
    pub endpoint: String,
    /// per request timeout
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
    /// client certificate and trusted CAs for mutual tls
    #[serde(default)]
    pub tls: Option<Tls>,
}

impl Api {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_api_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Tls {
    /// PEM client certificate
    pub cert: PathBuf,
    /// PEM private key of `cert`
    pub key: PathBuf,
    /// directory of PEM CA certificates the server is checked against
    pub trusted_cas: PathBuf,
}
