use std::path::Path;

use anyhow::{Context, Result};
use reqwest::{Certificate, Client, Identity};

use super::{Record, RecordConsumer};
use crate::config;

/// posts node state to the api server
pub struct ApiConsumer {
    client: Client,
    base: String,
}

impl ApiConsumer {
    /// builds the http client. nothing is sent until `ping`
    #[instrument(skip(cfg), fields(endpoint = %cfg.endpoint))]
    pub async fn connect(cfg: &config::Api) -> Result<Self> {
        let mut builder = Client::builder().use_rustls_tls().timeout(cfg.timeout());
        match &cfg.tls {
            Some(tls) => {
                info!("Using client certificate {:?}", tls.cert);
                builder = builder
                    .identity(load_identity(&tls.cert, &tls.key).await?)
                    .tls_built_in_root_certs(false);
                for ca in load_cas(&tls.trusted_cas).await? {
                    builder = builder.add_root_certificate(ca);
                }
            }
            None => warn!("No client certificate configured, not using mutual tls"),
        }
        Ok(Self {
            client: builder.build()?,
            base: base_url(&cfg.endpoint),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    /// checks the server is reachable. any response counts
    pub async fn ping(&self) -> Result<()> {
        let url = self.url("ping");
        info!("GET {url}");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        info!("Response status from the server {status} with content: {body}");
        Ok(())
    }

    /// makes sure the server has an entry for this node
    pub async fn post_node(&self) -> Result<()> {
        let url = self.url("node");
        info!("POST {url}");
        let resp = self.client.post(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        info!("Response status from the server {status} with content: {body}");
        Ok(())
    }
}

#[async_trait]
impl RecordConsumer for ApiConsumer {
    async fn handle(&mut self, record: &Record) -> Result<()> {
        let resp = self
            .client
            .post(self.url("node/state"))
            .json(&record.state())
            .send()
            .await
            .context("failed to post new state to api server")?;
        debug!("Response status from the server {}", resp.status());
        resp.error_for_status()?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        debug!("Closing api client for {}", self.base);
    }
}

fn base_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}

async fn load_identity(cert: &Path, key: &Path) -> Result<Identity> {
    let mut pem = tokio::fs::read(cert)
        .await
        .with_context(|| format!("failed to read client certificate {cert:?}"))?;
    pem.push(b'\n');
    pem.extend(
        tokio::fs::read(key)
            .await
            .with_context(|| format!("failed to read client key {key:?}"))?,
    );
    Identity::from_pem(&pem).with_context(|| {
        format!("failed to create a keypair from client cert file {cert:?} and client key file {key:?}")
    })
}

async fn load_cas(dir: &Path) -> Result<Vec<Certificate>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read trusted cas directory {dir:?}"))?;
    let mut cas = vec![];
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let pem = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read the content of CA {path:?}"))?;
        cas.push(
            Certificate::from_pem(&pem)
                .with_context(|| format!("failed to parse certificate {path:?}"))?,
        );
    }
    if cas.is_empty() {
        bail!("no trusted CAs in {dir:?}");
    }
    Ok(cas)
}
