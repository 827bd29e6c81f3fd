//! Line-oriented feed sources.
//!
//! Each configured source is a newline-delimited JSON stream over HTTP (with
//! optional basic auth) or a local file. HTTP sources reconnect with a fixed
//! delay forever; a file's natural end of input closes the source. All
//! sources merge into one line channel.

use futures::StreamExt;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{info, warn};

/// Transport failure surfaced to the retry loop.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP connection or read failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Local file failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Non-success HTTP status.
    #[error("unexpected http status {0}")]
    Status(u16),
}

/// HTTP basic credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedAuth {
    /// Basic auth user.
    pub username: String,
    /// Basic auth password.
    pub password: String,
}

/// One configured feed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSourceConfig {
    /// `http(s)://` endpoint or a local file path.
    pub url: String,
    /// Credentials for HTTP sources.
    #[serde(default)]
    pub auth: Option<FeedAuth>,
}

impl FeedSourceConfig {
    /// Unauthenticated source.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: None,
        }
    }

    fn is_http(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }
}

/// Feed reader configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Sources merged into one stream.
    pub sources: Vec<FeedSourceConfig>,
    /// Fixed reconnect delay for HTTP sources.
    pub retry_delay_ms: u64,
    /// Length of the startup reorder window.
    pub startup_window_ms: u64,
    /// Event cap of the startup reorder window.
    pub startup_capacity: usize,
}

impl FeedConfig {
    /// Config reading a single source with default tuning.
    pub fn single(source: FeedSourceConfig) -> Self {
        Self {
            sources: vec![source],
            ..Self::default()
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            retry_delay_ms: 5_000,
            startup_window_ms: 500,
            startup_capacity: 8_192,
        }
    }
}

/// Message from a source task.
#[derive(Debug)]
pub enum SourceMessage {
    /// One feed line.
    Line(String),
    /// The source dropped and reopened; the consumer should re-enter its
    /// startup window.
    Reconnected,
    /// The source reached a natural end of input and will not reopen.
    Closed,
}

/// Spawns one reader task per source, merged into a single channel.
pub fn spawn_sources(config: &FeedConfig) -> mpsc::Receiver<SourceMessage> {
    let (tx, rx) = mpsc::channel(1024);
    for source in config.sources.clone() {
        let tx = tx.clone();
        let retry = Duration::from_millis(config.retry_delay_ms);
        if source.is_http() {
            tokio::spawn(run_http_source(source, retry, tx));
        } else {
            tokio::spawn(run_file_source(source, tx));
        }
    }
    rx
}

async fn run_http_source(
    source: FeedSourceConfig,
    retry: Duration,
    tx: mpsc::Sender<SourceMessage>,
) {
    let client = reqwest::Client::new();
    let mut first_attempt = true;
    loop {
        if tx.is_closed() {
            return;
        }
        if !first_attempt && tx.send(SourceMessage::Reconnected).await.is_err() {
            return;
        }
        first_attempt = false;

        match open_stream(&client, &source).await {
            Ok(response) => {
                info!(url = %source.url, "feed connected");
                let mut stream = response.bytes_stream();
                let mut pending: Vec<u8> = Vec::new();
                loop {
                    match stream.next().await {
                        Some(Ok(chunk)) => {
                            pending.extend_from_slice(&chunk);
                            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                                let line: Vec<u8> = pending.drain(..=pos).collect();
                                let line = String::from_utf8_lossy(&line[..line.len() - 1]);
                                let line = line.trim();
                                if line.is_empty() {
                                    continue;
                                }
                                if tx.send(SourceMessage::Line(line.to_string())).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Err(err)) => {
                            warn!(url = %source.url, %err, "feed read failed");
                            break;
                        }
                        None => {
                            warn!(url = %source.url, "feed stream ended, reconnecting");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(url = %source.url, %err, "feed connection failed");
            }
        }
        tokio::time::sleep(retry).await;
    }
}

async fn open_stream(
    client: &reqwest::Client,
    source: &FeedSourceConfig,
) -> Result<reqwest::Response, TransportError> {
    let mut request = client.get(&source.url);
    if let Some(auth) = &source.auth {
        request = request.basic_auth(&auth.username, Some(&auth.password));
    }
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(TransportError::Status(response.status().as_u16()));
    }
    Ok(response)
}

async fn run_file_source(source: FeedSourceConfig, tx: mpsc::Sender<SourceMessage>) {
    match tokio::fs::File::open(&source.url).await {
        Ok(file) => {
            let mut lines = tokio::io::BufReader::new(file).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(SourceMessage::Line(line)).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(path = %source.url, %err, "feed file read failed");
                        break;
                    }
                }
            }
        }
        Err(err) => {
            warn!(path = %source.url, %err, "feed file open failed");
        }
    }
    let _ = tx.send(SourceMessage::Closed).await;
}
