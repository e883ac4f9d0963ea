use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use tracing::warn;

/// Opens a long-lived notification channel for one credential.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &str, credential: &str) -> Result<Box<dyn FrameSource>>;
}

/// An open channel delivering newline-delimited text.
///
/// `None` means the peer closed the channel; `Some(Err(_))` a transport failure.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_line(&mut self) -> Option<Result<String>>;
}

/// Streaming GET against the notification endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, url: &str, credential: &str) -> Result<Box<dyn FrameSource>> {
        let bearer = HeaderValue::from_str(&format!("Bearer {credential}"))
            .context("credential is not a valid header value")?;
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, bearer)
            .header(ACCEPT, HeaderValue::from_static("application/x-ndjson, text/event-stream"))
            .send()
            .await
            .with_context(|| format!("open notification stream at {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("notification stream rejected: {status} {txt}");
        }

        let chunks = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).context("stream chunk"))
            .boxed();
        Ok(Box::new(LineReader::new(chunks)))
    }
}

/// Longest frame accepted before the line is discarded.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a chunked byte stream into lines.
///
/// Lines longer than the limit are dropped with a warning; the stream keeps
/// going from the next newline.
pub struct LineReader {
    chunks: BoxStream<'static, Result<Vec<u8>>>,
    buf: Vec<u8>,
    max_line: usize,
    /// Inside an oversized line whose head was already thrown away.
    discarding: bool,
    done: bool,
}

impl LineReader {
    pub fn new(chunks: BoxStream<'static, Result<Vec<u8>>>) -> Self {
        Self {
            chunks,
            buf: Vec::new(),
            max_line: MAX_LINE_BYTES,
            discarding: false,
            done: false,
        }
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    fn take_line(&mut self) -> Option<String> {
        loop {
            let pos = self.buf.iter().position(|b| *b == b'\n')?;
            let rest = self.buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buf, rest);
            line.pop();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_line {
                warn!(len = line.len(), max = self.max_line, "dropping oversized frame");
                continue;
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }

    /// Called when the buffer holds no complete line.
    fn shed_partial(&mut self) {
        if self.buf.len() > self.max_line {
            if !self.discarding {
                warn!(max = self.max_line, "frame exceeds limit without a newline; discarding");
            }
            self.buf.clear();
            self.discarding = true;
        }
    }
}

#[async_trait]
impl FrameSource for LineReader {
    async fn next_line(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(line) = self.take_line() {
                return Some(Ok(line));
            }
            self.shed_partial();
            if self.done {
                return None;
            }
            match self.chunks.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    if !self.buf.is_empty() && !self.discarding {
                        let tail = std::mem::take(&mut self.buf);
                        return Some(Ok(String::from_utf8_lossy(&tail).into_owned()));
                    }
                    return None;
                }
            }
        }
    }
}
