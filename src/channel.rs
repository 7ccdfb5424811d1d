//! Sentinel framing on the shared console
//!
//! The agent's stdout is the same serial console the guest kernel logs to,
//! so the host sees agent output mixed with boot noise:
//!
//! ```text
//! [    0.412345] virtio_blk virtio1: [vda] 2097152 512-byte logical blocks
//! AGNT: READY
//! [    1.003311] random: crng init done
//! AGNT: {"type":"execute_result","token":null,"exitCode":0,"stdout":"","stderr":""}
//! ```
//!
//! Every agent line starts with [`AGENT_PREFIX`] and one space, and is written
//! with a single `write_all` followed by a flush.

use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::protocol::Response;

/// Marks a console line as written by the agent
pub const AGENT_PREFIX: &str = "AGNT:";

/// Body of the line emitted once at startup
pub const READY: &str = "READY";

/// Writes sentinel-prefixed lines to the outbound side of the channel
pub struct ChannelWriter<W> {
    inner: W,
    prefix: String,
}

impl<W: AsyncWrite + Unpin> ChannelWriter<W> {
    /// Wrap a writer using the standard prefix
    pub fn new(inner: W) -> Self {
        Self::with_prefix(inner, AGENT_PREFIX)
    }

    pub fn with_prefix(inner: W, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    /// Announce that the agent is accepting requests
    pub async fn send_ready(&mut self) -> std::io::Result<()> {
        self.write_line(READY).await
    }

    /// Write one response line
    pub async fn send(&mut self, response: &Response) -> std::io::Result<()> {
        self.write_line(&response.to_json()).await
    }

    async fn write_line(&mut self, body: &str) -> std::io::Result<()> {
        let mut line = String::with_capacity(self.prefix.len() + body.len() + 2);
        line.push_str(&self.prefix);
        line.push(' ');
        line.push_str(body);
        line.push('\n');

        self.inner.write_all(line.as_bytes()).await?;
        self.inner.flush().await
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// A line recognised as agent output
#[derive(Debug, Clone, PartialEq)]
pub enum AgentLine {
    Ready,
    Response(Value),
}

/// Host-side counterpart of [`ChannelWriter`]: pick agent lines out of
/// console output. Returns `None` for anything else, including lines that
/// carry the prefix but no decodable body.
pub fn parse_agent_line(line: &str) -> Option<AgentLine> {
    let body = line
        .trim_end_matches(['\r', '\n'])
        .strip_prefix(AGENT_PREFIX)?
        .strip_prefix(' ')?;

    if body == READY {
        return Some(AgentLine::Ready);
    }
    serde_json::from_str(body).ok().map(AgentLine::Response)
}
