//! Agent controller - the request/response loop that keeps the guest reachable
//!
//! The loop owns the channel. It announces readiness, then reads one line,
//! answers it with exactly one response line, and only then reads the next.
//! Bad input of any kind becomes an error response; the only way out of the
//! loop is end-of-stream on the inbound side (or the channel itself failing).

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::channel::{ChannelWriter, AGENT_PREFIX};
use crate::exec::{ExecError, ProcessExecutor};
use crate::protocol::{parse_request, ProtocolError, Request, Response};

/// Prefix of the message sent when handling a line fails unexpectedly
const FATAL_LOOP_ERROR: &str = "Fatal Loop Error";

/// Configuration for the agent loop
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Sentinel that starts every line the agent writes
    pub prefix: String,
    /// Kill commands that run longer than this unless the request says otherwise
    pub default_timeout: Option<Duration>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            prefix: AGENT_PREFIX.to_string(),
            default_timeout: None,
        }
    }
}

/// Errors that end the loop. Everything request-related is answered instead.
#[derive(Debug)]
pub enum AgentError {
    /// Reading from the inbound channel failed
    Read(std::io::Error),
    /// Writing to the outbound channel failed
    Write(std::io::Error),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Read(e) => write!(f, "Failed to read from channel: {}", e),
            AgentError::Write(e) => write!(f, "Failed to write to channel: {}", e),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Read(e) | AgentError::Write(e) => Some(e),
        }
    }
}

/// Why a single request line produced an error response
#[derive(Debug)]
pub enum RequestError {
    Protocol(ProtocolError),
    Exec(ExecError),
    /// Handling the line failed unexpectedly (panic, undecodable input)
    Fatal(String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Protocol(e) => write!(f, "{}", e),
            RequestError::Exec(e) => write!(f, "{}", e),
            RequestError::Fatal(msg) => write!(f, "{}: {}", FATAL_LOOP_ERROR, msg),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<ProtocolError> for RequestError {
    fn from(e: ProtocolError) -> Self {
        RequestError::Protocol(e)
    }
}

impl From<ExecError> for RequestError {
    fn from(e: ExecError) -> Self {
        RequestError::Exec(e)
    }
}

impl From<Result<Response, RequestError>> for Response {
    fn from(result: Result<Response, RequestError>) -> Self {
        result.unwrap_or_else(|e| Response::error(e.to_string()))
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentSummary {
    /// Non-empty lines answered
    pub requests: u64,
    /// How many of those were answered with an error
    pub errors: u64,
}

/// The guest agent: reads requests from `R`, writes framed responses to `W`
pub struct Agent<R, W> {
    reader: R,
    writer: ChannelWriter<W>,
    executor: ProcessExecutor,
}

impl<R, W> Agent<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create an agent whose commands inherit this process's environment
    ///
    /// # Arguments
    /// * `reader` - inbound side of the channel (host → guest)
    /// * `writer` - outbound side of the channel (guest → host)
    /// * `config` - sentinel prefix and default timeout
    pub fn new(reader: R, writer: W, config: AgentConfig) -> Self {
        let executor =
            ProcessExecutor::from_current_env().with_default_timeout(config.default_timeout);
        Self {
            reader,
            writer: ChannelWriter::with_prefix(writer, config.prefix),
            executor,
        }
    }

    /// Replace the executor, e.g. to pin the base environment
    pub fn with_executor(mut self, executor: ProcessExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Run until the inbound channel closes
    pub async fn run(self) -> Result<AgentSummary, AgentError> {
        self.run_into_writer().await.map(|(summary, _)| summary)
    }

    /// Like [`Agent::run`], also handing back the outbound writer
    pub async fn run_into_writer(mut self) -> Result<(AgentSummary, W), AgentError> {
        let executor = &self.executor;
        let summary = serve_lines(&mut self.reader, &mut self.writer, move |line| {
            dispatch(executor, line)
        })
        .await?;
        Ok((summary, self.writer.into_inner()))
    }
}

/// Drive the channel: announce readiness, then answer every non-empty line
/// with exactly one response until end-of-stream.
///
/// `handle` gets each trimmed line. A panic inside it is answered as a
/// `Fatal Loop Error` and the loop moves on to the next line.
async fn serve_lines<R, W, F, Fut>(
    reader: &mut R,
    writer: &mut ChannelWriter<W>,
    mut handle: F,
) -> Result<AgentSummary, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Response, RequestError>>,
{
    let mut summary = AgentSummary::default();

    writer.send_ready().await.map_err(AgentError::Write)?;
    info!("agent ready");

    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(AgentError::Read)?;
        if n == 0 {
            break;
        }

        let response: Response = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let span = info_span!("agent_request", request_id = %Uuid::now_v7());
                catch_panic(handle(line.to_string()))
                    .instrument(span)
                    .await
                    .into()
            }
            Err(_) => {
                warn!(bytes = buf.len(), "discarding non-UTF-8 line");
                let err = RequestError::Fatal("stream did not contain valid UTF-8".to_string());
                Response::error(err.to_string())
            }
        };

        summary.requests += 1;
        if response.is_error() {
            summary.errors += 1;
        }
        writer.send(&response).await.map_err(AgentError::Write)?;
    }

    info!(
        requests = summary.requests,
        errors = summary.errors,
        "channel closed, agent exiting"
    );
    Ok(summary)
}

/// Run a handler future, turning a panic into [`RequestError::Fatal`]
async fn catch_panic<Fut>(handler: Fut) -> Result<Response, RequestError>
where
    Fut: Future<Output = Result<Response, RequestError>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            warn!(panic = %msg, "request handler panicked");
            Err(RequestError::Fatal(msg))
        }
    }
}

async fn dispatch(executor: &ProcessExecutor, line: String) -> Result<Response, RequestError> {
    let request = parse_request(&line).map_err(|e| {
        warn!(error = %e, "rejected request");
        e
    })?;
    debug!(kind = request.kind(), "dispatching request");

    match request {
        Request::Execute(req) => {
            let result = executor.execute(req).await?;
            Ok(Response::execute_result(result))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}
