//! Guest control agent - runs inside the VM and executes host commands
//!
//! The host writes one JSON request per line to the guest's console; the
//! agent answers each with one `AGNT: `-prefixed JSON line on the same
//! console, which it shares with kernel log output.
//!
//! # Modules
//!
//! - `agent` - the request/response loop and its configuration
//! - `channel` - sentinel framing of outbound lines (and host-side filtering)
//! - `protocol` - request parsing and response encoding
//! - `exec` - environment construction and the process executor
//! - `tracing` - stderr logging setup
//!
//! # Quick Start
//!
//! ```ignore
//! use guest_agent::{Agent, AgentConfig};
//! use tokio::io::BufReader;
//!
//! let agent = Agent::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), AgentConfig::default());
//! agent.run().await?;
//! ```

pub mod agent;
pub mod channel;
pub mod exec;
pub mod protocol;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{Agent, AgentConfig, AgentError, AgentSummary};
pub use channel::{parse_agent_line, AgentLine, ChannelWriter, AGENT_PREFIX};
pub use exec::{ExecError, ProcessExecutor};
pub use protocol::{ExecuteRequest, ExecuteResult, ProtocolError, Request, Response};
