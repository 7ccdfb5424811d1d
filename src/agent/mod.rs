//! Guest control agent
//!
//! # Architecture
//!
//! ```text
//! Host ──line──► Agent::run ──► parse_request ──► ProcessExecutor::execute
//!                    ▲                                     │
//!                    │                          exit code / stdout / stderr
//!                    │                                     ▼
//! Host ◄──"AGNT: {json}"── ChannelWriter ◄──────────── Response
//! ```
//!
//! One request is fully answered before the next line is read.

pub mod controller;

pub use controller::{Agent, AgentConfig, AgentError, AgentSummary, RequestError};
