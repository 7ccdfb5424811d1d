//! Line protocol between host and guest agent
//!
//! Host → guest: one JSON request object per line.
//! Guest → host: one JSON response per request, framed by [`crate::channel`].
//!
//! ```text
//! {"type":"execute","cmd":["echo","hi"],"token":"abc"}
//!     → AGNT: {"type":"execute_result","token":"abc","exitCode":0,"stdout":"hi\n","stderr":""}
//! {"type":"reboot"}
//!     → AGNT: {"error":"Unknown type: reboot"}
//! ```

pub mod request;
pub mod response;

pub use request::{parse_request, ExecuteRequest, ProtocolError, Request, TYPE_EXECUTE};
pub use response::{ExecuteResult, Response, ResultPayload, SERIALIZATION_FAILED};
