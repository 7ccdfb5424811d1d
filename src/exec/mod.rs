//! Command execution inside the guest
//!
//! - `env` - builds a child's environment from the agent's own plus overrides
//! - `process` - spawns the child, waits for it and collects its output

pub mod env;
pub mod process;

pub use env::{ambient_environment, build_environment, is_valid_env_name, Environment};
pub use process::{ExecError, ProcessExecutor};
