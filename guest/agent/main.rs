//! Guest control agent - runs inside the VM as the console's consumer
//!
//! Reads requests from stdin and writes `AGNT: `-prefixed responses to
//! stdout; the VM's init wires both to the serial console (ttyS0 / hvc0).
//! Exits cleanly when the console reaches end-of-stream.

use guest_agent::tracing::init_tracing;
use guest_agent::{Agent, AgentConfig};
use tokio::io::BufReader;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing("guest_agent")?;

    let agent = Agent::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        AgentConfig::default(),
    );

    match agent.run().await {
        Ok(summary) => {
            tracing::info!(requests = summary.requests, "agent stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "agent loop failed");
            Err(e.into())
        }
    }
}
