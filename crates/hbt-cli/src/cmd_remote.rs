use anyhow::Result;
use hbt_server::{Client, Request};
use std::io::Write;

/// Forward a single request to the daemon and print its reply, if any.
pub async fn run(client: &Client, request: Request) -> Result<()> {
    tracing::debug!(command = request.command(), addr = %client.addr(), "sending");
    if let Some(reply) = client.send(&request).await? {
        // No trailing newline: the shell widget splices this into the prompt.
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(reply.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}
