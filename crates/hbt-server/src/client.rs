use crate::protocol::Request;
use anyhow::{Context, Result};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Talks to a running daemon, one connection per request.
#[derive(Debug, Clone, Copy)]
pub struct Client {
    addr: SocketAddr,
}

impl Client {
    /// Client for a daemon on localhost.
    pub fn new(port: u16) -> Self {
        Self::with_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    pub fn with_addr(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send `request` and wait for the daemon to close the connection.
    /// Returns the reply for requests that have one.
    pub async fn send(&self, request: &Request) -> Result<Option<String>> {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .with_context(|| format!("failed to connect to {}", self.addr))?;
        stream
            .write_all(request.to_wire().as_bytes())
            .await
            .context("failed to send request")?;
        stream.shutdown().await.context("failed to send request")?;

        let mut reply = String::new();
        stream
            .read_to_string(&mut reply)
            .await
            .context("failed to read reply")?;
        Ok(request.expects_reply().then_some(reply))
    }

    pub async fn track(&self, session: &str, dir: &str, cmd: &str) -> Result<()> {
        self.send(&Request::Track {
            session: session.to_string(),
            dir: dir.to_string(),
            cmd: cmd.to_string(),
        })
        .await?;
        Ok(())
    }

    pub async fn hint(&self, session: &str, dir: &str) -> Result<String> {
        let reply = self
            .send(&Request::Hint {
                session: session.to_string(),
                dir: dir.to_string(),
            })
            .await?;
        Ok(reply.unwrap_or_default())
    }

    pub async fn end(&self, session: &str) -> Result<()> {
        self.send(&Request::End {
            session: session.to_string(),
        })
        .await?;
        Ok(())
    }

    pub async fn delete(&self, session: &str, dir: &str, cmd: &str) -> Result<()> {
        self.send(&Request::Delete {
            session: session.to_string(),
            dir: dir.to_string(),
            cmd: cmd.to_string(),
        })
        .await?;
        Ok(())
    }
}
