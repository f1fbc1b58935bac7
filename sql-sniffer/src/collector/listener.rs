//! Loopback listener for the hook's callback connection.

use std::io;
use std::net::SocketAddr;

use log::{debug, info};
use sql_sniffer_common::LOOPBACK_HOST;
use tokio::net::{TcpListener, TcpStream};

pub struct CollectorListener {
    listener: TcpListener,
    port: u16,
}

impl CollectorListener {
    /// Bind to an OS-assigned port on the loopback interface.
    ///
    /// # Errors
    /// Returns the bind error.
    pub async fn bind() -> io::Result<Self> {
        let listener = TcpListener::bind((LOOPBACK_HOST, 0)).await?;
        let port = listener.local_addr()?.port();
        info!("Listening on {LOOPBACK_HOST}:{port}");
        Ok(Self { listener, port })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the single hook connection, then close the listener.
    ///
    /// Not bounded by a timeout: if the hook never connects this waits
    /// until the caller drops the future.
    ///
    /// # Errors
    /// Returns the accept error.
    pub async fn accept_once(self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        debug!("Accepted hook connection from {peer}, closing listener on port {}", self.port);
        stream.set_nodelay(true)?;
        Ok((stream, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_bind_assigns_port_and_accepts_once() {
        let listener = CollectorListener::bind().await.unwrap();
        let port = listener.port();
        assert_ne!(port, 0);

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect((LOOPBACK_HOST, port)).await.unwrap();
            stream.write_all(b"x").await.unwrap();
        });

        let (_stream, peer) = listener.accept_once().await.unwrap();
        assert!(peer.ip().is_loopback());
        client.await.unwrap();

        // Listener is gone after the first accept
        assert!(TcpStream::connect((LOOPBACK_HOST, port)).await.is_err());
    }
}
