//! Binary protocol over a raw TCP socket

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::wire::{self, binary, MessageHeader, SendMessageRequest, SEND_MESSAGE};

use super::ApplicationService;

/// A connected socket speaking the binary protocol
pub struct TcpServiceClient {
    stream: BufStream<TcpStream>,
    peer: String,
    timeout: Duration,
    seq: i32,
}

impl TcpServiceClient {
    /// Open a connection, giving up after `timeout`
    pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<Self> {
        if hostname.is_empty() {
            return Err(Error::InvalidArgument("missing hostname".to_string()));
        }
        if port == 0 {
            return Err(Error::InvalidArgument(format!("invalid port: {}", port)));
        }

        let peer = format!("{}:{}", hostname, port);
        let stream = match tokio::time::timeout(timeout, TcpStream::connect((hostname, port))).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                tracing::error!(peer = %peer, error = %source, "Failed to open TCP connection");
                return Err(Error::Network {
                    endpoint: peer,
                    source,
                });
            }
            Err(_) => {
                tracing::error!(peer = %peer, ?timeout, "Timed out opening TCP connection");
                return Err(Error::Network {
                    endpoint: peer,
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                });
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %peer, error = %e, "Could not set TCP_NODELAY");
        }

        Ok(Self {
            stream: BufStream::new(stream),
            peer,
            timeout,
            seq: 0,
        })
    }

    /// The `host:port` this client is connected to
    pub fn peer(&self) -> &str {
        &self.peer
    }

    async fn call(&mut self, header: &MessageHeader, request: &SendMessageRequest) -> Result<()> {
        let bytes = binary::encode_message(header, &request.to_call_args());
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;

        let (reply, body) = binary::read_message(&mut self.stream).await?;
        wire::check_reply(header, &reply, &body)
    }
}

#[async_trait]
impl ApplicationService for TcpServiceClient {
    async fn send_message(&mut self, request: &SendMessageRequest) -> Result<()> {
        self.seq = self.seq.wrapping_add(1);
        let header = MessageHeader::call(SEND_MESSAGE, self.seq);
        let timeout = self.timeout;

        match tokio::time::timeout(timeout, self.call(&header, request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Delivery(format!(
                "no reply from {} within {:?}",
                self.peer, timeout
            ))),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(peer = %self.peer, error = %e, "Error while closing TCP connection");
        }
    }
}
