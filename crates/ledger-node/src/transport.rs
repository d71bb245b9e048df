use crate::{
    config::NodeConfig,
    constants::{DEFAULT_MAX_FRAME_BYTES, DEFAULT_TIMEOUT_MS, LOG_PREVIEW_CHARS},
    error::TransportError,
    framing::{read_frame, write_frame},
};
use std::{future::Future, time::Duration};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tracing::{debug, info, warn};

/// Answer to one inbound message. `stop` ends the serve loop once the body
/// has been written back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub body: String,
    pub stop: bool,
}

impl Reply {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            stop: false,
        }
    }

    pub fn stop(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            stop: true,
        }
    }
}

/// Whatever answers the messages arriving on a served listener.
pub trait Handler: Send + Sync {
    fn handle(&self, payload: String) -> impl Future<Output = Reply> + Send;
}

/// One request, one reply, one connection.
#[derive(Clone, Copy, Debug)]
pub struct PeerTransport {
    timeout: Duration,
    max_frame_bytes: usize,
}

impl Default for PeerTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS), DEFAULT_MAX_FRAME_BYTES)
    }
}

impl PeerTransport {
    pub fn new(timeout: Duration, max_frame_bytes: usize) -> Self {
        Self {
            timeout,
            max_frame_bytes,
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.timeout, config.max_frame_bytes)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Opens a connection to `addr`, sends `message` and waits for the reply.
    /// The whole exchange is bounded by the configured timeout.
    pub async fn send(&self, addr: &str, message: &str) -> Result<String, TransportError> {
        debug!(%addr, "sending {}", preview(message));
        let exchange = async {
            let mut stream = TcpStream::connect(addr)
                .await
                .map_err(|source| TransportError::Connect {
                    addr: addr.to_string(),
                    source,
                })?;
            write_frame(&mut stream, message).await?;
            let reply = read_frame(&mut stream, self.max_frame_bytes).await?;
            let _ = stream.shutdown().await;
            Ok::<_, TransportError>(reply)
        };
        let reply = timeout(self.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;
        debug!(%addr, "received {}", preview(&reply));
        Ok(reply)
    }

    pub async fn bind(addr: &str) -> Result<TcpListener, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accepts connections one at a time until the handler asks to stop.
    /// A misbehaving client only costs its own connection.
    pub async fn serve<H: Handler>(
        &self,
        listener: TcpListener,
        handler: &H,
    ) -> Result<(), TransportError> {
        loop {
            let (mut stream, remote) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };

            let read = read_frame(&mut stream, self.max_frame_bytes);
            let payload = match timeout(self.timeout, read).await {
                Ok(Ok(payload)) => payload,
                Ok(Err(e)) => {
                    warn!(%remote, "dropping connection: {e}");
                    continue;
                }
                Err(_) => {
                    warn!(%remote, "dropping connection: no frame within {:?}", self.timeout);
                    continue;
                }
            };
            debug!(%remote, "received {}", preview(&payload));

            let reply = handler.handle(payload).await;
            match timeout(self.timeout, write_frame(&mut stream, &reply.body)).await {
                Ok(Ok(())) => debug!(%remote, "replied {}", preview(&reply.body)),
                Ok(Err(e)) => warn!(%remote, "failed to reply: {e}"),
                Err(_) => warn!(%remote, "reply timed out"),
            }
            let _ = stream.shutdown().await;

            if reply.stop {
                info!("serve loop stopping");
                return Ok(());
            }
        }
    }
}

/// The first few characters of a payload, for log lines.
pub fn preview(payload: &str) -> String {
    match payload.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &payload[..cut]),
        None => payload.to_string(),
    }
}
