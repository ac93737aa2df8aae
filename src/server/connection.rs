use std::sync::Arc;

use anyhow::Context;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;

use crate::channel::{Channel, TokioDispatch};
use crate::config::Config;
use crate::http::response::{Response, StatusCode};
use crate::server::body::ChunkedBody;
use crate::transport::{TcpTransport, Transport};

/// Largest request head accepted before the connection is dropped.
const MAX_HEAD_SIZE: usize = 64 * 1024;

pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    cfg: Arc<Config>,
}

impl Connection {
    pub fn new(stream: TcpStream, cfg: Arc<Config>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            cfg,
        }
    }

    /// Serves a single request and hands the socket to the output channel.
    pub async fn run(mut self) -> anyhow::Result<()> {
        if !self.read_head().await? {
            tracing::debug!("client closed before sending a request");
            return Ok(());
        }

        let handle = Handle::current();
        let transport = TcpTransport::new(self.stream, handle.clone());
        let channel = Channel::new(
            transport,
            Arc::new(TokioDispatch::new(handle)),
            &self.cfg.channel,
        );

        let body = Arc::new(ChunkedBody::new(
            channel.clone(),
            self.cfg.server.body_chunks,
            self.cfg.server.chunk_size,
        ));
        let mut response = Response::new(channel);

        // The listener holds a channel handle, so a failed start must close
        // the channel explicitly to release the socket.
        if let Err(e) = start_body(&mut response, &body) {
            response.close_connection();
            return Err(e);
        }
        Ok(())
    }

    /// Reads until the blank line ending the request head. Returns `false`
    /// if the client closed first.
    async fn read_head(&mut self) -> anyhow::Result<bool> {
        loop {
            if self.buffer.windows(4).any(|window| window == b"\r\n\r\n") {
                return Ok(true);
            }

            // Prevent unbounded header growth
            if self.buffer.len() > MAX_HEAD_SIZE {
                anyhow::bail!("Request head too large");
            }

            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Ok(false);
            }
        }
    }
}

/// Registers `body`, commits the head and writes the initial burst. The
/// listener takes over once the transport fills up.
fn start_body<T: Transport>(response: &mut Response<T>, body: &Arc<ChunkedBody<T>>) -> anyhow::Result<()> {
    response
        .channel()
        .set_writability_listener(body.clone())
        .context("Failed to register body listener")?;

    response.set_status(StatusCode::Ok);
    response.set_content_type("text/plain");
    response.set_content_length(body.content_length());
    response.set_header("Connection", "close");
    response.commit().context("Failed to commit response head")?;

    body.resume().context("Failed to start streaming body")?;
    Ok(())
}
