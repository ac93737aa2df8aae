use std::fmt;
use std::io;

use crate::error::ChannelError;
use crate::http::response::{Response, StatusCode};
use crate::transport::Transport;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Serializes the status line and header block.
pub fn serialize_head(status: StatusCode, reason: Option<&str>, headers: &[(String, String)]) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        status.as_u16(),
        reason.unwrap_or(status.reason_phrase())
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Byte-oriented body handle returned by [`Response::output_stream`].
///
/// The first write commits the response head.
pub struct BodyStream<'a, T: Transport> {
    pub(crate) response: &'a mut Response<T>,
}

impl<T: Transport> BodyStream<'_, T> {
    /// Writes all of `bytes` using the channel's discipline.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), ChannelError> {
        self.response.commit()?;
        self.response.channel().write(bytes)
    }

    pub fn is_ready(&self) -> bool {
        self.response.channel().is_ready()
    }
}

impl<T: Transport> io::Write for BodyStream<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.response.commit()?;
        self.response.channel().flush()?;
        Ok(())
    }
}

/// Text-oriented body handle returned by [`Response::writer`]. Text is
/// sent as UTF-8.
pub struct BodyWriter<'a, T: Transport> {
    pub(crate) response: &'a mut Response<T>,
}

impl<T: Transport> BodyWriter<'_, T> {
    pub fn write_text(&mut self, text: &str) -> Result<(), ChannelError> {
        self.response.commit()?;
        self.response.channel().write(text.as_bytes())
    }

    pub fn flush(&mut self) -> Result<(), ChannelError> {
        self.response.commit()?;
        self.response.channel().flush()
    }
}

impl<T: Transport> fmt::Write for BodyWriter<'_, T> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_text(s).map_err(|e| {
            tracing::debug!(error = %e, "body writer failed");
            fmt::Error
        })
    }
}
