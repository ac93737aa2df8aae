use crate::channel::Channel;
use crate::error::ChannelError;
use crate::http::writer::{BodyStream, BodyWriter, serialize_head};
use crate::transport::Transport;

/// HTTP status codes supported by the response facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
    /// 502 Bad Gateway
    BadGateway,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// 504 Gateway Timeout
    GatewayTimeout,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use writegate::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
            StatusCode::BadGateway => 502,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::GatewayTimeout => 504,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::BadGateway => "Bad Gateway",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::GatewayTimeout => "Gateway Timeout",
        }
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            204 => StatusCode::NoContent,
            400 => StatusCode::BadRequest,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            500 => StatusCode::InternalServerError,
            502 => StatusCode::BadGateway,
            503 => StatusCode::ServiceUnavailable,
            504 => StatusCode::GatewayTimeout,
            _ => return None,
        })
    }
}

/// Which body handle the response has handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Unused,
    Stream,
    Writer,
}

/// Response facade over an output [`Channel`].
///
/// Head mutators are silently ignored once the response is committed. The
/// body is written through either [`Response::output_stream`] or
/// [`Response::writer`], never both.
pub struct Response<T: Transport> {
    status: StatusCode,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    committed: bool,
    body: BodyMode,
    channel: Channel<T>,
}

impl<T: Transport> Response<T> {
    pub fn new(channel: Channel<T>) -> Self {
        Self {
            status: StatusCode::Ok,
            reason: None,
            headers: Vec::new(),
            committed: false,
            body: BodyMode::Unused,
            channel,
        }
    }

    pub fn channel(&self) -> &Channel<T> {
        &self.channel
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_mode(&self) -> BodyMode {
        self.body
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Guard shared by every head mutator.
    fn head_mutable(&self, what: &'static str) -> bool {
        if self.committed {
            tracing::trace!(field = what, "ignored on committed response");
        }
        !self.committed
    }

    pub fn set_status(&mut self, status: StatusCode) {
        if self.head_mutable("status") {
            self.status = status;
            self.reason = None;
        }
    }

    /// Sets the status with a custom reason phrase.
    pub fn set_status_with_reason(&mut self, status: StatusCode, reason: impl Into<String>) {
        if self.head_mutable("status") {
            self.status = status;
            self.reason = Some(reason.into());
        }
    }

    /// Adds or replaces a header. Names compare case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if !self.head_mutable("header") {
            return;
        }
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.set_header("Content-Type", content_type);
    }

    pub fn set_content_length(&mut self, len: u64) {
        self.set_header("Content-Length", len.to_string());
    }

    /// Queues the serialized head ahead of the body. Idempotent.
    pub fn commit(&mut self) -> Result<(), ChannelError> {
        if self.committed {
            return Ok(());
        }
        let head = serialize_head(self.status, self.reason.as_deref(), &self.headers);
        self.channel.preface(&head)?;
        self.committed = true;
        tracing::trace!(status = self.status.as_u16(), bytes = head.len(), "response committed");
        Ok(())
    }

    pub fn output_stream(&mut self) -> Result<BodyStream<'_, T>, ChannelError> {
        if self.body == BodyMode::Writer {
            return Err(ChannelError::ProtocolViolation(
                "output stream requested after the text writer was used",
            ));
        }
        self.body = BodyMode::Stream;
        Ok(BodyStream { response: self })
    }

    pub fn writer(&mut self) -> Result<BodyWriter<'_, T>, ChannelError> {
        if self.body == BodyMode::Stream {
            return Err(ChannelError::ProtocolViolation(
                "text writer requested after the output stream was used",
            ));
        }
        self.body = BodyMode::Writer;
        Ok(BodyWriter { response: self })
    }

    /// Sends a bare status response with an optional plain-text message and
    /// completes it.
    pub fn send_status(&mut self, status: StatusCode, message: Option<&str>) -> Result<(), ChannelError> {
        if self.committed {
            return Err(ChannelError::ProtocolViolation(
                "status sent after the response was committed",
            ));
        }

        self.status = status;
        self.reason = None;
        let body = message.unwrap_or("");
        if !body.is_empty() {
            self.set_content_type("text/plain");
        }
        self.set_content_length(body.len() as u64);
        self.commit()?;

        let sent = self
            .channel
            .preface(body.as_bytes())
            .and_then(|()| self.channel.finish());
        if let Err(e) = &sent {
            // The head is out; a truncated body must not leave the response open.
            tracing::debug!(error = %e, status = status.as_u16(), "status response aborted");
            self.channel.close();
        }
        sent
    }

    pub fn buffer_size(&self) -> usize {
        self.channel.buffer_capacity()
    }

    /// Resizes the output buffer. Only valid before the response is
    /// committed and while nothing is buffered.
    pub fn set_buffer_size(&mut self, size: usize) -> Result<(), ChannelError> {
        if self.committed {
            return Err(ChannelError::ProtocolViolation(
                "buffer size changed after the response was committed",
            ));
        }
        self.channel.set_buffer_capacity(size)
    }

    /// Discards buffered body bytes. The head is left untouched.
    pub fn reset_buffer(&mut self) -> Result<(), ChannelError> {
        if self.committed {
            return Err(ChannelError::ProtocolViolation(
                "buffer reset after the response was committed",
            ));
        }
        let dropped = self.channel.discard_buffered()?;
        tracing::trace!(dropped, "response buffer reset");
        Ok(())
    }

    /// Clears the status, headers, body handle choice and buffered bytes of
    /// an uncommitted response.
    pub fn reset(&mut self) -> Result<(), ChannelError> {
        if self.committed {
            return Err(ChannelError::ProtocolViolation(
                "response reset after it was committed",
            ));
        }
        self.channel.discard_buffered()?;
        self.status = StatusCode::Ok;
        self.reason = None;
        self.headers.clear();
        self.body = BodyMode::Unused;
        Ok(())
    }

    /// Commits and completes the body.
    pub fn finish(&mut self) -> Result<(), ChannelError> {
        self.commit()?;
        self.channel.finish()
    }

    pub fn close_connection(&self) {
        self.channel.close();
    }

    /// Resets every field and installs `channel`, so the response object can
    /// serve another request. The previous channel is closed.
    pub fn recycle(&mut self, channel: Channel<T>) {
        self.channel.close();
        self.status = StatusCode::Ok;
        self.reason = None;
        self.headers.clear();
        self.committed = false;
        self.body = BodyMode::Unused;
        self.channel = channel;
    }
}
