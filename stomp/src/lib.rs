//! STOMP 1.2 frame model and text codec for the realtime notification transport.
//!
//! This crate owns the wire representation spoken over the `/ws` WebSocket.
//! Every WebSocket text message carries exactly one STOMP frame or a bare
//! heart-beat (one or more EOLs).
//!
//! WIRE FORMAT
//! ===========
//! ```text
//! COMMAND\n
//! header:value\n
//! ...\n
//! \n
//! body\0
//! ```
//! Header values are escaped (`\\`, `\n`, `\r`, `\c`) on every frame except
//! `CONNECT` and `CONNECTED`, which keep raw values for 1.0 compatibility.

/// A bare heart-beat sent in place of a frame.
pub const HEARTBEAT: &str = "\n";

/// Protocol versions offered on `CONNECT`.
pub const ACCEPT_VERSIONS: &str = "1.2,1.1,1.0";

/// Error returned by [`decode_frame`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The command line is not a STOMP command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// A header line has no `:` separator.
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    /// A header value carries an escape sequence STOMP does not define.
    #[error("invalid escape sequence in header: {0}")]
    InvalidEscape(String),
    /// `content-length` is not a non-negative integer.
    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),
    /// The frame ended before the blank line or the declared body length.
    #[error("frame truncated")]
    Truncated,
    /// The body is not terminated by a NUL octet.
    #[error("frame body missing NUL terminator")]
    MissingNul,
}

/// STOMP command carried on the first line of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    /// Wire spelling of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }

    /// Parse a command line.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownCommand`] for anything outside STOMP 1.2.
    pub fn parse(raw: &str) -> Result<Self, CodecError> {
        match raw {
            "CONNECT" => Ok(Self::Connect),
            "STOMP" => Ok(Self::Stomp),
            "CONNECTED" => Ok(Self::Connected),
            "SEND" => Ok(Self::Send),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "ERROR" => Ok(Self::Error),
            "DISCONNECT" => Ok(Self::Disconnect),
            other => Err(CodecError::UnknownCommand(other.to_owned())),
        }
    }

    /// Whether header values on this command travel unescaped.
    fn raw_headers(self) -> bool {
        matches!(self, Self::Connect | Self::Connected)
    }
}

/// A single STOMP frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order. Repeated names are allowed; the first wins.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: String::new() }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of the first header named `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `CONNECT` frame opening a session against `host`.
    #[must_use]
    pub fn connect(host: &str, heart_beat: HeartBeat) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", ACCEPT_VERSIONS)
            .with_header("host", host)
            .with_header("heart-beat", heart_beat.to_header())
    }

    /// `SUBSCRIBE` frame binding subscription `id` to `destination`.
    #[must_use]
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    #[must_use]
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header("id", id)
    }

    /// `DISCONNECT` frame, optionally requesting a receipt.
    #[must_use]
    pub fn disconnect(receipt: Option<&str>) -> Self {
        let frame = Self::new(Command::Disconnect);
        match receipt {
            Some(id) => frame.with_header("receipt", id),
            None => frame,
        }
    }
}

/// Heart-beat intervals in milliseconds; `0` disables a direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeartBeat {
    pub outgoing_ms: u64,
    pub incoming_ms: u64,
}

impl HeartBeat {
    #[must_use]
    pub fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self { outgoing_ms, incoming_ms }
    }

    /// Parse a `heart-beat` header value (`"cx,cy"`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (out, inc) = raw.split_once(',')?;
        Some(Self {
            outgoing_ms: out.trim().parse().ok()?,
            incoming_ms: inc.trim().parse().ok()?,
        })
    }

    #[must_use]
    pub fn to_header(self) -> String {
        format!("{},{}", self.outgoing_ms, self.incoming_ms)
    }

    /// Effective intervals from the client's side once the server answered
    /// with its own `heart-beat` header.
    #[must_use]
    pub fn negotiate(client: Self, server: Self) -> Self {
        let pick = |ours: u64, theirs: u64| if ours == 0 || theirs == 0 { 0 } else { ours.max(theirs) };
        Self {
            outgoing_ms: pick(client.outgoing_ms, server.incoming_ms),
            incoming_ms: pick(client.incoming_ms, server.outgoing_ms),
        }
    }
}

/// Encode a frame into its wire text, including the trailing NUL.
#[must_use]
pub fn encode_frame(frame: &Frame) -> String {
    let raw = frame.command.raw_headers();
    let mut out = String::with_capacity(frame.body.len() + 64);
    out.push_str(frame.command.as_str());
    out.push('\n');
    for (name, value) in &frame.headers {
        if raw {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
        } else {
            push_escaped(&mut out, name);
            out.push(':');
            push_escaped(&mut out, value);
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&frame.body);
    out.push('\0');
    out
}

/// Decode one WebSocket text message.
///
/// Returns `Ok(None)` for a heart-beat.
///
/// # Errors
///
/// Returns a [`CodecError`] describing the first structural problem found.
pub fn decode_frame(text: &str) -> Result<Option<Frame>, CodecError> {
    let trimmed = text.trim_start_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (command_line, mut rest) = next_line(trimmed).ok_or(CodecError::Truncated)?;
    let command = Command::parse(command_line)?;

    let mut headers = Vec::new();
    loop {
        let (line, after) = next_line(rest).ok_or(CodecError::Truncated)?;
        rest = after;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| CodecError::MalformedHeader(line.to_owned()))?;
        if command.raw_headers() {
            headers.push((name.to_owned(), value.to_owned()));
        } else {
            headers.push((unescape(name)?, unescape(value)?));
        }
    }

    let declared = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| v.clone());
    let body = match declared {
        Some(raw) => {
            let len = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| CodecError::InvalidContentLength(raw.clone()))?;
            let body = rest.get(..len).ok_or(CodecError::Truncated)?;
            if !rest[len..].starts_with('\0') {
                return Err(CodecError::MissingNul);
            }
            body
        }
        None => {
            let end = rest.find('\0').ok_or(CodecError::MissingNul)?;
            &rest[..end]
        }
    };

    Ok(Some(Frame { command, headers, body: body.to_owned() }))
}

/// Split off one line, accepting `\n` or `\r\n` endings.
fn next_line(text: &str) -> Option<(&str, &str)> {
    let pos = text.find('\n')?;
    let line = &text[..pos];
    Some((line.strip_suffix('\r').unwrap_or(line), &text[pos + 1..]))
}

fn push_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(value: &str) -> Result<String, CodecError> {
    if !value.contains('\\') {
        return Ok(value.to_owned());
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(CodecError::InvalidEscape(value.to_owned())),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
