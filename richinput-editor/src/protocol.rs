use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Channels: WebView → Rust (sent via window.webkit.messageHandlers.<name>)
// ---------------------------------------------------------------------------

pub const CHANNEL_TEXT_CHANGED: &str = "textChanged";
pub const CHANNEL_HEIGHT_CHANGED: &str = "heightChanged";
pub const CHANNEL_SUBMIT: &str = "submit";
pub const CHANNEL_LARGE_TEXT_PASTED: &str = "largeTextPasted";
pub const CHANNEL_FILE_PASTED: &str = "filePasted";
pub const CHANNEL_CONSOLE_LOG: &str = "consoleLogHandler";

/// Every channel the host registers a message handler for.
pub const INBOUND_CHANNELS: [&str; 6] = [
    CHANNEL_TEXT_CHANGED,
    CHANNEL_HEIGHT_CHANGED,
    CHANNEL_SUBMIT,
    CHANNEL_LARGE_TEXT_PASTED,
    CHANNEL_FILE_PASTED,
    CHANNEL_CONSOLE_LOG,
];

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Full plain-text content after a visible mutation.
    TextChanged(String),
    HeightChanged(f64),
    Submit,
    /// A paste longer than the large-text threshold.
    LargeTextPasted(String),
    /// Files were pasted; the payload must be re-read from the clipboard.
    FilePasted,
    ConsoleLog(String),
}

impl InboundMessage {
    /// Decode a message posted on `channel`.
    ///
    /// Returns `None` for unknown channels and for payloads of the wrong
    /// type; both are treated as if nothing arrived.
    pub fn decode(channel: &str, body: &serde_json::Value) -> Option<Self> {
        match channel {
            CHANNEL_TEXT_CHANGED => body.as_str().map(|s| Self::TextChanged(s.to_string())),
            CHANNEL_HEIGHT_CHANGED => decode_height(body).map(Self::HeightChanged),
            CHANNEL_SUBMIT => Some(Self::Submit),
            CHANNEL_LARGE_TEXT_PASTED => {
                body.as_str().map(|s| Self::LargeTextPasted(s.to_string()))
            }
            CHANNEL_FILE_PASTED => Some(Self::FilePasted),
            CHANNEL_CONSOLE_LOG => Some(Self::ConsoleLog(match body {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })),
            _ => None,
        }
    }

    pub fn channel(&self) -> &'static str {
        match self {
            Self::TextChanged(_) => CHANNEL_TEXT_CHANGED,
            Self::HeightChanged(_) => CHANNEL_HEIGHT_CHANGED,
            Self::Submit => CHANNEL_SUBMIT,
            Self::LargeTextPasted(_) => CHANNEL_LARGE_TEXT_PASTED,
            Self::FilePasted => CHANNEL_FILE_PASTED,
            Self::ConsoleLog(_) => CHANNEL_CONSOLE_LOG,
        }
    }
}

fn decode_height(body: &serde_json::Value) -> Option<f64> {
    let height = match body {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    height.is_finite().then_some(height)
}

/// Wire form for transports with a single message handler (webkit6, FFI):
/// `{"channel": "textChanged", "body": "hello"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub channel: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl InboundEnvelope {
    pub fn decode(&self) -> Option<InboundMessage> {
        InboundMessage::decode(&self.channel, &self.body)
    }
}

/// Parse and decode an envelope. Malformed JSON decodes to `None`.
pub fn decode_envelope(json: &str) -> Option<InboundMessage> {
    match serde_json::from_str::<InboundEnvelope>(json) {
        Ok(envelope) => envelope.decode(),
        Err(e) => {
            log::debug!("Ignoring malformed inbound envelope: {}", e);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Commands: Rust → WebView (sent via evaluate_javascript, result ignored)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    /// Replace the displayed content. A no-op in the page when unchanged.
    UpdateContent { text: String },
    /// Focus the editable region.
    Focus,
}

impl OutboundCommand {
    pub fn to_script(&self) -> String {
        match self {
            Self::UpdateContent { text } => {
                format!("updateEditorContent(`{}`)", escape_template_literal(text))
            }
            Self::Focus => "focusEditor()".to_string(),
        }
    }
}

/// Build the script that pushes `text` into the editor.
pub fn push_editor_content(text: &str) -> String {
    OutboundCommand::UpdateContent {
        text: text.to_string(),
    }
    .to_script()
}

/// Escape text for a JavaScript template literal.
///
/// Backslashes, backticks and `${` are escaped so the literal evaluates to
/// exactly `text`.
pub fn escape_template_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_template_literal`], i.e. what the JS engine does when
/// evaluating the literal for the escapes we emit.
pub fn unescape_template_literal(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
