use serde::{Deserialize, Serialize};

/// Typed protocol events delivered by the transport for one exchange.
///
/// Events arrive as JSON objects tagged by `type`. Kinds this client does not
/// know decode to [`StreamEvent::Unknown`] and are ignored when folded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Binds (or creates) the backend session id.
    Session {
        session_id: String,
        #[serde(default)]
        title: Option<String>,
    },
    /// Available tool metadata for the exchange.
    Init {
        #[serde(default)]
        tools: Vec<String>,
    },
    /// Which backend model serves the exchange.
    Model { model: String },
    /// Assistant text delta.
    Text { content: String },
    /// Auxiliary reasoning content.
    Thinking { content: String },
    /// The assistant invoked a tool.
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Output of a previously announced tool call.
    ToolResult {
        tool_use_id: String,
        /// A string, or content blocks as the tool produced them.
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    /// The exchange finished normally.
    Done {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
    /// The user stopped the exchange.
    Aborted {
        #[serde(default)]
        message: Option<String>,
    },
    /// The backend cannot resume the underlying session.
    SessionUnavailable {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        has_markdown_history: bool,
        #[serde(default)]
        message_count: usize,
    },
    /// The backend reported a failure.
    Error {
        #[serde(alias = "message")]
        error: String,
    },
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Decodes one event from the JSON payload of a transport frame.
    pub fn from_json(data: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Event kind as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Session { .. } => "session",
            StreamEvent::Init { .. } => "init",
            StreamEvent::Model { .. } => "model",
            StreamEvent::Text { .. } => "text",
            StreamEvent::Thinking { .. } => "thinking",
            StreamEvent::ToolUse { .. } => "tool_use",
            StreamEvent::ToolResult { .. } => "tool_result",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Aborted { .. } => "aborted",
            StreamEvent::SessionUnavailable { .. } => "session_unavailable",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Unknown => "unknown",
        }
    }

    /// Whether folding this event ends the exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Done { .. }
                | StreamEvent::Aborted { .. }
                | StreamEvent::SessionUnavailable { .. }
                | StreamEvent::Error { .. }
        )
    }
}

/// Renders `tool_result` content as text.
///
/// Strings are kept verbatim and text blocks are joined by newlines. Other
/// shapes are kept as compact JSON.
pub fn tool_output_text(content: &serde_json::Value) -> String {
    use serde_json::Value;

    match content {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(blocks) => {
            let texts: Option<Vec<&str>> = blocks
                .iter()
                .map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            match texts {
                Some(texts) => texts.join("\n"),
                None => content.to_string(),
            }
        }
        other => other.to_string(),
    }
}
