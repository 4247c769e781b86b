use serde::{Deserialize, Serialize};

/// Envelope sent to the peer. The three file arrays are index-aligned:
/// `file_paths[i]` was read into `file_contents[i]` (base64) and carries
/// the basename `file_names[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    pub message: String,
    pub timestamp: String,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub file_names: Vec<String>,
    #[serde(default)]
    pub file_contents: Vec<String>,
}

impl OutboundEnvelope {
    pub fn new(message: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: timestamp.into(),
            file_paths: Vec::new(),
            file_names: Vec::new(),
            file_contents: Vec::new(),
        }
    }

    /// Appends one attachment to all three arrays, keeping them aligned.
    pub fn push_file(&mut self, path: String, name: String, contents_b64: String) {
        self.file_paths.push(path);
        self.file_names.push(name);
        self.file_contents.push(contents_b64);
    }

    pub fn attachment_count(&self) -> usize {
        self.file_paths.len()
    }
}

/// Message received from the peer, keyed by its `type` field. Types this
/// bridge does not handle deserialize to `Unknown` instead of failing, so
/// a newer peer cannot stop the read loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ResponseText { text: String },
    Shutdown,
    #[serde(other)]
    Unknown,
}
