use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use peerbridge_core::{DiagnosticLog, OutboundEnvelope};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::watcher::InboxUpdate;

pub struct OutboundBuilder {
    diag: Arc<DiagnosticLog>,
}

impl OutboundBuilder {
    pub fn new(diag: Arc<DiagnosticLog>) -> Self {
        Self { diag }
    }

    /// Builds the transport envelope. Watcher references are attached
    /// first; then every remaining body line that names an existing file
    /// is attached too, and the rest of the lines are rejoined as the
    /// message text. An unreadable file is skipped, so the three file
    /// arrays stay aligned.
    pub fn build(&self, update: InboxUpdate) -> OutboundEnvelope {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let mut envelope = OutboundEnvelope::new(String::new(), timestamp);

        for reference in &update.references {
            self.attach(&mut envelope, reference);
        }

        let mut message_lines = Vec::new();
        for line in update.body.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let candidate = Path::new(line);
            if candidate.is_file() {
                self.attach(&mut envelope, candidate);
            } else {
                message_lines.push(line);
            }
        }
        envelope.message = message_lines.join("\n");

        envelope
    }

    fn attach(&self, envelope: &mut OutboundEnvelope, path: &Path) {
        match std::fs::read(path) {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                envelope.push_file(
                    path.to_string_lossy().into_owned(),
                    name,
                    STANDARD.encode(&bytes),
                );
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "skipping unreadable attachment");
                self.diag
                    .record(format!("error reading file {}: {}", path.display(), e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn builder(temp: &TempDir) -> OutboundBuilder {
        OutboundBuilder::new(Arc::new(DiagnosticLog::new(temp.path().join("bridge.log"))))
    }

    #[test]
    fn file_lines_become_attachments_and_text_lines_the_message() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data.bin");
        std::fs::write(&data, b"abc").unwrap();

        let body = format!("first line\n{}\nsecond line", data.display());
        let envelope = builder(&temp).build(InboxUpdate {
            body,
            references: vec![],
        });

        assert_eq!(envelope.message, "first line\nsecond line");
        assert_eq!(envelope.attachment_count(), 1);
        assert_eq!(envelope.file_names, vec!["data.bin"]);
        assert_eq!(envelope.file_contents, vec![STANDARD.encode(b"abc")]);
    }

    #[test]
    fn watcher_references_come_before_line_detected_files() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first.txt");
        let second = temp.path().join("second.txt");
        std::fs::write(&first, b"1").unwrap();
        std::fs::write(&second, b"2").unwrap();

        let envelope = builder(&temp).build(InboxUpdate {
            body: format!("{}\ndo the thing", second.display()),
            references: vec![first.clone()],
        });

        assert_eq!(envelope.message, "do the thing");
        assert_eq!(
            envelope.file_paths,
            vec![first.display().to_string(), second.display().to_string()]
        );
    }

    #[test]
    fn unreadable_reference_is_skipped_and_arrays_stay_aligned() {
        let temp = TempDir::new().unwrap();
        let readable = temp.path().join("ok.txt");
        std::fs::write(&readable, b"ok").unwrap();

        let envelope = builder(&temp).build(InboxUpdate {
            body: "hello".into(),
            references: vec![PathBuf::from("/no/such/attach.txt"), readable],
        });

        assert_eq!(envelope.message, "hello");
        assert_eq!(envelope.attachment_count(), 1);
        assert_eq!(envelope.file_names, vec!["ok.txt"]);
        assert_eq!(envelope.file_paths.len(), envelope.file_contents.len());
    }

    #[test]
    fn timestamp_uses_the_wire_format() {
        let temp = TempDir::new().unwrap();
        let envelope = builder(&temp).build(InboxUpdate {
            body: String::new(),
            references: vec![],
        });
        // `yyyy-MM-dd HH:mm:ss`
        assert_eq!(envelope.timestamp.len(), "2026-01-01 00:00:00".len());
        assert_eq!(&envelope.timestamp[4..5], "-");
        assert_eq!(&envelope.timestamp[10..11], " ");
    }
}
