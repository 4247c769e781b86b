use peerbridge_core::{DiagnosticLog, InboundMessage};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::sink::ResponseSink;

/// Dispatches parsed inbound messages by type. Nothing propagates past
/// this boundary: a failing handler is logged so one bad message cannot
/// stop the read loop.
pub struct InboundRouter {
    sink: ResponseSink,
    diag: Arc<DiagnosticLog>,
}

impl InboundRouter {
    pub fn new(sink: ResponseSink, diag: Arc<DiagnosticLog>) -> Self {
        Self { sink, diag }
    }

    pub fn dispatch(&self, message: InboundMessage) {
        match message {
            InboundMessage::ResponseText { text } => {
                self.diag
                    .record(format!("received response_text ({} chars)", text.len()));
                match self.sink.write(&text) {
                    Ok(path) => self
                        .diag
                        .record(format!("response saved to {}", path.display())),
                    Err(e) => {
                        error!(error = %e, "failed to persist response");
                        self.diag.record(format!("failed to persist response: {}", e));
                    }
                }
            }
            InboundMessage::Shutdown => {
                info!("peer announced shutdown");
                self.diag.record("peer announced shutdown");
            }
            InboundMessage::Unknown => {
                debug!("ignoring unhandled message type");
                self.diag.record("received unhandled message type");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn router(temp: &TempDir) -> (InboundRouter, std::path::PathBuf) {
        let diag = Arc::new(DiagnosticLog::new(temp.path().join("bridge.log")));
        let primary = temp.path().join("output.txt");
        let sink = ResponseSink::new(primary.clone(), temp.path().join("fb.txt"), diag.clone());
        (InboundRouter::new(sink, diag), primary)
    }

    #[test]
    fn response_text_reaches_the_sink() {
        let temp = TempDir::new().unwrap();
        let (router, primary) = router(&temp);

        router.dispatch(InboundMessage::ResponseText { text: "hi".into() });

        assert_eq!(std::fs::read_to_string(&primary).unwrap(), "hi");
    }

    #[test]
    fn other_types_are_ignored_without_writing() {
        let temp = TempDir::new().unwrap();
        let (router, primary) = router(&temp);

        router.dispatch(InboundMessage::Shutdown);
        router.dispatch(InboundMessage::Unknown);

        assert!(!primary.exists());
    }

    #[test]
    fn sink_failure_does_not_escape_the_router() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocked");
        std::fs::write(&blocker, "in the way").unwrap();
        let diag = Arc::new(DiagnosticLog::new(temp.path().join("bridge.log")));
        let sink = ResponseSink::new(
            blocker.join("output.txt"),
            blocker.join("fallback.txt"),
            diag.clone(),
        );
        let router = InboundRouter::new(sink, diag);

        // Must not panic or propagate.
        router.dispatch(InboundMessage::ResponseText { text: "hi".into() });
    }
}
