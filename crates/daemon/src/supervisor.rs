use peerbridge_core::{Config, DiagnosticLog, Paths, Result};
use peerbridge_wire::{self as wire, ReadOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::outbound::OutboundBuilder;
use crate::router::InboundRouter;
use crate::sink::ResponseSink;
use crate::watcher::{InboxUpdate, InboxWatcher};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the worker tasks and the shutdown channel. Cancellation is a
/// broadcast every loop observes at its next select point; there is no
/// shared mutable flag. The outbound stream and the diagnostic log each
/// have their own lock, so a slow log append cannot stall a send.
pub struct Supervisor {
    config: Config,
    paths: Paths,
    diag: Arc<DiagnosticLog>,
}

impl Supervisor {
    pub fn new(config: Config, paths: Paths) -> Self {
        let diag = Arc::new(DiagnosticLog::new(config.log_file(&paths)));
        Self {
            config,
            paths,
            diag,
        }
    }

    pub async fn run(self) -> Result<()> {
        self.diag.record("bridge starting");

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(8);
        let (outbound_tx, outbound_rx) =
            mpsc::channel::<InboxUpdate>(self.config.bridge.queue_size);

        let watcher = InboxWatcher::new(&self.config, &self.paths, self.diag.clone());
        let watcher_shutdown_tx = shutdown_tx.clone();
        let watcher_rx = shutdown_tx.subscribe();
        let watcher_handle: JoinHandle<()> = tokio::spawn(async move {
            if let Err(e) = watcher.run(outbound_tx, watcher_rx).await {
                error!(error = %e, "watcher failed");
                let _ = watcher_shutdown_tx.send(());
            }
        });

        let outbound_handle = self.spawn_outbound_dispatcher(outbound_rx, &shutdown_tx);
        let inbound_handle = self.spawn_inbound_loop(&shutdown_tx);

        self.diag.record("bridge ready");
        info!("bridge ready");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, draining tasks");
            }
            _ = shutdown_rx.recv() => {
                info!("internal shutdown requested, draining tasks");
            }
        }
        let _ = shutdown_tx.send(());

        let handles: Vec<(&str, JoinHandle<()>)> = vec![
            ("watcher", watcher_handle),
            ("outbound", outbound_handle),
            ("inbound", inbound_handle),
        ];
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        for (name, handle) in handles {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, handle).await {
                Ok(_) => debug!(task = name, "task drained"),
                Err(_) => warn!(task = name, "task did not stop before deadline"),
            }
        }

        self.diag.record("bridge stopped");
        info!("bridge stopped");
        Ok(())
    }

    /// Builds envelopes from inbox updates and writes frames to the peer.
    /// The stream mutex is held for prefix plus payload, so a frame is
    /// never interleaved with another write. An oversized envelope is
    /// rejected by the wire layer, logged, and dropped; the watcher is
    /// not notified.
    fn spawn_outbound_dispatcher(
        &self,
        mut outbound_rx: mpsc::Receiver<InboxUpdate>,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> JoinHandle<()> {
        let builder = OutboundBuilder::new(self.diag.clone());
        let diag = self.diag.clone();
        let stdout = Arc::new(Mutex::new(tokio::io::stdout()));
        let mut shutdown = shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe = outbound_rx.recv() => {
                        let Some(update) = maybe else { break };
                        let envelope = builder.build(update);
                        let attachments = envelope.attachment_count();
                        let mut writer = stdout.lock().await;
                        match wire::send_envelope(&mut *writer, &envelope).await {
                            Ok(()) => {
                                debug!(attachments, "envelope sent");
                                diag.record(format!(
                                    "sent message with {} files",
                                    attachments
                                ));
                            }
                            Err(e) => {
                                error!(error = %e, "failed to send envelope");
                                diag.record(format!("send rejected: {}", e));
                            }
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }

    /// Sole consumer of the peer's output. A disconnect or a fatal
    /// protocol violation (invalid length field) broadcasts shutdown;
    /// a malformed payload inside a valid frame only skips that frame.
    fn spawn_inbound_loop(&self, shutdown_tx: &broadcast::Sender<()>) -> JoinHandle<()> {
        let sink = ResponseSink::new(
            self.config.response_file(&self.paths),
            self.config.fallback_response_file(&self.paths),
            self.diag.clone(),
        );
        let router = InboundRouter::new(sink, self.diag.clone());
        let diag = self.diag.clone();
        let notify_shutdown = shutdown_tx.clone();
        let mut shutdown = shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut reader = BufReader::new(tokio::io::stdin());
            loop {
                tokio::select! {
                    outcome = wire::read_message(&mut reader) => {
                        match outcome {
                            Ok(ReadOutcome::Message(message)) => router.dispatch(message),
                            Ok(ReadOutcome::Skipped) => {}
                            Ok(ReadOutcome::Disconnected) => {
                                info!("peer stream closed");
                                diag.record("peer stream closed");
                                let _ = notify_shutdown.send(());
                                break;
                            }
                            Err(e) => {
                                error!(error = %e, "inbound channel failed");
                                diag.record(format!("fatal protocol error: {}", e));
                                let _ = notify_shutdown.send(());
                                break;
                            }
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}
