//! Bridge between the WebView and the host.
//!
//! Messages posted by the page are decoded by [`protocol`](crate::protocol),
//! queued on an [`InboundQueue`] and dispatched one at a time by a
//! [`BridgeCoordinator`], which mutates [`SharedEditorState`] and runs the
//! host callbacks. The coordinator keeps no state of its own between
//! messages.

use std::path::PathBuf;

use crossbeam_channel::{unbounded, Receiver, Sender};
use richinput_core::artifacts;
use richinput_core::clipboard::{self, ClipboardSource};
use richinput_core::{FileArtifact, WidgetConfig};

use crate::protocol::{self, InboundMessage};
use crate::state::{ChangeOrigin, SharedEditorState};

/// Target used for messages the page logs through `consoleLogHandler`.
pub const SURFACE_LOG_TARGET: &str = "richinput::surface";

/// Evaluates a script in the content surface. Fire-and-forget: no result
/// comes back. Implement this for your WebView.
pub trait ScriptEvaluator: Send + Sync + 'static {
    fn evaluate(&self, script: &str);
}

impl<F> ScriptEvaluator for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn evaluate(&self, script: &str) {
        self(script)
    }
}

pub type SubmitCallback = Box<dyn FnMut() + Send>;
pub type FilesPastedCallback = Box<dyn FnMut(&[FileArtifact]) + Send>;

// ---------------------------------------------------------------------------
// Inbound queue
// ---------------------------------------------------------------------------

/// Single-consumer queue of decoded inbound messages.
pub struct InboundQueue {
    tx: Sender<InboundMessage>,
    rx: Receiver<InboundMessage>,
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> InboundSender {
        InboundSender {
            tx: self.tx.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Producer side of the queue, handed to WebView message handlers.
#[derive(Clone)]
pub struct InboundSender {
    tx: Sender<InboundMessage>,
}

impl InboundSender {
    /// Decode and enqueue a message posted on `channel`. Unknown channels
    /// and malformed payloads are dropped silently. Returns whether a
    /// message was enqueued.
    pub fn post(&self, channel: &str, body: &serde_json::Value) -> bool {
        match InboundMessage::decode(channel, body) {
            Some(message) => self.send(message),
            None => false,
        }
    }

    /// Enqueue a `{"channel": ..., "body": ...}` envelope.
    pub fn post_envelope(&self, json: &str) -> bool {
        match protocol::decode_envelope(json) {
            Some(message) => self.send(message),
            None => false,
        }
    }

    pub fn send(&self, message: InboundMessage) -> bool {
        if self.tx.send(message).is_err() {
            log::warn!("Inbound queue closed, dropping message");
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct BridgeCoordinator {
    config: WidgetConfig,
    artifact_dir: PathBuf,
    state: SharedEditorState,
    clipboard: Box<dyn ClipboardSource>,
    on_submit: Option<SubmitCallback>,
    on_files_pasted: Option<FilesPastedCallback>,
}

impl BridgeCoordinator {
    pub fn new(
        config: WidgetConfig,
        state: SharedEditorState,
        clipboard: impl ClipboardSource + 'static,
    ) -> Self {
        let artifact_dir = config.artifact_dir();
        Self {
            config,
            artifact_dir,
            state,
            clipboard: Box::new(clipboard),
            on_submit: None,
            on_files_pasted: None,
        }
    }

    pub fn on_submit(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_submit = Some(Box::new(callback));
        self
    }

    pub fn on_files_pasted(
        mut self,
        callback: impl FnMut(&[FileArtifact]) + Send + 'static,
    ) -> Self {
        self.on_files_pasted = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedEditorState {
        &self.state
    }

    /// Decode and dispatch a raw message in one step.
    pub fn handle_raw(&mut self, channel: &str, body: &serde_json::Value) {
        if let Some(message) = InboundMessage::decode(channel, body) {
            self.handle(message);
        }
    }

    pub fn handle(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::TextChanged(text) => {
                // No echo back: the page already shows this text.
                self.state.set_text(ChangeOrigin::Surface, text);
            }
            InboundMessage::HeightChanged(height) => {
                self.state.set_height(ChangeOrigin::Surface, height);
            }
            InboundMessage::Submit => {
                if let Some(callback) = self.on_submit.as_mut() {
                    callback();
                }
            }
            InboundMessage::LargeTextPasted(text) => self.spill_large_text(&text),
            InboundMessage::FilePasted => self.ingest_clipboard(),
            InboundMessage::ConsoleLog(message) => {
                log::debug!(target: SURFACE_LOG_TARGET, "{}", message);
            }
        }
    }

    /// Process everything currently queued. Returns the number handled.
    pub fn drain(&mut self, queue: &InboundQueue) -> usize {
        let mut handled = 0;
        while let Ok(message) = queue.rx.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Process messages until every [`InboundSender`] has been dropped.
    pub fn run(mut self, queue: InboundQueue) {
        let InboundQueue { tx, rx } = queue;
        drop(tx);
        for message in rx.iter() {
            self.handle(message);
        }
        log::debug!("Inbound queue closed, bridge coordinator stopping");
    }

    fn spill_large_text(&mut self, text: &str) {
        let artifact = match artifacts::spill_text(&self.artifact_dir, text) {
            Ok(artifact) => artifact,
            Err(e) => {
                log::error!("Dropping large text paste ({} chars): {}", text.chars().count(), e);
                return;
            }
        };
        log::info!(
            "Spilled {} char paste to {:?}",
            text.chars().count(),
            artifact.path
        );

        self.state
            .set_large_text_spill(ChangeOrigin::Surface, artifact.clone());
        if let Some(callback) = self.on_files_pasted.as_mut() {
            callback(std::slice::from_ref(&artifact));
        }
        self.state.append_artifact(ChangeOrigin::Surface, artifact);
    }

    fn ingest_clipboard(&mut self) {
        let produced = clipboard::normalize_paste(self.clipboard.as_mut(), &self.artifact_dir);
        if produced.is_empty() {
            log::debug!("File paste produced no artifacts");
            return;
        }
        log::info!("File paste produced {} artifact(s)", produced.len());

        self.state
            .replace_artifacts(ChangeOrigin::Surface, produced.clone());
        if let Some(callback) = self.on_files_pasted.as_mut() {
            callback(&produced);
        }
    }
}
