use std::sync::Arc;
use std::time::Duration;

use richinput_core::FileArtifact;

use crate::bridge::ScriptEvaluator;
use crate::focus::{FocusTimer, FOCUS_RESET_DELAY};
use crate::protocol::OutboundCommand;
use crate::state::{
    ChangeOrigin, EditorState, SharedEditorState, StateChange, StateEvent, SubscriptionId,
};

/// Application-facing handle to one rich input widget.
///
/// Programmatic text changes are pushed into the page; text changes that
/// came from the page are not echoed back.
pub struct EditorHandle {
    state: SharedEditorState,
    evaluator: Arc<dyn ScriptEvaluator>,
    focus: FocusTimer,
    outbound: SubscriptionId,
}

impl EditorHandle {
    pub fn new(state: SharedEditorState, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        Self::with_focus_delay(state, evaluator, FOCUS_RESET_DELAY)
    }

    pub fn with_focus_delay(
        state: SharedEditorState,
        evaluator: Arc<dyn ScriptEvaluator>,
        focus_delay: Duration,
    ) -> Self {
        let sink = Arc::clone(&evaluator);
        let outbound = state.subscribe(move |event| {
            if let Some(command) = outbound_command(event) {
                sink.evaluate(&command.to_script());
            }
        });
        let focus = FocusTimer::spawn(state.clone(), focus_delay);

        Self {
            state,
            evaluator,
            focus,
            outbound,
        }
    }

    pub fn state(&self) -> &SharedEditorState {
        &self.state
    }

    pub fn snapshot(&self) -> EditorState {
        self.state.snapshot()
    }

    pub fn text(&self) -> String {
        self.state.read(|s| s.text.clone())
    }

    pub fn height(&self) -> f64 {
        self.state.read(|s| s.height)
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.state.set_text(ChangeOrigin::Host, text.into());
    }

    pub fn clear_text(&self) {
        self.set_text(String::new());
    }

    /// Re-send the current text, e.g. after the page reloads.
    pub fn resync(&self) {
        let text = self.text();
        self.evaluator
            .evaluate(&OutboundCommand::UpdateContent { text }.to_script());
    }

    /// Ask the page to focus the editor. The request self-clears after the
    /// focus delay; asking again before then restarts the delay.
    pub fn request_focus(&self) {
        let generation = self.state.request_focus(ChangeOrigin::Host);
        self.focus.arm(generation);
    }

    /// Drain pasted artifacts. Ownership of the files passes to the caller.
    pub fn take_pasted_artifacts(&self) -> Vec<FileArtifact> {
        self.state.take_artifacts(ChangeOrigin::Host)
    }

    pub fn subscribe(
        &self,
        observer: impl Fn(&StateEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.state.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }
}

impl Drop for EditorHandle {
    fn drop(&mut self) {
        self.state.unsubscribe(self.outbound);
    }
}

/// Map a state change to the script the page needs to see, if any.
fn outbound_command(event: &StateEvent) -> Option<OutboundCommand> {
    match (&event.change, event.origin) {
        (StateChange::Text { text }, ChangeOrigin::Host) => {
            Some(OutboundCommand::UpdateContent { text: text.clone() })
        }
        (StateChange::FocusRequest { value: Some(true) }, _) => Some(OutboundCommand::Focus),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{escape_template_literal, unescape_template_literal};
    use parking_lot::Mutex;
    use std::time::Instant;

    fn handle_with_log(delay: Duration) -> (EditorHandle, Arc<Mutex<Vec<String>>>) {
        let scripts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&scripts);
        let evaluator: Arc<dyn ScriptEvaluator> =
            Arc::new(move |script: &str| sink.lock().push(script.to_string()));
        let handle = EditorHandle::with_focus_delay(SharedEditorState::new(), evaluator, delay);
        (handle, scripts)
    }

    #[test]
    fn host_text_is_pushed() {
        let (handle, scripts) = handle_with_log(FOCUS_RESET_DELAY);
        handle.set_text("use `cargo`");
        assert_eq!(
            *scripts.lock(),
            vec!["updateEditorContent(`use \\`cargo\\``)".to_string()]
        );
        assert_eq!(handle.text(), "use `cargo`");
    }

    #[test]
    fn surface_text_is_not_echoed() {
        let (handle, scripts) = handle_with_log(FOCUS_RESET_DELAY);
        handle
            .state()
            .set_text(ChangeOrigin::Surface, "typed".to_string());
        assert!(scripts.lock().is_empty());
        assert_eq!(handle.text(), "typed");
    }

    #[test]
    fn push_then_echo_round_trips() {
        let (handle, scripts) = handle_with_log(FOCUS_RESET_DELAY);
        let original = "tricky `code` with ${vars} and \\ slashes";
        handle.set_text(original);

        // What the page receives after evaluating the template literal.
        let script = scripts.lock()[0].clone();
        let literal = script
            .strip_prefix("updateEditorContent(`")
            .and_then(|s| s.strip_suffix("`)"))
            .unwrap();
        assert_eq!(literal, escape_template_literal(original));
        let received = unescape_template_literal(literal);

        // The page echoes it back on textChanged.
        handle.state().set_text(ChangeOrigin::Surface, received);
        assert_eq!(handle.text(), original);
        assert_eq!(scripts.lock().len(), 1);
    }

    #[test]
    fn clear_text_pushes_empty_content() {
        let (handle, scripts) = handle_with_log(FOCUS_RESET_DELAY);
        handle.state().set_text(ChangeOrigin::Surface, "sent".into());
        handle.clear_text();
        assert_eq!(handle.text(), "");
        assert_eq!(*scripts.lock(), vec!["updateEditorContent(``)".to_string()]);
    }

    #[test]
    fn resync_pushes_current_text() {
        let (handle, scripts) = handle_with_log(FOCUS_RESET_DELAY);
        handle.state().set_text(ChangeOrigin::Surface, "kept".into());
        handle.resync();
        assert_eq!(*scripts.lock(), vec!["updateEditorContent(`kept`)".to_string()]);
    }

    #[test]
    fn focus_request_evaluates_and_self_clears() {
        let (handle, scripts) = handle_with_log(Duration::from_millis(50));
        handle.request_focus();
        assert_eq!(handle.snapshot().focus_request, Some(true));
        assert_eq!(*scripts.lock(), vec!["focusEditor()".to_string()]);

        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.snapshot().focus_request.is_some() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.snapshot().focus_request, None);
        // Clearing the flag does not trigger another focus action.
        assert_eq!(scripts.lock().len(), 1);
    }

    #[test]
    fn dropping_handle_stops_pushing() {
        let (handle, scripts) = handle_with_log(FOCUS_RESET_DELAY);
        let state = handle.state().clone();
        drop(handle);
        state.set_text(ChangeOrigin::Host, "after drop".into());
        assert!(scripts.lock().is_empty());
    }

    #[test]
    fn take_pasted_artifacts_drains_state() {
        let (handle, _) = handle_with_log(FOCUS_RESET_DELAY);
        handle.state().append_artifact(
            ChangeOrigin::Surface,
            FileArtifact::new("/tmp/x.png", richinput_core::ArtifactOrigin::PastedImage),
        );
        assert_eq!(handle.take_pasted_artifacts().len(), 1);
        assert!(handle.snapshot().pasted_file_artifacts.is_empty());
    }
}
