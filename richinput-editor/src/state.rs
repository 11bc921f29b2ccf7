//! Observable editor state shared between the bridge and the application.
//!
//! Mutators are crate-private: the coordinator writes on inbound messages,
//! the [`EditorHandle`](crate::handle::EditorHandle) writes for programmatic
//! updates, and everyone else observes through [`SharedEditorState::subscribe`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use richinput_core::FileArtifact;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditorState {
    /// Canonical content. The host is authoritative; the page mirrors it.
    pub text: String,
    /// Last reported content height, unclamped.
    pub height: f64,
    pub pasted_file_artifacts: Vec<FileArtifact>,
    /// Most recent file written by the large-text spill path.
    pub large_text_spill: Option<FileArtifact>,
    /// One-shot focus signal; `Some(true)` while a request is pending.
    pub focus_request: Option<bool>,
    #[serde(skip)]
    focus_generation: u64,
}

/// Who caused a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// An inbound message from the content surface.
    Surface,
    /// The application, through the editor handle.
    Host,
    /// The focus reset timer.
    Timer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum StateChange {
    Text { text: String },
    Height { height: f64 },
    PastedFileArtifacts { artifacts: Vec<FileArtifact> },
    LargeTextSpill { artifact: FileArtifact },
    FocusRequest { value: Option<bool> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateEvent {
    pub origin: ChangeOrigin,
    #[serde(flatten)]
    pub change: StateChange,
}

pub type SubscriptionId = u64;

type Observer = Arc<dyn Fn(&StateEvent) + Send + Sync>;

struct Inner {
    state: Mutex<EditorState>,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_id: AtomicU64,
}

/// Cloneable handle to one editor's state.
#[derive(Clone)]
pub struct SharedEditorState {
    inner: Arc<Inner>,
}

impl Default for SharedEditorState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedEditorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEditorState")
            .field("state", &*self.inner.state.lock())
            .field("observers", &self.inner.observers.lock().len())
            .finish()
    }
}

impl SharedEditorState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EditorState::default()),
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn snapshot(&self) -> EditorState {
        self.inner.state.lock().clone()
    }

    pub fn read<T>(&self, f: impl FnOnce(&EditorState) -> T) -> T {
        f(&self.inner.state.lock())
    }

    /// Register an observer. It runs on whichever thread made the change,
    /// after the state lock has been released.
    pub fn subscribe(&self, observer: impl Fn(&StateEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.lock().push((id, Arc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.inner.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    // -----------------------------------------------------------------------
    // Crate-private mutators
    // -----------------------------------------------------------------------

    pub(crate) fn set_text(&self, origin: ChangeOrigin, text: String) {
        {
            let mut state = self.inner.state.lock();
            if state.text == text {
                return;
            }
            state.text = text.clone();
        }
        self.notify(origin, StateChange::Text { text });
    }

    pub(crate) fn set_height(&self, origin: ChangeOrigin, height: f64) {
        {
            let mut state = self.inner.state.lock();
            if state.height == height {
                return;
            }
            state.height = height;
        }
        self.notify(origin, StateChange::Height { height });
    }

    pub(crate) fn append_artifact(&self, origin: ChangeOrigin, artifact: FileArtifact) {
        let artifacts = {
            let mut state = self.inner.state.lock();
            state.pasted_file_artifacts.push(artifact);
            state.pasted_file_artifacts.clone()
        };
        self.notify(origin, StateChange::PastedFileArtifacts { artifacts });
    }

    pub(crate) fn replace_artifacts(&self, origin: ChangeOrigin, artifacts: Vec<FileArtifact>) {
        self.inner.state.lock().pasted_file_artifacts = artifacts.clone();
        self.notify(origin, StateChange::PastedFileArtifacts { artifacts });
    }

    pub(crate) fn take_artifacts(&self, origin: ChangeOrigin) -> Vec<FileArtifact> {
        let taken = std::mem::take(&mut self.inner.state.lock().pasted_file_artifacts);
        if !taken.is_empty() {
            self.notify(
                origin,
                StateChange::PastedFileArtifacts {
                    artifacts: Vec::new(),
                },
            );
        }
        taken
    }

    pub(crate) fn set_large_text_spill(&self, origin: ChangeOrigin, artifact: FileArtifact) {
        self.inner.state.lock().large_text_spill = Some(artifact.clone());
        self.notify(origin, StateChange::LargeTextSpill { artifact });
    }

    /// Raise the focus signal and return the generation of this request.
    pub(crate) fn request_focus(&self, origin: ChangeOrigin) -> u64 {
        let generation = {
            let mut state = self.inner.state.lock();
            state.focus_generation += 1;
            state.focus_request = Some(true);
            state.focus_generation
        };
        self.notify(origin, StateChange::FocusRequest { value: Some(true) });
        generation
    }

    /// Clear the focus signal unless a newer request has superseded
    /// `generation`. Returns whether it was cleared.
    pub(crate) fn expire_focus_request(&self, origin: ChangeOrigin, generation: u64) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.focus_generation != generation || state.focus_request.is_none() {
                return false;
            }
            state.focus_request = None;
        }
        self.notify(origin, StateChange::FocusRequest { value: None });
        true
    }

    fn notify(&self, origin: ChangeOrigin, change: StateChange) {
        let observers: Vec<Observer> = self
            .inner
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        if observers.is_empty() {
            return;
        }
        let event = StateEvent { origin, change };
        for observer in observers {
            observer(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use richinput_core::ArtifactOrigin;

    fn recorder(state: &SharedEditorState) -> Arc<Mutex<Vec<StateEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        state.subscribe(move |event| sink.lock().push(event.clone()));
        events
    }

    #[test]
    fn text_change_notifies_once() {
        let state = SharedEditorState::new();
        let events = recorder(&state);

        state.set_text(ChangeOrigin::Surface, "hello".into());
        state.set_text(ChangeOrigin::Surface, "hello".into());

        assert_eq!(state.snapshot().text, "hello");
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].origin, ChangeOrigin::Surface);
        assert_eq!(
            events[0].change,
            StateChange::Text {
                text: "hello".into()
            }
        );
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let state = SharedEditorState::new();
        let events = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&events);
        let id = state.subscribe(move |_| *sink.lock() += 1);

        state.set_height(ChangeOrigin::Surface, 10.0);
        assert!(state.unsubscribe(id));
        assert!(!state.unsubscribe(id));
        state.set_height(ChangeOrigin::Surface, 20.0);

        assert_eq!(*events.lock(), 1);
        assert_eq!(state.snapshot().height, 20.0);
    }

    #[test]
    fn observers_may_read_state() {
        let state = SharedEditorState::new();
        let reader = state.clone();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        state.subscribe(move |_| *sink.lock() = reader.read(|s| s.text.clone()));

        state.set_text(ChangeOrigin::Host, "no deadlock".into());
        assert_eq!(*seen.lock(), "no deadlock");
    }

    #[test]
    fn take_artifacts_drains() {
        let state = SharedEditorState::new();
        state.append_artifact(
            ChangeOrigin::Surface,
            FileArtifact::new("/tmp/a.txt", ArtifactOrigin::SpilledText),
        );
        let taken = state.take_artifacts(ChangeOrigin::Host);
        assert_eq!(taken.len(), 1);
        assert!(state.snapshot().pasted_file_artifacts.is_empty());
        assert!(state.take_artifacts(ChangeOrigin::Host).is_empty());
    }

    #[test]
    fn stale_focus_generation_does_not_clear() {
        let state = SharedEditorState::new();
        let first = state.request_focus(ChangeOrigin::Host);
        let second = state.request_focus(ChangeOrigin::Host);

        assert!(!state.expire_focus_request(ChangeOrigin::Timer, first));
        assert_eq!(state.snapshot().focus_request, Some(true));
        assert!(state.expire_focus_request(ChangeOrigin::Timer, second));
        assert_eq!(state.snapshot().focus_request, None);
    }

    #[test]
    fn state_event_serializes_flat() {
        let event = StateEvent {
            origin: ChangeOrigin::Surface,
            change: StateChange::Height { height: 42.0 },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"origin": "surface", "field": "height", "height": 42.0})
        );
    }
}
