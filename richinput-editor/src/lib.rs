pub mod assets;
pub mod bridge;
pub mod focus;
pub mod handle;
pub mod protocol;
pub mod state;

use std::sync::Arc;

use richinput_core::{ClipboardSource, WidgetConfig};

use crate::bridge::{BridgeCoordinator, ScriptEvaluator};
use crate::handle::EditorHandle;
use crate::state::SharedEditorState;

/// Wire up a rich input widget around a WebView.
///
/// Returns the application handle and the coordinator that consumes inbound
/// messages. The caller attaches submit/paste callbacks to the coordinator
/// and feeds it from the WebView's message handlers.
pub fn create_rich_input(
    config: WidgetConfig,
    evaluator: Arc<dyn ScriptEvaluator>,
    clipboard: impl ClipboardSource + 'static,
) -> (EditorHandle, BridgeCoordinator) {
    let state = SharedEditorState::new();
    let handle = EditorHandle::new(state.clone(), evaluator);
    let coordinator = BridgeCoordinator::new(config, state, clipboard);
    (handle, coordinator)
}
