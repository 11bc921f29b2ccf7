//! C-compatible FFI wrappers around the richinput bridge.
//!
//! All functions use C strings for input/output and JSON encoding for
//! complex types. Callers must free returned strings with
//! `richinput_free_string`.
//!
//! All extern "C" functions are wrapped in `ffi_catch` to prevent Rust
//! panics from crossing the FFI boundary (which is undefined behavior).
//! Panic payloads are logged before returning the fallback value.
//!
//! The native host forwards every WKWebView script message to
//! `richinput_bridge_post_message` and drains `richinput_bridge_poll_event`
//! after each call: scripts to evaluate, submit/paste notifications and
//! state changes all arrive there.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;

use richinput_core::clipboard::{
    ClipboardItem, ClipboardRepresentation, ClipboardSource, MemoryClipboard,
};
use richinput_core::system_clipboard::SystemClipboard;
use richinput_core::{util, FileArtifact, WidgetConfig};
use richinput_editor::bridge::{BridgeCoordinator, InboundQueue, InboundSender, ScriptEvaluator};
use richinput_editor::handle::EditorHandle;
use richinput_editor::protocol::{InboundMessage, INBOUND_CHANNELS};
use richinput_editor::state::{SharedEditorState, StateEvent};

/// Run `f` inside `catch_unwind`, logging the panic payload before returning the
/// fallback value.
fn ffi_catch<T>(fallback: T, f: impl FnOnce() -> T + std::panic::UnwindSafe) -> T {
    match catch_unwind(f) {
        Ok(v) => v,
        Err(payload) => {
            let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            log::error!("FFI panic caught: {}", msg);
            fallback
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_rust_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: Caller guarantees `ptr` is a valid, null-terminated C string
    // whose memory remains valid for the duration of this call.
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .ok()
        .map(String::from)
}

fn to_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => {
            log::warn!(
                "String contains interior NUL bytes, sanitizing ({} chars)",
                s.len()
            );
            let sanitized: String = s.chars().filter(|&c| c != '\0').collect();
            CString::new(sanitized).unwrap_or_default().into_raw()
        }
    }
}

fn to_json_c_string<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => to_c_string(&json),
        Err(e) => {
            log::error!("JSON serialization failed: {}", e);
            to_c_string(&serde_json::json!({"error": format!("serialization failed: {}", e)}).to_string())
        }
    }
}

/// Parse an optional config JSON string; null means defaults.
fn parse_config(config_json: *const c_char) -> Result<WidgetConfig, String> {
    match to_rust_str(config_json) {
        Some(json) if !json.trim().is_empty() => WidgetConfig::from_json(&json),
        _ => Ok(WidgetConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Memory management & logging
// ---------------------------------------------------------------------------

/// Free a string previously returned by a `richinput_*` function.
#[no_mangle]
pub extern "C" fn richinput_free_string(s: *mut c_char) {
    ffi_catch(
        (),
        AssertUnwindSafe(|| {
            if !s.is_null() {
                // SAFETY: `s` was previously returned by `CString::into_raw` from
                // one of the `richinput_*` functions, so it is valid to reclaim it.
                unsafe {
                    drop(CString::from_raw(s));
                }
            }
        }),
    );
}

/// Initialize `env_logger` (honours `RUST_LOG`). Safe to call repeatedly.
#[no_mangle]
pub extern "C" fn richinput_init_logging() {
    ffi_catch(
        (),
        AssertUnwindSafe(|| {
            let _ = env_logger::Builder::from_default_env().try_init();
        }),
    );
}

// ---------------------------------------------------------------------------
// Page assets
// ---------------------------------------------------------------------------

/// Render the editor page for `config_json` (null for defaults).
///
/// Returns the HTML, or a string starting with `ERROR:` if the config is
/// invalid. The caller must free the returned string with
/// `richinput_free_string`.
#[no_mangle]
pub extern "C" fn richinput_render_editor_html(config_json: *const c_char) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| match parse_config(config_json) {
            Ok(config) => to_c_string(&richinput_editor::assets::render_editor_html(&config)),
            Err(e) => to_c_string(&format!("ERROR:{}", e)),
        }),
    )
}

/// Return the script message handler names the host must register, as a
/// JSON array. The caller must free the returned string.
#[no_mangle]
pub extern "C" fn richinput_inbound_channels() -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| to_json_c_string(&INBOUND_CHANNELS)),
    )
}

// ---------------------------------------------------------------------------
// Host events
// ---------------------------------------------------------------------------

/// Maximum number of host events buffered per bridge.
const HOST_EVENT_CHANNEL_CAPACITY: usize = 1_000;

/// Slots kept free for scripts and submit/paste notifications. State
/// change events are dropped once only this many slots remain.
const CONTROL_EVENT_HEADROOM: usize = 100;

/// Everything the native side has to act on, delivered through
/// `richinput_bridge_poll_event`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum HostEvent {
    /// Evaluate `script` in the WebView and ignore the result.
    EvaluateScript { script: String },
    Submit,
    FilesPasted { paths: Vec<String>, urls: Vec<String> },
    StateChanged { event: StateEvent },
}

impl HostEvent {
    fn files_pasted(artifacts: &[FileArtifact]) -> Self {
        HostEvent::FilesPasted {
            paths: artifacts
                .iter()
                .map(|a| a.path.to_string_lossy().to_string())
                .collect(),
            urls: artifacts
                .iter()
                .filter_map(|a| util::file_path_to_uri(&a.path))
                .collect(),
        }
    }
}

fn emit(tx: &Sender<HostEvent>, event: HostEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            log::warn!(
                "Host event channel full ({} capacity), dropping event",
                HOST_EVENT_CHANNEL_CAPACITY
            );
        }
        // The bridge is being freed.
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// State changes are informational (the full state is always available via
/// `richinput_bridge_state_json`), so they yield to control events when the
/// host falls behind.
fn emit_state(tx: &Sender<HostEvent>, event: StateEvent) {
    if tx.len() + CONTROL_EVENT_HEADROOM >= HOST_EVENT_CHANNEL_CAPACITY {
        log::debug!("Host is not polling, dropping state change event");
        return;
    }
    emit(tx, HostEvent::StateChanged { event });
}

/// Clipboard the native side fills before posting `filePasted`. Falls back
/// to the system clipboard when the host supplied nothing.
struct HostPasteboard {
    snapshot: Arc<Mutex<MemoryClipboard>>,
    system: SystemClipboard,
}

impl ClipboardSource for HostPasteboard {
    fn items(&mut self) -> Vec<ClipboardItem> {
        let snapshot = self.snapshot.lock();
        if snapshot.is_empty() {
            drop(snapshot);
            return self.system.items();
        }
        snapshot.items.clone()
    }

    fn file_references(&mut self) -> Vec<PathBuf> {
        let snapshot = self.snapshot.lock();
        if snapshot.is_empty() {
            drop(snapshot);
            return self.system.file_references();
        }
        snapshot.file_references.clone()
    }
}

// ---------------------------------------------------------------------------
// Bridge management
// ---------------------------------------------------------------------------

/// Inner data for a bridge handle, stored in the global registry.
struct BridgeInner {
    handle: EditorHandle,
    coordinator: Mutex<BridgeCoordinator>,
    queue: InboundQueue,
    sender: InboundSender,
    pasteboard: Arc<Mutex<MemoryClipboard>>,
    event_rx: Receiver<HostEvent>,
}

impl BridgeInner {
    /// Dispatch whatever is queued on the calling thread. The host pasteboard
    /// snapshot is only valid for the paste it was supplied for.
    fn dispatch(&self, pasted_files: bool) -> bool {
        let handled = self.coordinator.lock().drain(&self.queue) > 0;
        if pasted_files {
            self.pasteboard.lock().clear();
        }
        handled
    }

    fn post(&self, message: InboundMessage) -> bool {
        let pasted_files = message == InboundMessage::FilePasted;
        self.sender.send(message) && self.dispatch(pasted_files)
    }
}

/// Global registry mapping handle addresses to their inner data.
/// The pointer is only ever used as an opaque key.
fn bridge_registry() -> &'static Mutex<HashMap<usize, Arc<BridgeInner>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<usize, Arc<BridgeInner>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Look up a handle in the global registry and run `f` with the inner data.
/// Returns `default` if the handle is null or freed.
fn with_bridge<T>(handle: *mut BridgeHandle, default: T, f: impl FnOnce(&BridgeInner) -> T) -> T {
    if handle.is_null() {
        return default;
    }
    let key = handle as usize;
    let guard = bridge_registry().lock();
    match guard.get(&key) {
        Some(inner) => {
            let inner = Arc::clone(inner);
            drop(guard); // Release lock before calling f
            f(&inner)
        }
        None => {
            log::warn!("Attempted to use invalid or freed bridge handle");
            default
        }
    }
}

/// Opaque handle token for the C API. Never dereferenced, only used as a key.
pub struct BridgeHandle {
    _private: (),
}

fn build_bridge(config: WidgetConfig) -> BridgeInner {
    let (event_tx, event_rx) = bounded(HOST_EVENT_CHANNEL_CAPACITY);

    let script_tx = event_tx.clone();
    let evaluator: Arc<dyn ScriptEvaluator> = Arc::new(move |script: &str| {
        emit(
            &script_tx,
            HostEvent::EvaluateScript {
                script: script.to_string(),
            },
        )
    });

    let state = SharedEditorState::new();
    let handle = EditorHandle::new(state.clone(), evaluator);

    let state_tx = event_tx.clone();
    handle.subscribe(move |event| emit_state(&state_tx, event.clone()));

    let pasteboard = Arc::new(Mutex::new(MemoryClipboard::new()));
    let clipboard = HostPasteboard {
        snapshot: Arc::clone(&pasteboard),
        system: SystemClipboard::new(),
    };

    let submit_tx = event_tx.clone();
    let files_tx = event_tx;
    let coordinator = BridgeCoordinator::new(config, state, clipboard)
        .on_submit(move || emit(&submit_tx, HostEvent::Submit))
        .on_files_pasted(move |artifacts| emit(&files_tx, HostEvent::files_pasted(artifacts)));

    let queue = InboundQueue::new();
    let sender = queue.sender();

    BridgeInner {
        handle,
        coordinator: Mutex::new(coordinator),
        queue,
        sender,
        pasteboard,
        event_rx,
    }
}

/// Create a bridge for one rich input widget.
///
/// `config_json` is a JSON `WidgetConfig` (null for defaults). Returns an
/// opaque handle, or null if the config is invalid. The caller must free it
/// with `richinput_bridge_free`.
#[no_mangle]
pub extern "C" fn richinput_bridge_new(config_json: *const c_char) -> *mut BridgeHandle {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            let config = match parse_config(config_json) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Refusing to create bridge: {}", e);
                    return std::ptr::null_mut();
                }
            };

            let inner = Arc::new(build_bridge(config));

            // Allocate a stable address to use as an opaque handle key
            let handle = Box::into_raw(Box::new(BridgeHandle { _private: () }));
            bridge_registry().lock().insert(handle as usize, inner);
            handle
        }),
    )
}

/// Free a bridge handle.
#[no_mangle]
pub extern "C" fn richinput_bridge_free(handle: *mut BridgeHandle) {
    ffi_catch(
        (),
        AssertUnwindSafe(|| {
            if handle.is_null() {
                return;
            }
            let key = handle as usize;
            let removed = bridge_registry().lock().remove(&key);
            if removed.is_none() {
                log::warn!("richinput_bridge_free called on already-freed handle");
                return; // Don't double-free
            }
            // SAFETY: `handle` was allocated by `Box::into_raw` in `richinput_bridge_new`.
            // The registry removal above ensures this only happens once per handle.
            unsafe {
                drop(Box::from_raw(handle));
            }
        }),
    );
}

/// Deliver a script message posted on `channel` with a JSON `body_json`
/// (null for an empty body) and dispatch it.
///
/// Returns true if the message was recognized and handled. Unknown channels
/// and malformed payloads return false and change nothing.
#[no_mangle]
pub extern "C" fn richinput_bridge_post_message(
    handle: *mut BridgeHandle,
    channel: *const c_char,
    body_json: *const c_char,
) -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            let channel = match to_rust_str(channel) {
                Some(s) => s,
                None => return false,
            };
            let body = match to_rust_str(body_json) {
                Some(json) => match serde_json::from_str::<serde_json::Value>(&json) {
                    Ok(value) => value,
                    Err(_) => return false,
                },
                None => serde_json::Value::Null,
            };
            let Some(message) = InboundMessage::decode(&channel, &body) else {
                return false;
            };
            with_bridge(handle, false, |inner| inner.post(message))
        }),
    )
}

/// Deliver a `{"channel": ..., "body": ...}` envelope and dispatch it.
#[no_mangle]
pub extern "C" fn richinput_bridge_post_envelope(
    handle: *mut BridgeHandle,
    envelope_json: *const c_char,
) -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            let json = match to_rust_str(envelope_json) {
                Some(s) => s,
                None => return false,
            };
            let Some(message) = richinput_editor::protocol::decode_envelope(&json) else {
                return false;
            };
            with_bridge(handle, false, |inner| inner.post(message))
        }),
    )
}

/// Add one clipboard representation (`type_tag` is a pasteboard UTI or MIME
/// type) to item `item_index` of the pending paste snapshot.
///
/// Call before posting `filePasted`. The snapshot is cleared once that
/// paste has been handled.
#[no_mangle]
pub extern "C" fn richinput_bridge_clipboard_add(
    handle: *mut BridgeHandle,
    item_index: u32,
    type_tag: *const c_char,
    data: *const u8,
    len: usize,
) -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            let type_tag = match to_rust_str(type_tag) {
                Some(s) => s,
                None => return false,
            };
            let bytes = if len == 0 {
                Vec::new()
            } else if data.is_null() {
                return false;
            } else {
                // SAFETY: Caller guarantees `data` points to `len` readable bytes
                // for the duration of this call.
                unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
            };
            with_bridge(handle, false, |inner| {
                inner.pasteboard.lock().push_representation(
                    item_index as usize,
                    ClipboardRepresentation::new(&type_tag, bytes),
                )
            })
        }),
    )
}

/// Add a generic file reference to the pending paste snapshot.
#[no_mangle]
pub extern "C" fn richinput_bridge_clipboard_add_file_reference(
    handle: *mut BridgeHandle,
    path: *const c_char,
) -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            let Some(path) = to_rust_str(path).and_then(|p| util::file_locator_to_path(&p)) else {
                return false;
            };
            with_bridge(handle, false, |inner| {
                inner.pasteboard.lock().file_references.push(path);
                true
            })
        }),
    )
}

/// Replace the pending paste snapshot with a JSON `MemoryClipboard`
/// (`{"items": [{"representations": [{"type": ..., "data": [..]}]}],
/// "file_references": [..]}`).
#[no_mangle]
pub extern "C" fn richinput_bridge_set_clipboard(
    handle: *mut BridgeHandle,
    clipboard_json: *const c_char,
) -> bool {
    ffi_catch(
        false,
        AssertUnwindSafe(|| {
            let json = match to_rust_str(clipboard_json) {
                Some(s) => s,
                None => return false,
            };
            let snapshot: MemoryClipboard = match serde_json::from_str(&json) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    log::warn!("Ignoring malformed clipboard snapshot: {}", e);
                    return false;
                }
            };
            with_bridge(handle, false, |inner| {
                *inner.pasteboard.lock() = snapshot;
                true
            })
        }),
    )
}

/// Discard the pending paste snapshot.
#[no_mangle]
pub extern "C" fn richinput_bridge_clipboard_clear(handle: *mut BridgeHandle) {
    ffi_catch(
        (),
        AssertUnwindSafe(|| with_bridge(handle, (), |inner| inner.pasteboard.lock().clear())),
    );
}

/// Poll for the next host event.
///
/// Returns a JSON object with a `type` of `evaluateScript`, `submit`,
/// `filesPasted` or `stateChanged`, or null if nothing is pending.
///
/// The host must drain this after every `richinput_bridge_*` call that can
/// change state. Events are buffered up to a fixed capacity; when the host
/// falls behind, `stateChanged` events are dropped first and anything past
/// the capacity is dropped with a warning.
/// The caller must free the returned string with `richinput_free_string`.
#[no_mangle]
pub extern "C" fn richinput_bridge_poll_event(handle: *mut BridgeHandle) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_bridge(handle, std::ptr::null_mut(), |inner| {
                match inner.event_rx.try_recv() {
                    Ok(event) => to_json_c_string(&event),
                    Err(_) => std::ptr::null_mut(),
                }
            })
        }),
    )
}

/// Replace the editor text from the application side. The page update is
/// delivered as an `evaluateScript` event.
#[no_mangle]
pub extern "C" fn richinput_bridge_set_text(handle: *mut BridgeHandle, text: *const c_char) {
    ffi_catch(
        (),
        AssertUnwindSafe(|| {
            let text = to_rust_str(text).unwrap_or_default();
            with_bridge(handle, (), |inner| inner.handle.set_text(text));
        }),
    );
}

#[no_mangle]
pub extern "C" fn richinput_bridge_clear_text(handle: *mut BridgeHandle) {
    ffi_catch(
        (),
        AssertUnwindSafe(|| with_bridge(handle, (), |inner| inner.handle.clear_text())),
    );
}

/// Re-send the current text, e.g. after the page finished loading.
#[no_mangle]
pub extern "C" fn richinput_bridge_resync(handle: *mut BridgeHandle) {
    ffi_catch(
        (),
        AssertUnwindSafe(|| with_bridge(handle, (), |inner| inner.handle.resync())),
    );
}

#[no_mangle]
pub extern "C" fn richinput_bridge_request_focus(handle: *mut BridgeHandle) {
    ffi_catch(
        (),
        AssertUnwindSafe(|| with_bridge(handle, (), |inner| inner.handle.request_focus())),
    );
}

/// Return the current editor state as JSON.
/// The caller must free the returned string with `richinput_free_string`.
#[no_mangle]
pub extern "C" fn richinput_bridge_state_json(handle: *mut BridgeHandle) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_bridge(handle, std::ptr::null_mut(), |inner| {
                to_json_c_string(&inner.handle.snapshot())
            })
        }),
    )
}

/// Drain pasted artifacts as a JSON array of `{path, origin}` objects.
/// Ownership of the files passes to the caller.
#[no_mangle]
pub extern "C" fn richinput_bridge_take_artifacts(handle: *mut BridgeHandle) -> *mut c_char {
    ffi_catch(
        std::ptr::null_mut(),
        AssertUnwindSafe(|| {
            with_bridge(handle, std::ptr::null_mut(), |inner| {
                to_json_c_string(&inner.handle.take_pasted_artifacts())
            })
        }),
    )
}
