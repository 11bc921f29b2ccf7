pub mod artifacts;
pub mod clipboard;
pub mod config;
pub mod system_clipboard;
pub mod util;

pub use artifacts::{ArtifactOrigin, FileArtifact};
pub use clipboard::{ClipboardItem, ClipboardRepresentation, ClipboardSource, ClipboardType};
pub use config::WidgetConfig;
