use richinput_core::util::escape_html;
use richinput_core::WidgetConfig;
use serde::Serialize;

pub const EDITOR_HTML: &str = include_str!("../web/editor.html");
pub const EDITOR_JS: &str = include_str!("../web/editor.js");

/// Quiescence the page waits for before reporting a new height.
pub const HEIGHT_DEBOUNCE_MS: u32 = 100;

/// Values the page script reads from `window.richInputConfig`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageConfig {
    large_text_threshold: usize,
    height_debounce_ms: u32,
    min_height: f64,
}

/// Render the complete page loaded into the WebView.
///
/// The placeholder is HTML-escaped, the page config is embedded as JSON and
/// the editor script is inlined, so the result has no external references.
pub fn render_editor_html(config: &WidgetConfig) -> String {
    let page_config = PageConfig {
        large_text_threshold: config.text_length_for_large_text_file,
        height_debounce_ms: HEIGHT_DEBOUNCE_MS,
        min_height: config.min_text_height,
    };
    let config_json = match serde_json::to_string(&page_config) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize page config: {}", e);
            "{}".to_string()
        }
    };

    // The placeholder is substituted last so its text is never re-scanned
    // for template markers.
    EDITOR_HTML
        .replace("{{EDITOR_JS}}", &escape_inline_script(EDITOR_JS))
        .replace("{{CONFIG_JSON}}", &escape_inline_script(&config_json))
        .replace("{{MIN_HEIGHT}}", &format_css_px(config.min_text_height))
        .replace("{{PLACEHOLDER}}", &escape_html(&config.placeholder))
}

/// Prevent `</script>` inside inlined code from closing the script element.
fn escape_inline_script(source: &str) -> String {
    source.replace("</", "<\\/")
}

fn format_css_px(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
