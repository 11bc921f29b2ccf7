use std::path::{Path, PathBuf};

use url::Url;

/// Convert a local path to a `file://` URI.
pub fn file_path_to_uri(path: &Path) -> Option<String> {
    if path.is_dir() {
        Url::from_directory_path(path).ok().map(|u| u.to_string())
    } else {
        Url::from_file_path(path).ok().map(|u| u.to_string())
    }
}

/// Parse a single file locator as found on the clipboard.
///
/// Accepts `file://` URLs (percent-encoded or not) and bare absolute paths.
/// Anything else (other URL schemes, relative paths, blank input) is `None`.
pub fn file_locator_to_path(locator: &str) -> Option<PathBuf> {
    let locator = locator.trim().trim_end_matches('\0');
    if locator.is_empty() {
        return None;
    }

    if let Ok(parsed) = Url::parse(locator) {
        if parsed.scheme() != "file" {
            return None;
        }
        if let Ok(path) = parsed.to_file_path() {
            return Some(path);
        }
        // Host-form file URIs (file://hostname/path) are rejected by
        // to_file_path(); fall back to the decoded URL path.
        let decoded = percent_decode(parsed.path());
        return if decoded.starts_with('/') {
            Some(PathBuf::from(decoded))
        } else {
            None
        };
    }

    let path = Path::new(locator);
    if path.is_absolute() {
        Some(path.to_path_buf())
    } else {
        None
    }
}

/// Parse a `text/uri-list` style payload: one locator per line, `#` lines
/// are comments. Lines that are not valid file locators are skipped.
pub fn parse_file_locators(payload: &str) -> Vec<PathBuf> {
    payload
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(file_locator_to_path)
        .collect()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).to_string()
}

/// Escape text for safe injection into HTML markup (element content or a
/// double/single-quoted attribute value).
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_to_path() {
        assert_eq!(
            file_locator_to_path("file:///home/user/report.pdf"),
            Some(PathBuf::from("/home/user/report.pdf"))
        );
    }

    #[test]
    fn file_url_percent_encoded() {
        assert_eq!(
            file_locator_to_path("file:///home/user/my%20notes.txt"),
            Some(PathBuf::from("/home/user/my notes.txt"))
        );
    }

    #[test]
    fn absolute_path_accepted() {
        assert_eq!(
            file_locator_to_path("  /tmp/foo.txt\n"),
            Some(PathBuf::from("/tmp/foo.txt"))
        );
    }

    #[test]
    fn non_file_locators_rejected() {
        assert_eq!(file_locator_to_path("https://example.com/a.png"), None);
        assert_eq!(file_locator_to_path("relative/path.txt"), None);
        assert_eq!(file_locator_to_path(""), None);
        assert_eq!(file_locator_to_path("   "), None);
    }

    #[test]
    fn uri_list_skips_comments_and_garbage() {
        let payload = "# copied by file manager\r\nfile:///a/one.png\r\nnot a path\r\nfile:///b/two.pdf\r\n";
        assert_eq!(
            parse_file_locators(payload),
            vec![PathBuf::from("/a/one.png"), PathBuf::from("/b/two.pdf")]
        );
    }

    #[test]
    fn percent_decode_handles_trailing_percent() {
        assert_eq!(percent_decode("/a%20b"), "/a b");
        assert_eq!(percent_decode("/a%"), "/a%");
        assert_eq!(percent_decode("/a%2"), "/a%2");
        assert_eq!(percent_decode("/a%zz"), "/a%zz");
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("Ask anything…"), "Ask anything…");
    }

    #[test]
    fn file_path_to_uri_existing_dir() {
        let uri = file_path_to_uri(Path::new("/tmp"));
        assert!(uri.unwrap().starts_with("file:///tmp"));
    }
}
