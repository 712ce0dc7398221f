use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn now_epoch_ms() -> anyhow::Result<u128> {
    use anyhow::Context;
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("compute timestamp")?
        .as_millis())
}

/// Clip `text` to at most `max_lines` lines and `max_bytes` bytes, appending
/// a marker when anything was dropped.
pub fn bounded_snippet(text: &str, max_lines: usize, max_bytes: usize) -> String {
    let marker = "\n[... output truncated ...]\n";
    if max_lines == 0 || max_bytes == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut truncated = false;

    for (line_idx, chunk) in text.split_inclusive('\n').enumerate() {
        if line_idx >= max_lines {
            truncated = true;
            break;
        }
        if out.len() + chunk.len() > max_bytes {
            let remaining = max_bytes.saturating_sub(out.len());
            out.push_str(truncate_utf8(chunk, remaining));
            truncated = true;
            break;
        }
        out.push_str(chunk);
    }

    if !truncated && out.len() < text.len() {
        truncated = true;
    }

    if truncated {
        if max_bytes <= marker.len() {
            return truncate_utf8(marker, max_bytes).to_string();
        }
        let available = max_bytes - marker.len();
        if out.len() > available {
            out = truncate_utf8(&out, available).to_string();
        }
        out.push_str(marker);
    }

    out
}

pub fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
