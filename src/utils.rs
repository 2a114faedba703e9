//! Shared utility functions

/// Text before the first newline, or the whole string. A trailing `\r` is dropped.
pub fn first_line(s: &str) -> &str {
    let line = match s.find('\n') {
        Some(pos) => &s[..pos],
        None => s,
    };
    line.strip_suffix('\r').unwrap_or(line)
}

/// Make text safe inside the label part of an Org link `[[target][label]]`
pub fn sanitize_link_label(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '[' => '(',
            ']' => ')',
            other => other,
        })
        .collect()
}

/// Fold line breaks to spaces so the text stays on one Org line
pub fn single_line(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Treat None, empty and whitespace-only names alike
pub fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}
