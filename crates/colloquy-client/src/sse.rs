//! Minimal SSE line handling for the streaming endpoint.
//!
//! The stream endpoint emits one `data:` line per event plus periodic
//! keep-alive comments; `event:` lines are advisory (the kind also lives in
//! the payload), so the parser only cares about data lines.

/// Parse an SSE "data:" line, returning None for "[DONE]" and non-data
/// lines.
pub(crate) fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let data = data.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// True for lines the parser should skip entirely: blanks, comments
/// (keep-alives), and field lines other than `data:`.
pub(crate) fn is_ignorable(line: &str) -> bool {
    line.is_empty() || line.starts_with(':') || !line.starts_with("data:")
}
