//! Cut points for buffered text.
//!
//! All positions are byte offsets on UTF-8 boundaries. A newline at offset 0
//! is a separator left over from the previous chunk and never ends a cut.

/// Largest char boundary `<= index`.
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn last_newline_after_start(window: &str) -> Option<usize> {
    window.rfind('\n').filter(|&pos| pos > 0)
}

/// End of the next text chunk taken from the front of `buffer`.
///
/// The chunk stops before the last newline inside the first `limit` bytes;
/// that newline stays buffered as the separator for the next chunk. A
/// window without a usable newline is taken whole. Returns 0 when there is
/// nothing to send.
pub fn text_chunk_end(buffer: &str, limit: usize) -> usize {
    let window = &buffer[..floor_char_boundary(buffer, limit)];
    match last_newline_after_start(window) {
        Some(pos) => pos,
        None if window == "\n" => 0,
        None => window.len(),
    }
}

/// End of a document cut once the buffer exceeds `threshold` bytes.
///
/// Cuts after the last newline at or before the threshold. A single line
/// crossing the threshold is taken in full, up to and including its
/// newline, or the whole buffer when it has none.
pub fn document_end(buffer: &str, threshold: usize) -> usize {
    let head = &buffer[..floor_char_boundary(buffer, threshold)];
    if let Some(pos) = last_newline_after_start(head) {
        return pos + 1;
    }
    buffer[head.len()..]
        .find('\n')
        .map(|pos| head.len() + pos + 1)
        .unwrap_or(buffer.len())
}

/// Split point for message text longer than `limit`.
pub fn message_split(text: &str, limit: usize) -> usize {
    let window = &text[..floor_char_boundary(text, limit)];
    last_newline_after_start(window).unwrap_or(window.len())
}
