/// Find the `[` that opens the link label closed by the `]` at `close`.
///
/// Walks backward keeping a nesting depth, so labels that embed image links
/// (`[![alt](src) text](href)`) resolve to the outer bracket. Returns `None`
/// when the start of the text is reached first (truncated markup).
pub fn find_label_start(text: &str, close: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(close) != Some(&b']') {
        return None;
    }

    // Brackets are ASCII, so byte positions are always char boundaries here.
    let mut depth = 0usize;
    for pos in (0..=close).rev() {
        match bytes[pos] {
            b']' => depth += 1,
            b'[' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split listing-page markdown into one chunk per leading `[![` marker.
///
/// Text before the first marker is returned as its own chunk.
pub fn split_on_image_links(text: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = text.match_indices("[![").map(|(i, _)| i).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .filter(|chunk| !chunk.is_empty())
        .collect()
}
