/// Returns the first balanced `{...}` span in free-form model output.
///
/// Braces inside JSON string literals (including escaped quotes) are ignored,
/// so prose before or after the object, or a fenced code block, is skipped.
/// A `{` that never closes is passed over and the scan resumes at the next one.
pub fn first_json_object(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(found) = text[from..].find('{') {
        let start = from + found;
        if let Some(end) = balanced_end(text, start) {
            return Some(&text[start..end]);
        }
        from = start + 1;
    }
    None
}

/// Byte offset just past the `}` closing the `{` at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
