//! Cleaning up text typed or pasted into the single-line input.

/// Makes pasted text safe for the input line: tabs become four spaces,
/// line breaks become a single space and other control characters are
/// dropped.
pub fn sanitize_text_input(text: &str) -> String {
    let mut sanitized = String::with_capacity(text.len());
    let mut previous_was_break = false;

    for c in text.chars() {
        match c {
            '\r' | '\n' => {
                if !previous_was_break {
                    sanitized.push(' ');
                }
                previous_was_break = true;
                continue;
            }
            '\t' => sanitized.push_str("    "),
            _ if !c.is_control() => sanitized.push(c),
            _ => {}
        }
        previous_was_break = false;
    }

    sanitized
}
