use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Word-wraps `text` to `width` display columns.
///
/// Explicit newlines are kept, runs of spaces collapse to one, and words
/// wider than a line are broken. A zero width leaves lines unwrapped.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.split('\n') {
        if width == 0 {
            out.push(paragraph.to_string());
            continue;
        }

        let mut line = String::new();
        let mut line_width = 0usize;
        for word in paragraph.split(' ').filter(|word| !word.is_empty()) {
            let word_width = word.width();
            if line_width > 0 && line_width + 1 + word_width > width {
                out.push(std::mem::take(&mut line));
                line_width = 0;
            }
            if line_width > 0 {
                line.push(' ');
                line_width += 1;
            }
            if word_width <= width - line_width {
                line.push_str(word);
                line_width += word_width;
                continue;
            }
            for ch in word.chars() {
                let ch_width = ch.width().unwrap_or(0);
                if line_width > 0 && line_width + ch_width > width {
                    out.push(std::mem::take(&mut line));
                    line_width = 0;
                }
                line.push(ch);
                line_width += ch_width;
            }
        }
        out.push(line);
    }
    out
}

/// Vertical position of the transcript view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollState {
    pub offset: u16,
    /// Keep the newest line in view as content grows.
    pub follow_bottom: bool,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            offset: 0,
            follow_bottom: true,
        }
    }
}

pub fn max_scroll_offset(total_lines: usize, visible_height: u16) -> u16 {
    let total = u16::try_from(total_lines).unwrap_or(u16::MAX);
    total.saturating_sub(visible_height)
}

impl ScrollState {
    /// Offset to render with, given the current content size.
    pub fn effective_offset(&self, total_lines: usize, visible_height: u16) -> u16 {
        let max = max_scroll_offset(total_lines, visible_height);
        if self.follow_bottom {
            max
        } else {
            self.offset.min(max)
        }
    }

    pub fn scroll_up(&mut self, lines: u16, total_lines: usize, visible_height: u16) {
        let current = self.effective_offset(total_lines, visible_height);
        self.offset = current.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16, total_lines: usize, visible_height: u16) {
        let max = max_scroll_offset(total_lines, visible_height);
        let current = self.effective_offset(total_lines, visible_height);
        self.offset = current.saturating_add(lines).min(max);
        self.follow_bottom = self.offset >= max;
    }

    pub fn jump_to_bottom(&mut self) {
        self.follow_bottom = true;
    }
}
