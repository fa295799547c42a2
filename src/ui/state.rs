//! Presentation state of the terminal UI: the input line, the transcript
//! viewport and the settings panel.

use crate::core::settings::SettingsForm;
use crate::utils::scroll::ScrollState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    Model,
    Temperature,
    MaxTokens,
    Streaming,
}

impl SettingField {
    pub const ALL: [SettingField; 4] = [
        SettingField::Model,
        SettingField::Temperature,
        SettingField::MaxTokens,
        SettingField::Streaming,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingField::Model => "Model",
            SettingField::Temperature => "Temperature",
            SettingField::MaxTokens => "Max tokens",
            SettingField::Streaming => "Streaming",
        }
    }

    fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|field| *field == self)
            .unwrap_or_default()
    }

    pub fn next(self) -> SettingField {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> SettingField {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Current control value as shown in the panel.
    pub fn value(self, form: &SettingsForm) -> String {
        match self {
            SettingField::Model => form.model.display_name().to_string(),
            SettingField::Temperature => form.temperature.clone(),
            SettingField::MaxTokens => form.max_tokens.clone(),
            SettingField::Streaming => if form.use_streaming { "on" } else { "off" }.to_string(),
        }
    }

    /// Moves the control one step; `direction` is negative for left.
    pub fn adjust(self, form: &mut SettingsForm, direction: i32) {
        match self {
            SettingField::Model => form.cycle_model(),
            SettingField::Temperature => form.nudge_temperature(direction),
            SettingField::MaxTokens => form.nudge_max_tokens(direction),
            SettingField::Streaming => form.toggle_streaming(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiState {
    pub input: String,
    /// Cursor position in characters.
    pub cursor: usize,
    pub scroll: ScrollState,
    pub settings_open: bool,
    pub selected_setting: SettingField,
    pub base_url: String,
    /// Transcript size at the last draw, used for paging.
    pub transcript_lines: usize,
    pub transcript_height: u16,
}

impl UiState {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            input: String::new(),
            cursor: 0,
            scroll: ScrollState::default(),
            settings_open: false,
            selected_setting: SettingField::Model,
            base_url: base_url.into(),
            transcript_lines: 0,
            transcript_height: 0,
        }
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_index)
            .map(|(index, _)| index)
            .unwrap_or(self.input.len())
    }

    pub fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn insert_str(&mut self, text: &str) {
        let at = self.byte_index(self.cursor);
        self.input.insert_str(at, text);
        self.cursor += text.chars().count();
    }

    pub fn insert_char(&mut self, ch: char) {
        let at = self.byte_index(self.cursor);
        self.input.insert(at, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.input.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input_len() {
            let at = self.byte_index(self.cursor);
            self.input.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input_len());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.input_len();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    pub fn toggle_settings(&mut self) {
        self.settings_open = !self.settings_open;
    }

    pub fn page_up(&mut self) {
        let page = self.transcript_height.max(1);
        self.scroll
            .scroll_up(page, self.transcript_lines, self.transcript_height);
    }

    pub fn page_down(&mut self) {
        let page = self.transcript_height.max(1);
        self.scroll
            .scroll_down(page, self.transcript_lines, self.transcript_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_respects_multibyte_characters() {
        let mut state = UiState::new("http://localhost");
        state.insert_str("año");
        state.move_left();
        state.backspace();
        assert_eq!(state.input, "ao");
        assert_eq!(state.cursor, 1);

        state.insert_char('ñ');
        state.move_home();
        state.delete();
        assert_eq!(state.input, "ño");
        state.move_end();
        state.move_right();
        assert_eq!(state.cursor, 2);

        state.clear_input();
        assert!(state.input.is_empty());
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn setting_fields_wrap_and_adjust() {
        assert_eq!(SettingField::Model.previous(), SettingField::Streaming);
        assert_eq!(SettingField::Streaming.next(), SettingField::Model);

        let mut form = SettingsForm::default();
        SettingField::Temperature.adjust(&mut form, 1);
        SettingField::MaxTokens.adjust(&mut form, -1);
        SettingField::Streaming.adjust(&mut form, 1);
        SettingField::Model.adjust(&mut form, -1);

        assert_eq!(SettingField::Temperature.value(&form), "0.8");
        assert_eq!(SettingField::MaxTokens.value(&form), "900");
        assert_eq!(SettingField::Streaming.value(&form), "on");
        assert_eq!(SettingField::Model.value(&form), "GPT-3.5 Turbo");
    }

    #[test]
    fn paging_moves_by_the_visible_height() {
        let mut state = UiState::new("http://localhost");
        state.transcript_lines = 50;
        state.transcript_height = 10;

        state.page_up();
        assert_eq!(state.scroll.effective_offset(50, 10), 30);
        state.page_down();
        assert!(state.scroll.follow_bottom);
    }
}
