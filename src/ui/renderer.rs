use crate::core::message::Role;
use crate::core::session::ChatSession;
use crate::ui::state::{SettingField, UiState};
use crate::utils::scroll::wrap_text;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

const LOADING_INDICATOR: &str = "...";

fn speaker_line(role: Role) -> Line<'static> {
    let color = match role {
        Role::User => Color::Cyan,
        Role::Assistant => Color::Green,
    };
    Line::from(Span::styled(
        role.display_tag(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn push_message(lines: &mut Vec<Line<'static>>, role: Role, content: &str, width: u16) {
    let style = match role {
        Role::User => Style::default().fg(Color::Cyan),
        Role::Assistant => Style::default(),
    };
    lines.push(speaker_line(role));
    for row in wrap_text(content, usize::from(width)) {
        lines.push(Line::from(Span::styled(row, style)));
    }
    lines.push(Line::from(""));
}

/// Transcript rows, already wrapped to `width`: committed messages, then the
/// partial streamed reply, then the waiting indicator.
pub fn build_transcript_lines(session: &ChatSession, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    session.store().with_messages(|messages| {
        for message in messages {
            push_message(&mut lines, message.role, &message.content, width);
        }
    });

    let partial = session.streaming_text();
    if session.is_streaming() && !partial.is_empty() {
        push_message(&mut lines, Role::Assistant, &partial, width);
    } else if session.is_busy() {
        lines.push(speaker_line(Role::Assistant));
        lines.push(Line::from(Span::styled(
            LOADING_INDICATOR,
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

pub fn title_text(session: &ChatSession, base_url: &str) -> String {
    let settings = session.settings();
    let mode = if settings.use_streaming {
        "streaming"
    } else {
        "standard"
    };
    format!(
        "Charla v{} • {} • {} • {}",
        env!("CARGO_PKG_VERSION"),
        settings.model.display_name(),
        mode,
        base_url
    )
}

pub fn input_title(session: &ChatSession) -> &'static str {
    if session.is_busy() {
        "Sending..."
    } else {
        "Type a message (Enter to send, F2 settings, PageUp/PageDown scroll, Ctrl+C to quit)"
    }
}

fn settings_lines(session: &ChatSession, selected: SettingField) -> Vec<Line<'static>> {
    SettingField::ALL
        .into_iter()
        .map(|field| {
            let marker = if field == selected { "▶ " } else { "  " };
            let style = if field == selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{marker}{:<12}", field.label()), style),
                Span::raw(field.value(session.settings())),
            ])
        })
        .collect()
}

pub fn ui(f: &mut Frame, session: &ChatSession, state: &mut UiState) {
    let error_height = if session.error().is_some() { 3 } else { 0 };
    let settings_height = if state.settings_open {
        SettingField::ALL.len() as u16 + 2
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(settings_height),
            Constraint::Length(error_height),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(f.area());

    let title = Paragraph::new(title_text(session, &state.base_url))
        .style(Style::default().add_modifier(Modifier::BOLD));
    f.render_widget(title, chunks[0]);

    if state.settings_open {
        let panel = Paragraph::new(settings_lines(session, state.selected_setting)).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Settings (Up/Down select, Left/Right adjust, F2 close)"),
        );
        f.render_widget(panel, chunks[1]);
    }

    if let Some(error) = session.error() {
        let banner = Paragraph::new(error.to_string())
            .style(Style::default().fg(Color::Red))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red))
                    .title("Error (Esc to close)"),
            )
            .wrap(Wrap { trim: true });
        f.render_widget(banner, chunks[2]);
    }

    render_transcript(f, session, state, chunks[3]);
    render_input(f, session, state, chunks[4]);
}

fn render_transcript(f: &mut Frame, session: &ChatSession, state: &mut UiState, area: Rect) {
    let lines = build_transcript_lines(session, area.width);
    state.transcript_lines = lines.len();
    state.transcript_height = area.height;
    let offset = state.scroll.effective_offset(lines.len(), area.height);

    f.render_widget(Paragraph::new(lines).scroll((offset, 0)), area);
}

fn render_input(f: &mut Frame, session: &ChatSession, state: &UiState, area: Rect) {
    let busy = session.is_busy();
    let style = if busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };

    // Keep the cursor visible on long input by scrolling horizontally.
    let inner_width = area.width.saturating_sub(2);
    let before_cursor: String = state.input.chars().take(state.cursor).collect();
    let cursor_x = u16::try_from(before_cursor.width()).unwrap_or(u16::MAX);
    let h_scroll = cursor_x.saturating_sub(inner_width.saturating_sub(1));

    let input = Paragraph::new(state.input.as_str())
        .style(style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(input_title(session)),
        )
        .scroll((0, h_scroll));
    f.render_widget(input, area);

    if !busy {
        f.set_cursor_position((area.x + 1 + cursor_x - h_scroll, area.y + 1));
    }
}
