use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use erica_tutor::message::{Message, Role};
use erica_tutor::render::{self, plain, Rendered, LOADING_PLACEHOLDER};
use erica_tutor::RenderMode;
use crate::app::{App, InputMode};

const USER_COLOR: Color = Color::Cyan;
const ERICA_COLOR: Color = Color::Yellow;
const MAX_INPUT_LINES: u16 = 5;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input (grows with the draft), footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_height(&app.session.draft)),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Erica Tutor ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("Personalized Learning Assistant ", Style::default().fg(Color::Gray)),
        Span::styled(app.endpoint().to_string(), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

/// Heading line above each message: who sent it and when
fn message_label(message: &Message) -> Line<'static> {
    let time = message.time_label();
    match message.role {
        Role::User => Line::from(vec![
            Span::styled(time, Style::default().fg(Color::DarkGray)),
            Span::styled(" You", Style::default().fg(USER_COLOR).add_modifier(Modifier::BOLD)),
        ])
        .alignment(Alignment::Right),
        Role::Assistant => {
            let color = if message.is_error { Color::Red } else { ERICA_COLOR };
            Line::from(vec![
                Span::styled("Erica ", Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::styled(time, Style::default().fg(Color::DarkGray)),
            ])
        }
    }
}

fn message_body(app: &App, message: &Message) -> Vec<Line<'static>> {
    match message.role {
        Role::User => plain::render(&message.content)
            .lines
            .into_iter()
            .map(|line| line.alignment(Alignment::Right))
            .collect(),
        Role::Assistant if message.is_error => vec![Line::styled(
            message.content.clone(),
            Style::default().fg(Color::Red),
        )],
        Role::Assistant => {
            match render::render_content(app.render_mode, app.engine.get(), &message.content) {
                Rendered::Text(text) => text.lines,
                Rendered::Pending => vec![Line::styled(
                    LOADING_PLACEHOLDER,
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )],
            }
        }
    }
}

fn chat_text(app: &App) -> Text<'static> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for message in app.session.messages() {
        lines.push(message_label(message));
        lines.extend(message_body(app, message));
        lines.push(Line::default());
    }

    if app.is_awaiting() {
        lines.push(Line::from(Span::styled(
            "Erica",
            Style::default().fg(ERICA_COLOR).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    Text::from(lines)
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.input_mode == InputMode::Normal;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let inner_width = area.width.saturating_sub(2);
    app.chat_height = area.height.saturating_sub(2);

    let chat = Paragraph::new(chat_text(app)).wrap(Wrap { trim: false });
    // Count rows the same way the widget wraps them
    let total = chat.line_count(inner_width).min(u16::MAX as usize) as u16;
    app.max_scroll = total.saturating_sub(app.chat_height);
    app.chat_scroll = if app.follow {
        app.max_scroll
    } else {
        app.chat_scroll.min(app.max_scroll)
    };

    frame.render_widget(chat.block(block).scroll((app.chat_scroll, 0)), area);

    if app.max_scroll > 0 {
        let mut state = ScrollbarState::new(app.max_scroll as usize).position(app.chat_scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(ratatui::layout::Margin { vertical: 1, horizontal: 0 }),
            &mut state,
        );
    }
}

/// Height of the input box: one row per draft line, up to a limit
fn input_height(draft: &str) -> u16 {
    let lines = draft.split('\n').count().clamp(1, MAX_INPUT_LINES as usize) as u16;
    lines + 2
}

/// Row and column of the cursor (a char index) within a multi-line draft
fn cursor_row_col(draft: &str, cursor: usize) -> (usize, usize) {
    let before: String = draft.chars().take(cursor).collect();
    let row = before.matches('\n').count();
    let col = before.rsplit('\n').next().map_or(0, |line| line.chars().count());
    (row, col)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let (title, border_color) = if app.is_awaiting() {
        (" Waiting for Erica... ", Color::DarkGray)
    } else if editing {
        (" Ask (Enter to send, Alt+Enter for newline) ", Color::Yellow)
    } else {
        (" Ask (i to type) ", Color::DarkGray)
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let draft = &app.session.draft;
    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let (row, col) = cursor_row_col(draft, app.cursor);

    // Scroll both ways so the cursor stays inside the box
    let col_offset = col.saturating_sub(inner_width.saturating_sub(1));
    let row_offset = row.saturating_sub(inner_height.saturating_sub(1));

    if draft.is_empty() {
        let placeholder = Paragraph::new(Span::styled(
            "Ask Erica a question...",
            Style::default().fg(Color::DarkGray),
        ))
        .block(input_block);
        frame.render_widget(placeholder, area);
    } else {
        let visible: Vec<Line> = draft
            .split('\n')
            .skip(row_offset)
            .take(inner_height)
            .map(|line| Line::raw(line.chars().skip(col_offset).take(inner_width).collect::<String>()))
            .collect();

        let input = Paragraph::new(visible)
            .style(Style::default().fg(USER_COLOR))
            .block(input_block);
        frame.render_widget(input, area);
    }

    if editing && inner_width > 0 && inner_height > 0 {
        let x = (col - col_offset) as u16;
        let y = (row - row_offset) as u16;
        frame.set_cursor_position((area.x + 1 + x, area.y + 1 + y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" ASK ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<(&str, &str)> = match app.input_mode {
        InputMode::Editing => vec![
            (" Enter ", " send "),
            (" Alt+Enter ", " newline "),
            (" Esc ", " scroll "),
            (" PgUp/PgDn ", " scroll "),
            (" ^L ", " clear "),
            (" ^C ", " quit "),
        ],
        InputMode::Normal => vec![
            (" j/k ", " scroll "),
            (" g/G ", " top/bottom "),
            (" i ", " ask "),
            (" c ", " clear "),
            (" q ", " quit "),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled(label, label_style));
    }

    let [hints_area, mode_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(20)]).areas(area);
    frame.render_widget(Paragraph::new(Line::from(spans)), hints_area);

    let render_label = match app.render_mode {
        RenderMode::Markdown => app.render_mode.display_name().to_uppercase(),
        _ => app.render_mode.display_name().to_string(),
    };
    frame.render_widget(
        Paragraph::new(Span::styled(render_label, Style::default().fg(Color::DarkGray)))
            .alignment(Alignment::Right),
        mode_area,
    );
}
