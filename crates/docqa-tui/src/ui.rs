use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use docqa_core::ChatRole;
use crate::app::{App, Field, InputMode, TextInput};

/// Render a line of answer text, turning **bold** runs into styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        let Some(len) = after_open.find("**") else {
            break;
        };
        if len == 0 {
            // "****" is literal
            spans.push(Span::raw(rest[..start + 4].to_string()));
            rest = &rest[start + 4..];
            continue;
        }
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after_open[..len].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after_open[len + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, attach_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_field(
        app,
        frame,
        attach_area,
        Field::Attachment,
        attachment_title(app),
        Color::Magenta,
    );
    render_field(app, frame, input_area, Field::Query, " Ask ".to_string(), Color::Cyan);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" docqa ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.transport.base_url().to_string(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn attachment_title(app: &App) -> String {
    match &app.attachment {
        Some(doc) => format!(" PDF: {} ", doc.file_name),
        None => " PDF: none attached ".to_string(),
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    app.scroll_chat_to_bottom();

    let streaming = app.session.with_conversation(|c| c.is_streaming());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if streaming { Color::Yellow } else { Color::DarkGray }))
        .title(" Conversation ");

    let mut lines: Vec<Line> = app.session.with_conversation(|conv| {
        let mut lines = Vec::new();
        for msg in conv.turns() {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.content.clone()));
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    lines.extend(msg.content.lines().map(parse_markdown_line));
                }
            }
            lines.push(Line::default());
        }
        lines
    });

    if app.is_thinking() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let text = if lines.is_empty() {
        Text::from(Span::styled(
            "Attach a PDF, then ask a question about it...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_field(
    app: &App,
    frame: &mut Frame,
    area: Rect,
    field: Field,
    title: String,
    accent: Color,
) {
    let focused = app.focus == field && app.input_mode == InputMode::Editing;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::DarkGray }))
        .title(title);

    let input: &TextInput = match field {
        Field::Query => &app.query,
        Field::Attachment => &app.attachment_path,
    };

    // Horizontal scroll keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else {
        (input.cursor + 1).saturating_sub(inner_width)
    };

    let visible: String = input.text.chars().skip(scroll_offset).take(inner_width).collect();
    let paragraph = Paragraph::new(visible)
        .style(Style::default().fg(accent))
        .block(block);
    frame.render_widget(paragraph, area);

    if focused {
        let cursor_x = (input.cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" SCROLL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" EDIT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];

    let hints: &[(&str, &str)] = match (app.input_mode, app.focus) {
        (InputMode::Editing, Field::Query) => {
            &[(" Enter ", " send "), (" Tab ", " pdf "), (" Esc ", " scroll ")]
        }
        (InputMode::Editing, Field::Attachment) => {
            &[(" Enter ", " attach "), (" Tab ", " ask "), (" Esc ", " scroll ")]
        }
        (InputMode::Normal, _) => &[
            (" j/k ", " scroll "),
            (" g/G ", " top/end "),
            (" i ", " type "),
            (" a ", " pdf "),
            (" q ", " quit "),
        ],
    };
    for (key, label) in hints {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    // Status message wins over the last progress step
    let note = app
        .status
        .clone()
        .or_else(|| app.session.progress().last().cloned());
    if let Some(note) = note {
        spans.push(Span::styled(format!("  {}", note), Style::default().fg(Color::Gray)));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
