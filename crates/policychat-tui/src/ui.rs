use policychat_core::Role;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

/// Turn `**bold**` runs into styled spans; everything else stays literal
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // Unclosed, keep it literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
                if found_close {
                    current_text.push_str("**");
                }
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn role_line(role: Role) -> Line<'static> {
    let color = match role {
        Role::User => Color::Cyan,
        Role::Assistant => Color::Yellow,
    };
    Line::from(Span::styled(
        format!("{}:", role.label()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
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
        Span::styled(" 🔍 Insurance ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.backend_url.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Transcript as rendered, without the surrounding block. Also used to
/// count wrapped lines for scrolling, so both always agree.
pub fn chat_paragraph(app: &App) -> Paragraph<'static> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in app.transcript() {
        lines.push(role_line(msg.role));
        match msg.role {
            Role::User => {
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            Role::Assistant => {
                for line in msg.content.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
        }
        lines.push(Line::default());
    }

    if app.is_busy() {
        lines.push(role_line(Role::Assistant));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true })
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow_tail {
        app.scroll_to_bottom();
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Policy Assistant ");

    let chat = chat_paragraph(app)
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.is_busy();
    let border_color = if busy { Color::DarkGray } else { Color::Yellow };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(if busy { " Waiting for reply... " } else { " Ask " });

    let inner_width = area.width.saturating_sub(2) as usize;

    if app.draft().is_empty() {
        let placeholder = Paragraph::new("Ask a question...")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
    } else {
        // Scroll horizontally to keep the cursor visible
        let scroll_offset = if inner_width == 0 {
            0
        } else {
            (app.cursor + 1).saturating_sub(inner_width)
        };

        let visible_text: String = app
            .draft()
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();

        let style = if busy {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let input = Paragraph::new(visible_text).style(style).block(block);
        frame.render_widget(input, area);
    }

    if !busy && inner_width > 0 {
        let scroll_offset = (app.cursor + 1).saturating_sub(inner_width);
        let cursor_x = (app.cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::Gray);

    let mut hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Ctrl-U ", key_style),
        Span::styled(" clear ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ];
    if app.is_busy() {
        hints.insert(
            0,
            Span::styled(" SENDING ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        );
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use policychat_core::{async_trait, ChatEndpoint, ConversationController, SendFailure};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    struct NeverEndpoint;

    #[async_trait]
    impl ChatEndpoint for NeverEndpoint {
        async fn send(&self, _message: &str) -> Result<String, SendFailure> {
            std::future::pending().await
        }
    }

    struct FixedEndpoint(&'static str);

    #[async_trait]
    impl ChatEndpoint for FixedEndpoint {
        async fn send(&self, _message: &str) -> Result<String, SendFailure> {
            Ok(self.0.to_string())
        }
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let mut out = String::new();
        for row in buffer.content.chunks(width) {
            for cell in row {
                out.push_str(cell.symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_parse_markdown_line_bold() {
        let line = parse_markdown_line("The **deductible** is $500.");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "deductible");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_parse_markdown_line_unclosed_is_literal() {
        let line = parse_markdown_line("a **b");
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "a **b");
    }

    #[tokio::test]
    async fn test_render_shows_greeting_and_thinking() {
        let mut app = App::new(
            ConversationController::new(Arc::new(NeverEndpoint)),
            "http://localhost:8000",
        );
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();

        terminal.draw(|f| render(&mut app, f)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Insurance Policy Assistant"));
        assert!(text.contains("Ask a question..."));
        assert!(!text.contains("Thinking"));

        for c in "Is flood covered?".chars() {
            app.insert_char(c);
        }
        app.submit();
        terminal.draw(|f| render(&mut app, f)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Is flood covered?"));
        assert!(text.contains("Thinking."));
        assert!(text.contains("Waiting for reply"));
    }

    #[tokio::test]
    async fn test_tail_shows_last_word_of_word_wrapped_reply() {
        // Each word takes a full row at this width
        let reply = "aaaaaaaaaaa bbbbbbbbbbb ccccccccccc ddddddddddd eeeeeeeeeee ENDMARKERXX";
        let mut app = App::new(
            ConversationController::new(Arc::new(FixedEndpoint(reply))),
            "http://localhost:8000",
        );
        let mut terminal = Terminal::new(TestBackend::new(22, 16)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();

        for c in "limits?".chars() {
            app.insert_char(c);
        }
        app.submit();
        app.controller.reconcile_next().await;
        app.on_tick();
        terminal.draw(|f| render(&mut app, f)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("eeeeeeeeeee"));
        assert!(text.contains("ENDMARKERXX"));
        assert_eq!(app.chat_scroll, app.total_chat_lines() as u16 - app.chat_height);
    }
}
