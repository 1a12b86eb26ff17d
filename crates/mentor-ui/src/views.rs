use crate::app::{UiState, kind_label};
use crate::markdown::{LOADING_STEPS, reasoning_steps, render_markdown};
use crate::slash::HELP_LINES;
use crate::theme::TuiTheme;
use chrono::Local;
use mentor_core::{
    AppView, GenerationKind, InlineAttachment, Message, QuizPhase, Role, StudyHost, Theme,
};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Gauge, Paragraph, Tabs, Wrap};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const CARD_HEIGHT: u16 = 7;

pub fn draw(frame: &mut Frame, host: &dyn StudyHost, ui: &UiState) {
    let theme = TuiTheme::for_theme(host.theme());
    let area = frame.area();
    frame.render_widget(Block::default().style(theme.base()), area);
    if area.width < 20 || area.height < 8 {
        frame.render_widget(
            Paragraph::new("Terminal too small").style(theme.dim()),
            area,
        );
        return;
    }

    let view = host.state().active_view;
    let input_height = if view == AppView::Chat { 3 } else { 0 };
    let [header, body, input, status] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(1),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    draw_header(frame, host, ui, &theme, header);
    match view {
        AppView::Chat => draw_chat(frame, host, ui, &theme, body),
        AppView::Flashcards => draw_flashcards(frame, host, ui, &theme, body),
        AppView::Quiz => draw_quiz(frame, host, &theme, body),
        AppView::Planner => draw_planner(frame, host, ui, &theme, body),
    }
    if view == AppView::Chat {
        draw_input(frame, ui, &theme, input);
    }
    draw_status(frame, ui, &theme, status);

    if ui.show_help {
        let lines: Vec<Line> = HELP_LINES
            .iter()
            .map(|line| Line::from(Span::styled(*line, theme.base())))
            .collect();
        draw_overlay(frame, &theme, " Help ", lines, area);
    } else if let Some(alert) = &ui.alert {
        let lines = vec![
            Line::from(Span::styled(alert.clone(), theme.base())),
            Line::default(),
            Line::from(Span::styled("Press Enter to dismiss", theme.dim())),
        ];
        draw_overlay(frame, &theme, " Notice ", lines, area);
    }
}

fn spinner(ui: &UiState) -> &'static str {
    SPINNER[ui.tick % SPINNER.len()]
}

fn draw_header(frame: &mut Frame, host: &dyn StudyHost, ui: &UiState, theme: &TuiTheme, area: Rect) {
    let [brand, tabs_area, right] = Layout::horizontal([
        Constraint::Length(20),
        Constraint::Min(10),
        Constraint::Length(26),
    ])
    .areas(area);

    frame.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(" ◆ MentorAI", theme.heading())),
            Line::from(Span::styled("   Mastery Engine", theme.dim())),
        ]),
        brand,
    );

    let titles = AppView::ALL
        .iter()
        .enumerate()
        .map(|(i, view)| format!("F{} {}", i + 1, view.label()));
    frame.render_widget(
        Tabs::new(titles)
            .select(host.state().active_view.index())
            .style(theme.dim())
            .highlight_style(theme.highlight())
            .divider("│"),
        tabs_area,
    );

    let busy: Vec<&str> = GenerationKind::ALL
        .into_iter()
        .filter(|kind| kind.is_batch() && host.is_loading(*kind))
        .map(kind_label)
        .collect();
    let theme_badge = match host.theme() {
        Theme::Dark => "☾ dark",
        Theme::Light => "☀ light",
    };
    let mut lines = vec![Line::from(Span::styled(theme_badge, theme.dim())).alignment(Alignment::Right)];
    if !busy.is_empty() {
        lines.push(
            Line::from(Span::styled(
                format!("{} {}", spinner(ui), busy.join(", ")),
                Style::default().fg(theme.accent),
            ))
            .alignment(Alignment::Right),
        );
    }
    frame.render_widget(Paragraph::new(lines), right);
}

fn message_lines(
    message: &Message,
    picked: bool,
    ui: &UiState,
    theme: &TuiTheme,
) -> Vec<Line<'static>> {
    let stamp = message
        .timestamp
        .with_timezone(&Local)
        .format("%H:%M")
        .to_string();
    let mut lines = Vec::new();
    match message.role {
        Role::User => {
            lines.push(Line::from(vec![
                Span::styled("▌ You ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
                Span::styled(stamp, theme.dim()),
            ]));
            for text in message.text.lines() {
                lines.push(Line::from(Span::styled(format!("  {text}"), Style::default().fg(theme.text))));
            }
            if !message.attachments.is_empty() {
                let kinds: Vec<String> = message
                    .attachments
                    .iter()
                    .map(|url| {
                        InlineAttachment::from_data_url(url)
                            .map(|a| a.mime_type)
                            .unwrap_or_else(|_| "unreadable".to_string())
                    })
                    .collect();
                lines.push(Line::from(Span::styled(
                    format!("  [attached: {}]", kinds.join(", ")),
                    theme.dim(),
                )));
            }
        }
        Role::Model => {
            let mut header = vec![
                Span::styled("▌ Mentor ", Style::default().fg(theme.success).add_modifier(Modifier::BOLD)),
                Span::styled(stamp, theme.dim()),
            ];
            if picked {
                header.push(Span::styled(
                    "  ◆ source for cards · quiz · path",
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                ));
            }
            lines.push(Line::from(header));
            if ui.show_reasoning
                && let Some(thinking) = &message.thinking
            {
                let steps = reasoning_steps(thinking);
                if !steps.is_empty() {
                    lines.push(Line::from(vec![
                        Span::styled("  AI Reasoning ", theme.heading()),
                        Span::styled("· Step-by-step chain of thought", theme.dim()),
                    ]));
                    for step in steps {
                        lines.push(Line::from(vec![
                            Span::styled("    ✦ ", Style::default().fg(theme.accent)),
                            Span::styled(step, theme.dim().add_modifier(Modifier::ITALIC)),
                        ]));
                    }
                    lines.push(Line::default());
                }
            }
            lines.extend(render_markdown(&message.text, theme));
        }
    }
    lines
}

fn draw_chat(frame: &mut Frame, host: &dyn StudyHost, ui: &UiState, theme: &TuiTheme, area: Rect) {
    let area = area.inner(ratatui::layout::Margin::new(1, 0));
    let messages = host.state().messages.messages();
    let replying = host.is_loading(GenerationKind::ReasoningReply);

    if messages.is_empty() && !replying {
        let lines = vec![
            Line::from(Span::styled("Awaiting Input...", theme.heading())),
            Line::default(),
            Line::from(Span::styled(
                "Ask a question, /attach an image or PDF, then build cards, quizzes, or a study path from the reply.",
                theme.dim(),
            )),
        ];
        frame.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            centered(area, area.width, 4),
        );
        return;
    }

    let mut lines: Vec<Line<'static>> = Vec::new();
    for (index, message) in messages.iter().enumerate() {
        lines.extend(message_lines(message, ui.picked_reply == Some(index), ui, theme));
        lines.push(Line::default());
    }
    if replying {
        lines.push(Line::from(vec![
            Span::styled("▌ Mentor ", Style::default().fg(theme.success).add_modifier(Modifier::BOLD)),
            Span::styled(format!("thinking {}", spinner(ui)), theme.dim()),
        ]));
        for step in LOADING_STEPS {
            lines.push(Line::from(Span::styled(format!("    · {step}"), theme.dim())));
        }
    }

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    let total = u16::try_from(paragraph.line_count(area.width)).unwrap_or(u16::MAX);
    let max_scroll = total.saturating_sub(area.height);
    let scroll = max_scroll.saturating_sub(ui.chat_scroll_back);
    frame.render_widget(paragraph.scroll((scroll, 0)), area);
}

/// Slice of `input` that fits `width` columns with the cursor visible, plus
/// the cursor column inside that slice.
fn input_window(input: &str, cursor: usize, width: u16) -> (&str, u16) {
    let width = usize::from(width.max(1));
    let cursor = cursor.min(input.len());
    let mut start = 0;
    while UnicodeWidthStr::width(&input[start..cursor]) >= width {
        match input[start..].chars().next() {
            Some(c) => start += c.len_utf8(),
            None => break,
        }
    }
    let mut end = start;
    let mut used = 0;
    for c in input[start..].chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        end += c.len_utf8();
    }
    let column = UnicodeWidthStr::width(&input[start..cursor]);
    (&input[start..end], u16::try_from(column).unwrap_or(0))
}

fn draw_input(frame: &mut Frame, ui: &UiState, theme: &TuiTheme, area: Rect) {
    let title = match ui.pending.len() {
        0 => " Message ".to_string(),
        1 => format!(" Message · 📎 {} ", ui.pending[0].name),
        n => format!(" Message · 📎 {n} attachments "),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.accent))
        .title(Span::styled(title, theme.dim()));
    let inner = block.inner(area);
    let (visible, column) = input_window(&ui.input, ui.cursor, inner.width);
    let content = if ui.input.is_empty() {
        Paragraph::new(Span::styled("Ask MentorAI anything...", theme.dim()))
    } else {
        Paragraph::new(Span::styled(visible.to_string(), Style::default().fg(theme.text)))
    };
    frame.render_widget(content.block(block), area);
    if ui.alert.is_none() && !ui.show_help {
        frame.set_cursor_position((inner.x + column, inner.y));
    }
}

fn draw_status(frame: &mut Frame, ui: &UiState, theme: &TuiTheme, area: Rect) {
    let hints = "Tab views · Ctrl+T theme · /help · Ctrl+C quit";
    let hints_width = u16::try_from(hints.width()).unwrap_or(0).min(area.width / 2);
    let [left, right] =
        Layout::horizontal([Constraint::Min(1), Constraint::Length(hints_width)]).areas(area);
    frame.render_widget(
        Paragraph::new(Span::styled(format!(" {}", ui.status), Style::default().fg(theme.text)))
            .style(Style::default().bg(theme.surface)),
        left,
    );
    frame.render_widget(
        Paragraph::new(Span::styled(hints, theme.dim()))
            .alignment(Alignment::Right)
            .style(Style::default().bg(theme.surface)),
        right,
    );
}

fn draw_empty(frame: &mut Frame, theme: &TuiTheme, area: Rect, title: &str, hint: &str) {
    let lines = vec![
        Line::from(Span::styled(title.to_string(), theme.heading())),
        Line::default(),
        Line::from(Span::styled(hint.to_string(), theme.dim())),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        centered(area, area.width.saturating_sub(4), 5),
    );
}

fn draw_flashcards(frame: &mut Frame, host: &dyn StudyHost, ui: &UiState, theme: &TuiTheme, area: Rect) {
    let cards = &host.state().flashcards;
    if cards.is_empty() {
        let hint = if host.is_loading(GenerationKind::Flashcards) {
            format!("{} Generating flashcards...", spinner(ui))
        } else {
            "Press Ctrl+F or type /cards after a reply to build a deck.".to_string()
        };
        draw_empty(frame, theme, area, "No Cards Generated", &hint);
        return;
    }

    let [title, grid] = Layout::vertical([Constraint::Length(2), Constraint::Min(1)]).areas(area);
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(" Mastery Cards ", theme.heading()),
            Span::styled(
                format!("· {} cards · ←/→ select · Space flips", cards.len()),
                theme.dim(),
            ),
        ])),
        title,
    );

    let columns: usize = if grid.width >= 90 { 3 } else if grid.width >= 56 { 2 } else { 1 };
    let visible_rows = usize::from((grid.height / CARD_HEIGHT).max(1));
    let selected = ui.selected_card.min(cards.len() - 1);
    let first_row = (selected / columns).saturating_sub(visible_rows - 1);

    let row_areas = Layout::vertical(vec![Constraint::Length(CARD_HEIGHT); visible_rows]).split(grid);
    for (slot, row_area) in row_areas.iter().enumerate() {
        let row = first_row + slot;
        let col_areas =
            Layout::horizontal(vec![Constraint::Ratio(1, columns as u32); columns]).split(*row_area);
        for (col, card_area) in col_areas.iter().enumerate() {
            let index = row * columns + col;
            let Some(card) = cards.get(index) else {
                return;
            };
            let is_selected = index == selected;
            let flipped = ui.is_flipped(index);
            let border = if is_selected {
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
            } else {
                theme.dim()
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(border)
                .title(Span::styled(format!(" {} ", card.category), theme.dim()));
            let lines = if flipped {
                vec![
                    Line::from(Span::styled("Answer", Style::default().fg(theme.success).add_modifier(Modifier::BOLD))),
                    Line::from(Span::styled(card.answer.clone(), Style::default().fg(theme.text))),
                ]
            } else {
                vec![
                    Line::from(Span::styled(card.question.clone(), Style::default().fg(theme.text).add_modifier(Modifier::BOLD))),
                    Line::default(),
                    Line::from(Span::styled("Flip Card", theme.dim())),
                ]
            };
            frame.render_widget(
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .block(block),
                card_area.inner(ratatui::layout::Margin::new(1, 0)),
            );
        }
    }
}

fn draw_quiz(frame: &mut Frame, host: &dyn StudyHost, theme: &TuiTheme, area: Rect) {
    let questions = &host.state().quiz;
    let session = host.quiz_session();
    if questions.is_empty() || session.is_empty() {
        let hint = if host.is_loading(GenerationKind::Quiz) {
            "Generating a challenge...".to_string()
        } else {
            "Press Ctrl+Q or type /quiz after a reply to test yourself.".to_string()
        };
        draw_empty(frame, theme, area, "No Quiz Available", &hint);
        return;
    }

    let index = match session.phase() {
        QuizPhase::Completed { final_score } => {
            let total = session.len();
            let lines = vec![
                Line::from(Span::styled("Challenge Results", theme.heading())),
                Line::default(),
                Line::from(Span::styled(
                    format!("{final_score} / {total}"),
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                )),
                Line::default(),
                Line::from(Span::styled(
                    "Use these results to spot the gaps worth another pass.",
                    theme.dim(),
                )),
                Line::default(),
                Line::from(Span::styled("Press r to Restart Challenge", theme.base())),
            ];
            frame.render_widget(
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_type(BorderType::Rounded)
                            .border_style(theme.dim()),
                    ),
                centered(area, 60, 11),
            );
            return;
        }
        QuizPhase::InProgress { index, .. } => index,
    };
    let Some(question) = questions.get(index) else {
        return;
    };

    let area = area.inner(ratatui::layout::Margin::new(2, 0));
    let [progress, body] = Layout::vertical([Constraint::Length(2), Constraint::Min(1)]).areas(area);
    let ratio = (index + 1) as f64 / session.len() as f64;
    frame.render_widget(
        Gauge::default()
            .ratio(ratio.clamp(0.0, 1.0))
            .label(format!(
                "Question {}/{} · Accuracy {}%",
                index + 1,
                session.len(),
                session.accuracy_percent()
            ))
            .gauge_style(Style::default().fg(theme.accent).bg(theme.surface)),
        Rect { height: 1, ..progress },
    );

    let answered = session.selected();
    let mut lines = vec![
        Line::from(Span::styled(question.question.clone(), theme.heading())),
        Line::default(),
    ];
    for (i, option) in question.options.iter().enumerate() {
        let letter = char::from(b'A' + (i % 26) as u8);
        let (marker, style) = match answered {
            None => (" ", Style::default().fg(theme.text)),
            Some(_) if i == question.correct_answer => (
                "✓",
                Style::default().fg(theme.success).add_modifier(Modifier::BOLD),
            ),
            Some(selected) if i == selected => (
                "✗",
                Style::default().fg(theme.error).add_modifier(Modifier::BOLD),
            ),
            Some(_) => (" ", theme.dim()),
        };
        lines.push(Line::from(vec![
            Span::styled(format!(" {marker} "), style),
            Span::styled(format!("{letter}. "), style.add_modifier(Modifier::BOLD)),
            Span::styled(option.clone(), style),
        ]));
    }
    lines.push(Line::default());
    match answered {
        Some(_) => {
            lines.push(Line::from(vec![
                Span::styled("Explanation: ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
                Span::styled(question.explanation.clone(), Style::default().fg(theme.text)),
            ]));
            lines.push(Line::default());
            let next = if session.is_last_question() {
                "Enter: Finish Challenge"
            } else {
                "Enter: Next Question"
            };
            lines.push(Line::from(Span::styled(next, theme.dim())));
        }
        None => lines.push(Line::from(Span::styled(
            "Press 1-4 or a-d to answer.",
            theme.dim(),
        ))),
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), body);
}

fn draw_planner(frame: &mut Frame, host: &dyn StudyHost, ui: &UiState, theme: &TuiTheme, area: Rect) {
    let plan = &host.state().study_plan;
    if plan.is_empty() {
        let hint = if host.is_loading(GenerationKind::StudyPlan) {
            format!("{} Generating your study path...", spinner(ui))
        } else {
            "Press Ctrl+G or type /plan after a reply.".to_string()
        };
        draw_empty(
            frame,
            theme,
            area,
            "Your study roadmap will appear here. Ask MentorAI to plan your session!",
            &hint,
        );
        return;
    }

    let mut lines = vec![
        Line::from(Span::styled(" Learning Path", theme.heading())),
        Line::default(),
    ];
    for (i, item) in plan.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!(" {:02} ", i + 1), theme.highlight()),
            Span::styled(format!(" {}", item.title), Style::default().fg(theme.text).add_modifier(Modifier::BOLD)),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  │  ", theme.dim()),
            Span::styled(item.duration.clone(), Style::default().fg(theme.accent)),
        ]));
        for task in &item.tasks {
            lines.push(Line::from(vec![
                Span::styled("  │   ○ ", theme.dim()),
                Span::styled(task.clone(), Style::default().fg(theme.text)),
            ]));
        }
        lines.push(Line::from(Span::styled("  │", theme.dim())));
    }
    lines.pop();

    let area = area.inner(ratatui::layout::Margin::new(1, 0));
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    let total = u16::try_from(paragraph.line_count(area.width)).unwrap_or(u16::MAX);
    let scroll = ui.plan_scroll.min(total.saturating_sub(area.height));
    frame.render_widget(paragraph.scroll((scroll, 0)), area);
}

fn draw_overlay(frame: &mut Frame, theme: &TuiTheme, title: &str, lines: Vec<Line>, area: Rect) {
    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(2);
    let popup = centered(area, 64, height);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(theme.surface))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(theme.accent))
                    .title(Span::styled(title.to_string(), theme.heading())),
            ),
        popup,
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
