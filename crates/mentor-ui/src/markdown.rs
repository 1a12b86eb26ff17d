use crate::theme::TuiTheme;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

/// Placeholder steps shown while a reply is being generated.
pub const LOADING_STEPS: [&str; 5] = [
    "Analyzing the query and context...",
    "Breaking down the problem into components...",
    "Retrieving relevant knowledge from uploaded documents...",
    "Synthesizing information from multiple sources...",
    "Formulating a comprehensive response...",
];

/// Splits `**bold**` spans out of one line. An unmatched `**` is kept as text.
pub fn parse_inline_markdown(
    text: &str,
    base_style: Style,
    bold_style: Style,
) -> Vec<Span<'static>> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::styled(rest[..start].to_string(), base_style));
        }
        spans.push(Span::styled(after[..end].to_string(), bold_style));
        rest = &after[end + 2..];
    }
    if !rest.is_empty() || spans.is_empty() {
        spans.push(Span::styled(rest.to_string(), base_style));
    }
    spans
}

/// Renders the tutor's markdown subset: `###`/`####` headers, `*`/`-`
/// bullets, two-space indented continuation lines, and bold spans.
pub fn render_markdown(text: &str, theme: &TuiTheme) -> Vec<Line<'static>> {
    let body = Style::default().fg(theme.text);
    let bold = Style::default()
        .fg(theme.accent)
        .add_modifier(Modifier::BOLD);

    text.split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Line::default();
            }
            if let Some(heading) = line.strip_prefix("### ") {
                return Line::from(Span::styled(heading.to_string(), theme.heading()));
            }
            if let Some(heading) = line.strip_prefix("#### ") {
                return Line::from(Span::styled(
                    heading.to_string(),
                    body.add_modifier(Modifier::BOLD),
                ));
            }
            if let Some(item) = trimmed
                .strip_prefix("* ")
                .or_else(|| trimmed.strip_prefix("- "))
            {
                let mut spans = vec![Span::styled("  • ", Style::default().fg(theme.accent))];
                spans.extend(parse_inline_markdown(item, theme.dim(), bold));
                return Line::from(spans);
            }
            if line.starts_with("  ") {
                let mut spans = vec![Span::styled("      │ ", theme.dim())];
                spans.extend(parse_inline_markdown(trimmed, theme.dim(), bold));
                return Line::from(spans);
            }
            Line::from(parse_inline_markdown(line, body, bold))
        })
        .collect()
}

/// Non-empty lines of a thought trace with leading bullet markers removed.
pub fn reasoning_steps(thinking: &str) -> Vec<String> {
    thinking
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.trim_start_matches(['-', '*', '•'])
                .trim_start()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}
