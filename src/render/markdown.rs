//! Markdown to terminal text and to HTML
//!
//! Both outputs follow the same rules: soft line breaks are kept as breaks
//! and raw HTML in the source is shown as text, never interpreted.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};

use crate::engine::Theme;

pub fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

fn is_unsafe_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("javascript:") || lower.starts_with("vbscript:") || lower.starts_with("data:")
}

/// Convert Markdown to HTML. Raw HTML is escaped and script-capable link
/// targets are replaced.
pub fn to_html(markdown: &str, options: Options) -> String {
    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::SoftBreak => Event::HardBreak,
        Event::Start(Tag::Link { link_type, dest_url, title, id }) if is_unsafe_url(&dest_url) => {
            Event::Start(Tag::Link { link_type, dest_url: CowStr::Borrowed("#"), title, id })
        }
        Event::Start(Tag::Image { link_type, dest_url, title, id }) if is_unsafe_url(&dest_url) => {
            Event::Start(Tag::Image { link_type, dest_url: CowStr::Borrowed("#"), title, id })
        }
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

struct Writer<'t> {
    theme: &'t Theme,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
}

impl<'t> Writer<'t> {
    fn new(theme: &'t Theme) -> Self {
        Self {
            theme,
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
        }
    }

    fn style(&self) -> Style {
        self.styles.iter().fold(Style::default(), |acc, s| acc.patch(*s))
    }

    fn push_line(&mut self, mut spans: Vec<Span<'static>>) {
        if self.quote_depth > 0 {
            spans.insert(0, Span::styled("│ ".repeat(self.quote_depth), self.theme.quote));
        }
        self.lines.push(Line::from(spans));
    }

    fn flush(&mut self) {
        if !self.spans.is_empty() {
            let spans = std::mem::take(&mut self.spans);
            self.push_line(spans);
        }
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_code_block {
            for line in text.lines() {
                self.push_line(vec![Span::styled(format!("  {}", line), self.theme.code)]);
            }
            return;
        }
        let style = self.style();
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.flush();
            }
            if !part.is_empty() {
                self.spans.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                self.flush();
                let mut style = self.theme.heading;
                if level == HeadingLevel::H1 {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                self.styles.push(style);
            }
            Tag::BlockQuote { .. } => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.push_line(vec![Span::styled(format!("  {}", lang), self.theme.quote)]);
                    }
                }
                self.in_code_block = true;
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                self.spans.push(Span::styled(marker, self.theme.bullet));
            }
            Tag::Emphasis => self.styles.push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.styles.push(self.theme.strong),
            Tag::Strikethrough => {
                self.styles.push(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { .. } => self.styles.push(self.theme.link),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.blank(),
            TagEnd::Heading { .. } => {
                self.styles.pop();
                self.blank();
            }
            TagEnd::BlockQuote { .. } => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            TagEnd::CodeBlock { .. } => {
                self.in_code_block = false;
                self.blank();
            }
            TagEnd::List { .. } => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link { .. } => {
                self.styles.pop();
            }
            TagEnd::TableCell => self.spans.push(Span::styled(" │ ", self.theme.quote)),
            TagEnd::TableHead | TagEnd::TableRow => self.flush(),
            TagEnd::Table => self.blank(),
            _ => {}
        }
    }

    fn finish(mut self) -> Text<'static> {
        self.flush();
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        Text::from(self.lines)
    }
}

/// Render Markdown as styled terminal text.
pub fn render(markdown: &str, options: Options, theme: &Theme) -> Text<'static> {
    let mut writer = Writer::new(theme);

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => writer.start(tag),
            Event::End(tag) => writer.end(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => writer.text(&text),
            Event::Code(code) => writer.spans.push(Span::styled(code.to_string(), theme.code)),
            Event::SoftBreak | Event::HardBreak => writer.flush(),
            Event::Rule => {
                writer.flush();
                writer.push_line(vec![Span::styled("─".repeat(24), theme.rule)]);
                writer.blank();
            }
            Event::TaskListMarker(done) => {
                let marker = if done { "[x] " } else { "[ ] " };
                writer.spans.push(Span::styled(marker, theme.bullet));
            }
            _ => {}
        }
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_lines(text: &Text) -> Vec<String> {
        text.lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn render_default(markdown: &str) -> Text<'static> {
        render(markdown, options(), &Theme::default())
    }

    #[test]
    fn test_bold_becomes_bold_span() {
        let text = render_default("**bold**");
        assert_eq!(text.lines.len(), 1);
        let span = &text.lines[0].spans[0];
        assert_eq!(span.content, "bold");
        assert!(span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_bold_to_html() {
        let html = to_html("**bold**", options());
        assert_eq!(html, "<p><strong>bold</strong></p>\n");
    }

    #[test]
    fn test_soft_break_kept() {
        assert_eq!(plain_lines(&render_default("one\ntwo")), vec!["one", "two"]);
        assert!(to_html("one\ntwo", options()).contains("one<br />"));
    }

    #[test]
    fn test_raw_html_escaped() {
        let html = to_html("hi <script>alert(1)</script>", options());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_javascript_links_neutralized() {
        let html = to_html("[click](javascript:alert(1))", options());
        assert!(html.contains("href=\"#\""));
        assert!(!html.contains("javascript"));
    }

    #[test]
    fn test_welcome_layout() {
        let text = render_default(crate::message::WELCOME_TEXT);
        let lines = plain_lines(&text);
        assert_eq!(lines[0], "Hello, I'm Erica.");
        assert!(lines.contains(&"• Concept Explanations".to_string()));
        assert!(lines.contains(&"• Study Plans".to_string()));
        assert_eq!(lines.last().unwrap(), "How can I help you today?");
    }

    #[test]
    fn test_ordered_list_and_code_block() {
        let text = render_default("1. first\n2. second\n\n```rust\nlet x = 1;\n```");
        assert_eq!(
            plain_lines(&text),
            vec!["1. first", "2. second", "", "  rust", "  let x = 1;"]
        );
    }

    #[test]
    fn test_inline_code_styled() {
        let theme = Theme::default();
        let text = render("use `cargo`", options(), &theme);
        let code = &text.lines[0].spans[1];
        assert_eq!(code.content, "cargo");
        assert_eq!(code.style, theme.code);
    }

    #[test]
    fn test_task_list() {
        assert_eq!(
            plain_lines(&render_default("- [x] done\n- [ ] todo")),
            vec!["• [x] done", "• [ ] todo"]
        );
    }
}
