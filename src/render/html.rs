//! Sanitizing HTML renderer
//!
//! Response bodies in HTML mode come from the network and are never injected
//! as-is. Only a small set of structural and emphasis tags is interpreted;
//! `script` and `style` elements are dropped together with their content,
//! every other tag is stripped, and attributes are never kept.

use std::sync::OnceLock;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use regex::{Captures, Regex};

const ALLOWED: [&str; 22] = [
    "p", "br", "div", "span", "h1", "h2", "h3", "h4", "h5", "h6", "b", "strong", "i", "em", "u", "code",
    "pre", "ul", "ol", "li", "blockquote", "a",
];
const VOID: [&str; 2] = ["br", "hr"];
const DROPPED: [&str; 2] = ["script", "style"];

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|<(/?)([a-zA-Z][a-zA-Z0-9]*)[^>]*>").expect("tag pattern is valid")
    })
}

fn entity_pattern() -> &'static Regex {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    ENTITY.get_or_init(|| {
        Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("entity pattern is valid")
    })
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Open(String),
    Close(String),
}

/// Split markup into text runs and lowercased tags. Comments disappear and
/// dropped elements are removed with everything inside them.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    let mut dropping: Option<String> = None;

    for caps in tag_pattern().captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last && dropping.is_none() {
            tokens.push(Token::Text(&input[last..whole.start()]));
        }
        last = whole.end();

        let Some(name) = caps.get(2) else { continue };
        let name = name.as_str().to_ascii_lowercase();
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());

        if let Some(dropped) = &dropping {
            if closing && *dropped == name {
                dropping = None;
            }
            continue;
        }
        if DROPPED.contains(&name.as_str()) {
            if !closing {
                dropping = Some(name);
            }
            continue;
        }

        tokens.push(if closing { Token::Close(name) } else { Token::Open(name) });
    }

    if last < input.len() && dropping.is_none() {
        tokens.push(Token::Text(&input[last..]));
    }
    tokens
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn decode_entities(text: &str) -> String {
    entity_pattern()
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if name.starts_with("#x") || name.starts_with("#X") => {
                    u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
                }
                _ if name.starts_with('#') => name[1..].parse::<u32>().ok().and_then(char::from_u32),
                _ => None,
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Rebuild the markup keeping only allowed tags, without attributes, and
/// with every element closed.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut open: Vec<String> = Vec::new();

    for token in tokenize(input) {
        match token {
            Token::Text(text) => out.push_str(&escape(&decode_entities(text))),
            Token::Open(name) if VOID.contains(&name.as_str()) => {
                out.push_str(&format!("<{}>", name));
            }
            Token::Open(name) if ALLOWED.contains(&name.as_str()) => {
                out.push_str(&format!("<{}>", name));
                open.push(name);
            }
            Token::Close(name) => {
                if let Some(pos) = open.iter().rposition(|tag| *tag == name) {
                    for tag in open.drain(pos..).rev() {
                        out.push_str(&format!("</{}>", tag));
                    }
                }
            }
            Token::Open(_) => {}
        }
    }

    for tag in open.into_iter().rev() {
        out.push_str(&format!("</{}>", tag));
    }
    out
}

fn tag_style(tag: &str) -> Style {
    match tag {
        "b" | "strong" => Style::default().add_modifier(Modifier::BOLD),
        "i" | "em" => Style::default().add_modifier(Modifier::ITALIC),
        "u" => Style::default().add_modifier(Modifier::UNDERLINED),
        "code" | "pre" => Style::default().fg(Color::Yellow),
        "a" => Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        }
        "blockquote" => Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        _ => Style::default(),
    }
}

#[derive(Default)]
struct TextBuilder {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    open: Vec<String>,
    lists: Vec<Option<u64>>,
    pre_depth: usize,
    quote_depth: usize,
}

impl TextBuilder {
    fn style(&self) -> Style {
        self.open
            .iter()
            .fold(Style::default(), |style, tag| style.patch(tag_style(tag)))
    }

    fn flush(&mut self, force: bool) {
        if self.spans.is_empty() && !force {
            return;
        }
        let mut spans = Vec::with_capacity(self.spans.len() + 1);
        if self.quote_depth > 0 {
            spans.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            ));
        }
        spans.append(&mut self.spans);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        self.flush(false);
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn ends_with_space(&self) -> bool {
        self.spans
            .last()
            .map_or(true, |span| span.content.ends_with(' '))
    }

    fn close(&mut self, name: &str) {
        if let Some(pos) = self.open.iter().rposition(|tag| tag == name) {
            self.open.remove(pos);
        }
    }

    fn text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        let style = self.style();

        if self.pre_depth > 0 {
            for (i, part) in decoded.split('\n').enumerate() {
                if i > 0 {
                    self.flush(true);
                }
                if !part.is_empty() {
                    self.spans.push(Span::styled(part.to_string(), style));
                }
            }
            return;
        }

        let mut collapsed = String::with_capacity(decoded.len());
        let mut previous_space = self.ends_with_space();
        for c in decoded.chars() {
            if c.is_whitespace() {
                if !previous_space {
                    collapsed.push(' ');
                    previous_space = true;
                }
            } else {
                collapsed.push(c);
                previous_space = false;
            }
        }
        if !collapsed.is_empty() {
            self.spans.push(Span::styled(collapsed, style));
        }
    }

    fn open_tag(&mut self, name: String) {
        match name.as_str() {
            "br" => self.flush(true),
            "hr" => {
                self.flush(false);
                self.lines.push(Line::styled("─".repeat(24), Style::default().fg(Color::DarkGray)));
            }
            "ul" => {
                self.flush(false);
                self.lists.push(None);
            }
            "ol" => {
                self.flush(false);
                self.lists.push(Some(1));
            }
            "li" => {
                self.flush(false);
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                self.spans.push(Span::styled(marker, Style::default().fg(Color::Yellow)));
            }
            "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush(false);
                self.open.push(name);
            }
            "pre" => {
                self.flush(false);
                self.pre_depth += 1;
                self.open.push(name);
            }
            "blockquote" => {
                self.flush(false);
                self.quote_depth += 1;
                self.open.push(name);
            }
            _ if ALLOWED.contains(&name.as_str()) => self.open.push(name),
            _ => {}
        }
    }

    fn close_tag(&mut self, name: &str) {
        match name {
            "ul" | "ol" => {
                self.flush(false);
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            "li" | "div" => {
                self.flush(false);
                self.close(name);
            }
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.blank();
                self.close(name);
            }
            "pre" => {
                self.blank();
                self.pre_depth = self.pre_depth.saturating_sub(1);
                self.close(name);
            }
            "blockquote" => {
                self.flush(false);
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
                self.close(name);
            }
            _ => self.close(name),
        }
    }

    fn finish(mut self) -> Text<'static> {
        self.flush(false);
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        Text::from(self.lines)
    }
}

/// Render HTML as styled terminal text through the sanitizer's tag rules.
pub fn render(content: &str) -> Text<'static> {
    let mut builder = TextBuilder::default();
    for token in tokenize(content) {
        match token {
            Token::Text(text) => builder.text(text),
            Token::Open(name) => builder.open_tag(name),
            Token::Close(name) => builder.close_tag(&name),
        }
    }
    builder.finish()
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

    #[test]
    fn test_paragraph_with_bold() {
        let text = render("<p>Hello <b>world</b></p>");
        assert_eq!(plain_lines(&text), vec!["Hello world"]);
        let bold = &text.lines[0].spans[1];
        assert_eq!(bold.content, "world");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_script_content_dropped() {
        let text = render("<p>hi</p><script>alert('x')</script><style>p{}</style>");
        let lines = plain_lines(&text).join("\n");
        assert_eq!(lines, "hi");
    }

    #[test]
    fn test_lists() {
        let text = render("<ul><li>one</li><li>two</li></ul><ol><li>a</li><li>b</li></ol>");
        assert_eq!(plain_lines(&text), vec!["• one", "• two", "", "1. a", "2. b"]);
    }

    #[test]
    fn test_whitespace_collapses_outside_pre() {
        let text = render("<p>a   \n  b</p><pre>x  y\nz</pre>");
        assert_eq!(plain_lines(&text), vec!["a b", "", "x  y", "z"]);
    }

    #[test]
    fn test_br_breaks_line() {
        let text = render("one<br>two<br/>three");
        assert_eq!(plain_lines(&text), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(decode_entities("1 &lt; 2 &amp;&#65;&#x42; &bogus;"), "1 < 2 &AB &bogus;");
    }

    #[test]
    fn test_sanitize_strips_attributes_and_unknown_tags() {
        let html = sanitize(
            r#"<p onclick="steal()">a <a href="javascript:evil()">link</a></p><iframe src="x"></iframe><script>bad()</script>"#,
        );
        assert_eq!(html, "<p>a <a>link</a></p>");
    }

    #[test]
    fn test_sanitize_balances_tags() {
        assert_eq!(sanitize("<b>x"), "<b>x</b>");
        assert_eq!(sanitize("<p><b>x</p>y"), "<p><b>x</b></p>y");
        assert_eq!(sanitize("</div>text"), "text");
    }

    #[test]
    fn test_sanitize_escapes_text() {
        assert_eq!(sanitize("<p>1 &lt; 2 > 0</p>"), "<p>1 &lt; 2 &gt; 0</p>");
    }

    #[test]
    fn test_comments_removed() {
        assert_eq!(sanitize("a<!-- <script>x</script> -->b"), "ab");
    }
}
