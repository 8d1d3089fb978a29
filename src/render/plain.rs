use ratatui::text::{Line, Text};

use super::html::escape;

const TAB: &str = "    ";

/// Display the body verbatim. Line breaks and runs of spaces are kept.
pub fn render(content: &str) -> Text<'static> {
    let lines: Vec<Line<'static>> = content
        .split('\n')
        .map(|line| Line::raw(line.trim_end_matches('\r').replace('\t', TAB)))
        .collect();
    Text::from(lines)
}

pub fn to_html(content: &str) -> String {
    format!("<pre>{}</pre>", escape(content))
}
