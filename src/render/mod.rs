//! Rendering strategies for assistant responses
//!
//! A strategy turns a raw response body into styled terminal text. The
//! strategy is fixed for the lifetime of the client.

pub mod html;
pub mod markdown;
pub mod plain;

use std::fmt;
use std::str::FromStr;

use ratatui::text::Text;
use serde::{Deserialize, Serialize};

use crate::engine::MarkdownEngine;

/// Shown in place of a Markdown message until the engine is ready.
pub const LOADING_PLACEHOLDER: &str = "Loading renderer...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Plain,
    Html,
    #[default]
    Markdown,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Plain => "plain",
            RenderMode::Html => "html",
            RenderMode::Markdown => "markdown",
        }
    }

    pub fn all() -> Vec<RenderMode> {
        vec![RenderMode::Plain, RenderMode::Html, RenderMode::Markdown]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RenderMode::Plain => "Plain text",
            RenderMode::Html => "HTML (sanitized)",
            RenderMode::Markdown => "Markdown Supported",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Ok(RenderMode::Plain),
            "html" => Ok(RenderMode::Html),
            "markdown" | "md" => Ok(RenderMode::Markdown),
            other => {
                let expected: Vec<&str> = RenderMode::all().iter().map(RenderMode::as_str).collect();
                Err(format!(
                    "unknown render mode '{}' (expected one of: {})",
                    other,
                    expected.join(", ")
                ))
            }
        }
    }
}

/// Outcome of rendering one message body
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Text(Text<'static>),
    /// The strategy's engine is not loaded yet
    Pending,
}

/// Render an assistant message body with the given strategy.
///
/// `engine` is only consulted in Markdown mode; `None` there means the engine
/// is still loading.
pub fn render_content(mode: RenderMode, engine: Option<&MarkdownEngine>, content: &str) -> Rendered {
    match mode {
        RenderMode::Plain => Rendered::Text(plain::render(content)),
        RenderMode::Html => Rendered::Text(html::render(content)),
        RenderMode::Markdown => match engine {
            Some(engine) => Rendered::Text(engine.render(content)),
            None => Rendered::Pending,
        },
    }
}

/// Render a body to sanitized HTML, or `None` while the Markdown engine loads.
pub fn render_html(mode: RenderMode, engine: Option<&MarkdownEngine>, content: &str) -> Option<String> {
    match mode {
        RenderMode::Plain => Some(plain::to_html(content)),
        RenderMode::Html => Some(html::sanitize(content)),
        RenderMode::Markdown => engine.map(|engine| engine.to_html(content)),
    }
}
