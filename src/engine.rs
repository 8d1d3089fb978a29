//! Lazily loaded Markdown engine
//!
//! The engine (parser options plus a colour theme that may live in a file)
//! is loaded in the background. Until it is ready, Markdown messages show a
//! placeholder. Only one load is ever started.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures_util::FutureExt;
use pulldown_cmark::Options;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Text;
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::render::markdown;

/// Colours read from a theme file. Each entry is a colour name or `#rrggbb`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThemeFile {
    pub heading: Option<String>,
    pub strong: Option<String>,
    pub code: Option<String>,
    pub link: Option<String>,
    pub quote: Option<String>,
    pub bullet: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub heading: Style,
    pub strong: Style,
    pub code: Style,
    pub link: Style,
    pub quote: Style,
    pub bullet: Style,
    pub rule: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            heading: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            strong: Style::default().add_modifier(Modifier::BOLD),
            code: Style::default().fg(Color::Yellow),
            link: Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
            quote: Style::default().fg(Color::DarkGray),
            bullet: Style::default().fg(Color::Yellow),
            rule: Style::default().fg(Color::DarkGray),
        }
    }
}

fn recolor(style: Style, name: Option<&str>) -> Style {
    match name.map(|n| (n, n.parse::<Color>())) {
        Some((_, Ok(color))) => style.fg(color),
        Some((name, Err(_))) => {
            tracing::warn!(color = name, "ignoring unknown theme colour");
            style
        }
        None => style,
    }
}

impl Theme {
    pub fn from_file(file: &ThemeFile) -> Self {
        let base = Self::default();
        Self {
            heading: recolor(base.heading, file.heading.as_deref()),
            strong: recolor(base.strong, file.strong.as_deref()),
            code: recolor(base.code, file.code.as_deref()),
            link: recolor(base.link, file.link.as_deref()),
            quote: recolor(base.quote, file.quote.as_deref()),
            bullet: recolor(base.bullet, file.bullet.as_deref()),
            rule: base.rule,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkdownEngine {
    options: Options,
    theme: Theme,
}

impl Default for MarkdownEngine {
    fn default() -> Self {
        Self::with_theme(Theme::default())
    }
}

impl MarkdownEngine {
    pub fn with_theme(theme: Theme) -> Self {
        Self {
            options: markdown::options(),
            theme,
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Build the engine, reading the theme file if one is given. A missing
    /// file gives the default theme.
    pub async fn load(theme_path: Option<&Path>) -> Result<Self> {
        let Some(path) = theme_path else {
            return Ok(Self::default());
        };
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no theme file, using default theme");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("reading theme {}", path.display())));
            }
        };
        let file: ThemeFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing theme {}", path.display()))?;
        Ok(Self::with_theme(Theme::from_file(&file)))
    }

    /// Like [`MarkdownEngine::load`], falling back to the default theme.
    pub async fn load_or_default(theme_path: Option<PathBuf>) -> Self {
        match Self::load(theme_path.as_deref()).await {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "using default markdown theme");
                Self::default()
            }
        }
    }

    pub fn render(&self, content: &str) -> Text<'static> {
        markdown::render(content, self.options, &self.theme)
    }

    pub fn to_html(&self, content: &str) -> String {
        markdown::to_html(content, self.options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unavailable,
    Loading,
    Ready,
}

enum Slot {
    Unavailable,
    Loading(JoinHandle<MarkdownEngine>),
    Ready(MarkdownEngine),
}

/// A [`MarkdownEngine`] that becomes available after an asynchronous load.
pub struct LazyEngine {
    slot: Slot,
}

impl Default for LazyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LazyEngine {
    pub fn new() -> Self {
        Self { slot: Slot::Unavailable }
    }

    pub fn ready(engine: MarkdownEngine) -> Self {
        Self { slot: Slot::Ready(engine) }
    }

    pub fn state(&self) -> EngineState {
        match self.slot {
            Slot::Unavailable => EngineState::Unavailable,
            Slot::Loading(_) => EngineState::Loading,
            Slot::Ready(_) => EngineState::Ready,
        }
    }

    pub fn get(&self) -> Option<&MarkdownEngine> {
        match &self.slot {
            Slot::Ready(engine) => Some(engine),
            _ => None,
        }
    }

    /// Start loading unless a load was already started. Returns whether
    /// `load` was invoked.
    pub fn ensure_loading<F, Fut>(&mut self, load: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MarkdownEngine> + Send + 'static,
    {
        if !matches!(self.slot, Slot::Unavailable) {
            return false;
        }
        tracing::debug!("loading markdown engine");
        self.slot = Slot::Loading(tokio::spawn(load()));
        true
    }

    /// Pick up a finished load without blocking.
    pub fn poll(&mut self) -> EngineState {
        let finished = match &mut self.slot {
            Slot::Loading(handle) if handle.is_finished() => handle.now_or_never(),
            _ => None,
        };
        if let Some(result) = finished {
            self.install(result);
        }
        self.state()
    }

    /// Wait for a load in progress to finish.
    pub async fn wait(&mut self) -> Option<&MarkdownEngine> {
        let finished = match &mut self.slot {
            Slot::Loading(handle) => Some(handle.await),
            _ => None,
        };
        if let Some(result) = finished {
            self.install(result);
        }
        self.get()
    }

    fn install(&mut self, result: Result<MarkdownEngine, tokio::task::JoinError>) {
        let engine = result.unwrap_or_else(|e| {
            tracing::error!(error = %e, "markdown engine load failed");
            MarkdownEngine::default()
        });
        tracing::info!("markdown engine ready");
        self.slot = Slot::Ready(engine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::render::{render_content, RenderMode, Rendered, LOADING_PLACEHOLDER};

    #[tokio::test]
    async fn test_load_is_single_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut engine = LazyEngine::new();
        assert_eq!(engine.state(), EngineState::Unavailable);

        for _ in 0..3 {
            let calls = calls.clone();
            engine.ensure_loading(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { MarkdownEngine::default() }
            });
        }
        assert!(engine.wait().await.is_some());
        assert_eq!(engine.state(), EngineState::Ready);

        let started = engine.ensure_loading(|| async { MarkdownEngine::default() });
        assert!(!started);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_placeholder_until_ready() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut engine = LazyEngine::new();
        engine.ensure_loading(|| async move {
            let _ = rx.await;
            MarkdownEngine::default()
        });

        assert_eq!(engine.poll(), EngineState::Loading);
        assert_eq!(
            render_content(RenderMode::Markdown, engine.get(), "**bold**"),
            Rendered::Pending
        );
        assert!(!LOADING_PLACEHOLDER.is_empty());

        tx.send(()).unwrap();
        engine.wait().await;
        match render_content(RenderMode::Markdown, engine.get(), "**bold**") {
            Rendered::Text(text) => {
                let span = &text.lines[0].spans[0];
                assert_eq!(span.content, "bold");
                assert!(span.style.add_modifier.contains(Modifier::BOLD));
            }
            Rendered::Pending => panic!("engine should be ready"),
        }
    }

    #[tokio::test]
    async fn test_poll_installs_finished_load() {
        let mut engine = LazyEngine::new();
        engine.ensure_loading(|| async { MarkdownEngine::default() });
        for _ in 0..100 {
            if engine.poll() == EngineState::Ready {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn test_theme_file_recolors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");
        std::fs::write(&path, r##"{"heading": "magenta", "code": "#00ff00", "link": "nonsense"}"##)
            .unwrap();

        let engine = MarkdownEngine::load(Some(&path)).await.unwrap();
        assert_eq!(engine.theme().heading.fg, Some(Color::Magenta));
        assert_eq!(engine.theme().code.fg, Some(Color::Rgb(0, 255, 0)));
        assert_eq!(engine.theme().link, Theme::default().link);
    }

    #[tokio::test]
    async fn test_missing_theme_is_default_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MarkdownEngine::load(Some(&dir.path().join("absent.json"))).await.unwrap();
        assert_eq!(*engine.theme(), Theme::default());
    }

    #[tokio::test]
    async fn test_invalid_theme_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");
        std::fs::write(&path, "{ heading: ").unwrap();
        assert!(MarkdownEngine::load(Some(&path)).await.is_err());

        let engine = MarkdownEngine::load_or_default(Some(path)).await;
        assert_eq!(*engine.theme(), Theme::default());
    }

    #[tokio::test]
    async fn test_missing_theme_falls_back() {
        let engine = MarkdownEngine::load_or_default(Some(PathBuf::from("/nonexistent/theme.json"))).await;
        assert_eq!(*engine.theme(), Theme::default());
    }
}
