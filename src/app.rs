use std::path::PathBuf;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::task::JoinHandle;

use erica_tutor::{
    AskError, Effect, LazyEngine, MarkdownEngine, RenderMode, SessionEvent, SessionState,
    TutorClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Chat state
    pub session: SessionState,
    pub cursor: usize, // cursor position in the draft, in chars
    pub render_mode: RenderMode,
    pub engine: LazyEngine,

    // Chat view
    pub chat_scroll: u16,
    pub max_scroll: u16,
    pub chat_height: u16, // inner height of the chat area, set while drawing
    pub follow: bool,     // keep the newest message in view

    pub animation_frame: u8, // 0-2 for ellipsis animation

    client: TutorClient,
    ask_task: Option<JoinHandle<Result<String, AskError>>>,
}

impl App {
    pub fn new(client: TutorClient, render_mode: RenderMode) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            session: SessionState::new(Utc::now()),
            cursor: 0,
            render_mode,
            engine: LazyEngine::new(),
            chat_scroll: 0,
            max_scroll: 0,
            chat_height: 0,
            follow: true,
            animation_frame: 0,
            client,
            ask_task: None,
        }
    }

    /// Start loading the Markdown engine in the background.
    pub fn load_engine(&mut self, theme_path: Option<PathBuf>) {
        if self.render_mode == RenderMode::Markdown {
            self.engine
                .ensure_loading(move || MarkdownEngine::load_or_default(theme_path));
        }
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn is_awaiting(&self) -> bool {
        self.session.awaiting_response
    }

    fn dispatch(&mut self, event: SessionEvent) -> Option<Effect> {
        self.session.apply(event, Utc::now())
    }

    fn set_draft(&mut self, draft: String) {
        self.dispatch(SessionEvent::DraftChanged(draft));
    }

    // Draft editing

    pub fn insert_char(&mut self, c: char) {
        let mut draft = self.session.draft.clone();
        let byte_pos = char_to_byte_index(&draft, self.cursor);
        draft.insert(byte_pos, c);
        self.cursor += 1;
        self.set_draft(draft);
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let mut draft = self.session.draft.clone();
            let byte_pos = char_to_byte_index(&draft, self.cursor);
            draft.remove(byte_pos);
            self.set_draft(draft);
        }
    }

    pub fn delete(&mut self) {
        let char_count = self.session.draft.chars().count();
        if self.cursor < char_count {
            let mut draft = self.session.draft.clone();
            let byte_pos = char_to_byte_index(&draft, self.cursor);
            draft.remove(byte_pos);
            self.set_draft(draft);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.session.draft.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.session.draft.chars().count();
    }

    // Exchange

    /// Send the draft. Does nothing for a blank draft or while an answer is
    /// outstanding, like a disabled send button.
    pub fn submit(&mut self) {
        if self.ask_task.is_some() || !self.session.can_submit() {
            return;
        }

        if let Some(Effect::Ask { question }) = self.dispatch(SessionEvent::Submit) {
            self.cursor = 0;
            self.follow = true;
            tracing::info!(endpoint = %self.client.endpoint(), "question submitted");

            let client = self.client.clone();
            self.ask_task = Some(tokio::spawn(async move { client.ask(&question).await }));
        }
    }

    /// Collect the answer if the request finished.
    pub fn poll_answer(&mut self) {
        let finished = match &mut self.ask_task {
            Some(handle) if handle.is_finished() => handle.now_or_never(),
            _ => None,
        };
        let Some(result) = finished else { return };
        self.ask_task = None;

        let event = match result {
            Ok(Ok(body)) => {
                tracing::info!(bytes = body.len(), "answer received");
                SessionEvent::AnswerReceived(body)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "ask failed");
                SessionEvent::AskFailed
            }
            Err(e) => {
                tracing::error!(error = %e, "ask task failed");
                SessionEvent::AskFailed
            }
        };
        self.dispatch(event);
        self.follow = true;
    }

    pub fn clear(&mut self) {
        self.dispatch(SessionEvent::Clear);
        self.chat_scroll = 0;
        self.follow = true;
        tracing::debug!("chat cleared");
    }

    /// Tick animation frame and pick up finished background work
    pub fn tick(&mut self) {
        if self.session.awaiting_response {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.poll_answer();
        self.engine.poll();
    }

    // Scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll);
        if self.chat_scroll >= self.max_scroll {
            self.follow = true;
        }
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.follow = false;
        self.chat_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow = true;
        self.chat_scroll = self.max_scroll;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{http::StatusCode, routing::post, Json, Router};
    use erica_tutor::message::{Role, ERROR_TEXT};

    async fn spawn_tutor(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/ask", addr)
    }

    async fn wait_for_answer(app: &mut App) {
        for _ in 0..500 {
            app.poll_answer();
            if !app.is_awaiting() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no answer arrived");
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.insert_char(c);
        }
    }

    fn offline_app() -> App {
        App::new(TutorClient::new("http://127.0.0.1:9/ask"), RenderMode::Plain)
    }

    #[test]
    fn test_editing_is_utf8_safe() {
        let mut app = offline_app();
        type_text(&mut app, "héllo");
        app.cursor_left();
        app.cursor_left();
        app.backspace();
        assert_eq!(app.session.draft, "hélo");
        app.cursor_home();
        app.delete();
        assert_eq!(app.session.draft, "élo");
        app.cursor_end();
        assert_eq!(app.cursor, 3);
    }

    #[test]
    fn test_blank_submit_does_nothing() {
        let mut app = offline_app();
        type_text(&mut app, "   ");
        app.submit();
        assert_eq!(app.session.messages().len(), 1);
        assert_eq!(app.session.draft, "   ");
        assert!(app.ask_task.is_none());
    }

    #[tokio::test]
    async fn test_answer_lands_in_log() {
        let router = Router::new().route(
            "/ask",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["question"], "What is 2+2?");
                "4"
            }),
        );
        let endpoint = spawn_tutor(router).await;
        let mut app = App::new(TutorClient::new(&endpoint), RenderMode::Plain);

        type_text(&mut app, "What is 2+2?");
        app.submit();
        assert_eq!(app.session.messages().len(), 2);
        assert_eq!(app.session.messages()[1].role, Role::User);
        assert!(app.session.draft.is_empty());
        assert_eq!(app.cursor, 0);
        assert!(app.is_awaiting());

        wait_for_answer(&mut app).await;
        let answer = app.session.messages().last().unwrap();
        assert_eq!(answer.content, "4");
        assert!(!answer.is_error);
        assert!(app.ask_task.is_none());
    }

    #[tokio::test]
    async fn test_second_submit_ignored_while_waiting() {
        let router = Router::new().route(
            "/ask",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                "done"
            }),
        );
        let endpoint = spawn_tutor(router).await;
        let mut app = App::new(TutorClient::new(&endpoint), RenderMode::Plain);

        type_text(&mut app, "first");
        app.submit();
        type_text(&mut app, "second");
        app.submit();
        assert_eq!(app.session.messages().len(), 2);
        assert_eq!(app.session.draft, "second");

        wait_for_answer(&mut app).await;
        assert_eq!(app.session.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_server_error_becomes_error_message() {
        let router = Router::new().route(
            "/ask",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let endpoint = spawn_tutor(router).await;
        let mut app = App::new(TutorClient::new(&endpoint), RenderMode::Plain);

        type_text(&mut app, "2+2");
        app.submit();
        wait_for_answer(&mut app).await;

        let last = app.session.messages().last().unwrap();
        assert!(last.is_error);
        assert_eq!(last.content, ERROR_TEXT);
        assert_eq!(app.session.messages()[1].content, "2+2");
    }

    #[tokio::test]
    async fn test_connection_refused_becomes_error_message() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/ask", listener.local_addr().unwrap());
        drop(listener);

        let mut app = App::new(TutorClient::new(&endpoint), RenderMode::Plain);
        type_text(&mut app, "anyone there?");
        app.submit();
        wait_for_answer(&mut app).await;

        assert!(app.session.messages().last().unwrap().is_error);
        assert!(!app.is_awaiting());
    }

    #[tokio::test]
    async fn test_markdown_engine_loads_on_tick() {
        let mut app = App::new(TutorClient::new("http://127.0.0.1:9/ask"), RenderMode::Markdown);
        app.load_engine(None);
        for _ in 0..100 {
            app.tick();
            if app.engine.get().is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(app.engine.get().is_some());
    }

    #[test]
    fn test_scrolling_follows_bottom() {
        let mut app = offline_app();
        app.max_scroll = 10;
        app.chat_height = 6;
        app.scroll_up(3);
        assert!(!app.follow);
        app.scroll_half_page_down();
        app.scroll_down(20);
        assert_eq!(app.chat_scroll, 10);
        assert!(app.follow);
        app.scroll_to_top();
        assert_eq!(app.chat_scroll, 0);
    }
}
