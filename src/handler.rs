use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

const MOUSE_SCROLL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('l') => {
                app.clear();
                return;
            }
            _ => {}
        }
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to the input box
        KeyCode::Char('i') | KeyCode::Enter | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
            app.cursor_end();
        }

        // Half-page scroll
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }

        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_half_page_down(),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        KeyCode::Char('c') => app.clear(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
        }
        // Newline in the draft. Not every terminal reports Shift+Enter
        KeyCode::Enter if key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) => {
            app.insert_char('\n');
        }
        KeyCode::Enter => app.submit(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::PageDown => app.scroll_half_page_down(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.insert_char(c);
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(MOUSE_SCROLL_LINES),
        MouseEventKind::ScrollDown => app.scroll_down(MOUSE_SCROLL_LINES),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erica_tutor::{RenderMode, TutorClient};

    fn app() -> App {
        App::new(TutorClient::new("http://127.0.0.1:9/ask"), RenderMode::Plain)
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))).unwrap();
    }

    fn ctrl(app: &mut App, c: char) {
        handle_event(app, AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)))
            .unwrap();
    }

    #[test]
    fn test_typing_edits_draft() {
        let mut app = app();
        for c in "hey".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.session.draft, "he");
    }

    #[test]
    fn test_enter_on_blank_draft_is_noop() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.messages().len(), 1);
        assert_eq!(app.session.draft, " ");
        assert!(!app.is_awaiting());
    }

    #[tokio::test]
    async fn test_enter_submits() {
        let mut app = app();
        for c in "why?".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.messages().len(), 2);
        assert!(app.is_awaiting());
    }

    fn press_with(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, modifiers))).unwrap();
    }

    #[tokio::test]
    async fn test_multiline_draft_submitted_verbatim() {
        let mut app = app();
        for c in "line one".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press_with(&mut app, KeyCode::Enter, KeyModifiers::ALT);
        for c in "line two".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press_with(&mut app, KeyCode::Enter, KeyModifiers::SHIFT);
        press(&mut app, KeyCode::Char('3'));
        assert_eq!(app.session.draft, "line one\nline two\n3");
        assert_eq!(app.session.messages().len(), 1);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.messages().len(), 2);
        assert_eq!(app.session.messages()[1].content, "line one\nline two\n3");
        assert!(app.session.draft.is_empty());
    }

    #[test]
    fn test_modes_and_quit() {
        let mut app = app();
        assert_eq!(app.input_mode, InputMode::Editing);

        // 'q' is text while editing
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit);
        assert_eq!(app.session.draft, "q");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Normal);
        press(&mut app, KeyCode::Char('i'));
        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.cursor, 1);

        ctrl(&mut app, 'c');
        assert!(app.should_quit);
    }

    #[test]
    fn test_ctrl_l_clears_from_any_mode() {
        let mut app = app();
        let welcome = app.session.welcome().clone();
        ctrl(&mut app, 'l');
        assert_eq!(app.session.messages(), &[welcome.clone()]);

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('c'));
        assert_eq!(app.session.messages(), &[welcome]);
    }
}
