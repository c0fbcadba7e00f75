use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, Field, InputMode};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => app.scroll_chat_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Session(event) => app.on_session_event(event),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key).await,
    }

    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to typing
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('a') => {
            app.focus = Field::Attachment;
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Tab => app.toggle_focus(),

        // Chat scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = (app.chat_height / 2).max(1);
            app.scroll_down(half);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = (app.chat_height / 2).max(1);
            app.scroll_up(half);
        }
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => {
            app.follow_tail = true;
            app.scroll_chat_to_bottom();
        }

        _ => {}
    }
}

async fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => app.toggle_focus(),
        KeyCode::Enter => match app.focus {
            Field::Query => app.submit_query(),
            Field::Attachment => app.load_attachment_from_input().await,
        },
        KeyCode::Backspace => app.active_input().backspace(),
        KeyCode::Delete => app.active_input().delete(),
        KeyCode::Left => app.active_input().left(),
        KeyCode::Right => app.active_input().right(),
        KeyCode::Home => app.active_input().home(),
        KeyCode::End => app.active_input().end(),
        KeyCode::Char(c) => app.active_input().insert(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
