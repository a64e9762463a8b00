//! Event handling for the presentation TUI

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use wayline_core::CrossroadAction;

use crate::app::App;

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Quit,
    NeedsRedraw,
}

/// Handle a terminal event
pub fn handle_event(app: &mut App, event: Event) -> EventResult {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key_event(app, key),
        Event::Resize(_, _) => EventResult::NeedsRedraw,
        _ => EventResult::Continue,
    }
}

/// Handle a key event
fn handle_key_event(app: &mut App, key: KeyEvent) -> EventResult {
    if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
        return EventResult::Quit;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => EventResult::Quit,

        KeyCode::Enter => {
            app.confirm();
            EventResult::NeedsRedraw
        }

        // Swipe equivalents
        KeyCode::Right | KeyCode::Char(' ') | KeyCode::Char('l') => {
            app.advance();
            EventResult::NeedsRedraw
        }
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Backspace => {
            app.retreat();
            EventResult::NeedsRedraw
        }

        // Quiz and choice options are numbered on screen
        KeyCode::Char(c @ '1'..='9') => {
            app.select(c as usize - '0' as usize);
            EventResult::NeedsRedraw
        }

        // Crossroad buttons
        KeyCode::Char('n') => {
            app.crossroad(CrossroadAction::Next);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('p') => {
            app.crossroad(CrossroadAction::Previous);
            EventResult::NeedsRedraw
        }

        KeyCode::Char('m') => {
            app.toggle_mute();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('r') => {
            app.reset();
            EventResult::NeedsRedraw
        }

        _ => EventResult::Continue,
    }
}
