//! Non-blocking keyboard polling for the foreground loop.

use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

/// Commands the capture pipeline reacts to; every other key is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    TogglePause,
    Terminate,
}

/// Wait up to `timeout` for a key and translate it. Only `Press` events
/// count, so terminals reporting release/repeat events cannot double-fire
/// a toggle.
pub fn poll_command(timeout: Duration) -> Result<Option<KeyCommand>> {
    if !event::poll(timeout).context("failed to poll terminal events")? {
        return Ok(None);
    }
    let Event::Key(key) = event::read().context("failed to read terminal event")? else {
        return Ok(None);
    };
    if key.kind != KeyEventKind::Press {
        return Ok(None);
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(Some(KeyCommand::Terminate));
    }
    match key.code {
        KeyCode::Char('p') | KeyCode::Char('P') => Ok(Some(KeyCommand::TogglePause)),
        _ => Ok(None),
    }
}
