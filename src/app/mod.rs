// Chatbot Rust - A streaming chat client core in Rust
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod history;
mod interpreter;
pub mod reveal;
mod state;
pub mod tool_calls;
mod turn;

pub use history::{LOAD_FAILED_MESSAGE, refresh_conversations};
pub use interpreter::{DEFAULT_PAUSE_REASON, handle_client_event, reveal_tick};
pub use reveal::RevealScheduler;
pub use state::{
    App, AppStatus, ChatMessage, MessageRole, ToolCallInfo, ToolCallStatus, TurnState,
};
pub use turn::{
    NO_CLIENT_MESSAGE, new_conversation, resume_stream, retry, stop_streaming, submit_input,
};

use std::time::Instant;
use tokio::sync::mpsc;

/// User intent coming from whatever front end drives the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    Stop,
    Retry,
    Resume,
    NewConversation,
    History,
    Quit,
}

impl Command {
    /// Slash commands map to actions, anything else is a message.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "/stop" => Self::Stop,
            "/retry" => Self::Retry,
            "/resume" => Self::Resume,
            "/new" => Self::NewConversation,
            "/history" => Self::History,
            "/quit" | "/exit" => Self::Quit,
            _ => Self::Submit(line.to_owned()),
        }
    }
}

pub fn handle_command(app: &mut App, command: Command) {
    match command {
        Command::Submit(text) => {
            submit_input(app, &text);
        }
        Command::Stop => stop_streaming(app),
        Command::Retry => {
            retry(app);
        }
        Command::Resume => {
            resume_stream(app);
        }
        Command::NewConversation => new_conversation(app),
        Command::History => {
            refresh_conversations(app);
        }
        Command::Quit => {
            stop_streaming(app);
            app.should_quit = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Event/tick loop
// ---------------------------------------------------------------------------

/// Drive the app until a `Quit` command arrives or the command channel closes
/// with no turn left in flight. `on_frame` sees the state after every tick.
pub async fn run(
    app: &mut App,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    mut on_frame: impl FnMut(&App),
) {
    let mut commands_open = true;
    let mut last_tick = Instant::now();

    loop {
        // Phase 1: wait for at least one message or the next tick
        let time_to_next = reveal::FRAME_DELAY.saturating_sub(last_tick.elapsed());
        tokio::select! {
            command = commands.recv(), if commands_open => match command {
                Some(command) => handle_command(app, command),
                None => commands_open = false,
            },
            Some(event) = app.event_rx.recv() => handle_client_event(app, event),
            () = tokio::time::sleep(time_to_next) => {}
        }

        // Phase 2: drain everything already queued
        loop {
            if commands_open && let Ok(command) = commands.try_recv() {
                handle_command(app, command);
                continue;
            }
            match app.event_rx.try_recv() {
                Ok(event) => handle_client_event(app, event),
                Err(_) => break,
            }
        }

        if app.should_quit || (!commands_open && !app.is_busy()) {
            break;
        }

        // Phase 3: advance the reveal once
        last_tick = Instant::now();
        reveal_tick(app, last_tick);
        on_frame(app);
    }
}

/// Drive the app until the current turn is finalized.
pub async fn run_until_idle(app: &mut App, mut on_frame: impl FnMut(&App)) {
    let mut last_tick = Instant::now();
    while app.is_busy() && !app.should_quit {
        let time_to_next = reveal::FRAME_DELAY.saturating_sub(last_tick.elapsed());
        tokio::select! {
            Some(event) = app.event_rx.recv() => handle_client_event(app, event),
            () = tokio::time::sleep(time_to_next) => {}
        }
        while let Ok(event) = app.event_rx.try_recv() {
            handle_client_event(app, event);
        }
        last_tick = Instant::now();
        reveal_tick(app, last_tick);
        on_frame(app);
    }
}
