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

use chatbot_rust::Cli;
use chatbot_rust::api::wire::Conversation;
use chatbot_rust::api::{ClientEvent, JobClient};
use chatbot_rust::app::{self, App, ChatMessage, Command, MessageRole};
use chatbot_rust::error::AppError;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::rc::Rc;
use tokio::io::AsyncBufReadExt as _;
use tokio::sync::mpsc;

#[allow(clippy::exit)]
fn main() {
    if let Err(err) = run() {
        if let Some(app_error) = extract_app_error(&err) {
            eprintln!("{}", app_error.user_message());
            std::process::exit(app_error.exit_code());
        }
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let config = chatbot_rust::config::initialize(cli.chat_config()?);
    let client = JobClient::from_global().map_err(|e| {
        tracing::error!("failed to build HTTP client: {e}");
        AppError::InvalidConfig
    })?;
    tracing::info!(base_url = %config.base_url, embed_mode = ?config.embed_mode, "client configured");

    let rt = tokio::runtime::Runtime::new()?;
    let local_set = tokio::task::LocalSet::new();

    let result = rt.block_on(local_set.run_until(async move {
        let mut app = App::new(Some(Rc::new(client)), config.embed_mode);
        if let Some(id) = &cli.conversation_id {
            app.conversation_id.clone_from(id);
        }
        forward_ctrl_c(app.event_tx.clone());
        let mut printer = Printer::default();

        if let Some(prompt) = cli.prompt_text() {
            app::submit_input(&mut app, &prompt);
            app::run_until_idle(&mut app, |app| printer.frame(app)).await;
            if let Some(app_error) = app.exit_error.take() {
                return Err(anyhow::Error::new(app_error));
            }
            return Ok(());
        }

        eprintln!("Conversation {}. /retry /resume /stop /new /history /quit", app.conversation_id);
        app::refresh_conversations(&mut app);
        let (tx, mut commands) = mpsc::unbounded_channel();
        tokio::task::spawn_local(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(Command::parse(&line)).is_err() {
                    break;
                }
            }
        });
        app::run(&mut app, &mut commands, |app| printer.frame(app)).await;
        Ok(())
    }));
    // The stdin reader may still be parked on a blocking read.
    rt.shutdown_background();
    result
}

/// Ctrl+C stops the active turn instead of killing the process.
fn forward_ctrl_c(tx: mpsc::UnboundedSender<ClientEvent>) {
    tokio::task::spawn_local(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(ClientEvent::StopRequested).is_err() {
                break;
            }
        }
    });
}

/// Prints the growing suffix of the newest assistant message to stdout and
/// progress or errors to stderr.
#[derive(Default)]
struct Printer {
    message_id: Option<String>,
    printed: usize,
    status: Option<String>,
    finished: bool,
    conversations: Vec<Conversation>,
}

impl Printer {
    fn frame(&mut self, app: &App) {
        if self.conversations != app.conversations {
            self.conversations.clone_from(&app.conversations);
            for c in &self.conversations {
                let title = c.title.as_deref().unwrap_or("(untitled)");
                eprintln!("  {}  {title}  ({} messages)", c.conversation_id, c.message_count);
            }
        }
        let Some(message) = app.messages.iter().rev().find(|m| m.role == MessageRole::Assistant)
        else {
            return;
        };
        if self.message_id.as_deref() != Some(message.id.as_str()) {
            self.message_id = Some(message.id.clone());
            self.printed = 0;
            self.status = None;
            self.finished = false;
        }
        if message.status != self.status {
            self.status.clone_from(&message.status);
            if let Some(status) = &self.status {
                eprintln!("[{status}]");
            }
        }
        self.print_new_text(message);
        if !message.animation_complete {
            self.finished = false;
        } else if !self.finished {
            self.finished = true;
            finish_message(message);
        }
    }

    fn print_new_text(&mut self, message: &ChatMessage) {
        if !message.content.is_char_boundary(self.printed) {
            self.printed = 0;
        }
        let Some(new) = message.content.get(self.printed..).filter(|s| !s.is_empty()) else {
            return;
        };
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(new.as_bytes());
        let _ = out.flush();
        self.printed = message.content.len();
    }
}

fn finish_message(message: &ChatMessage) {
    println!();
    for call in message.tool_calls.iter().flatten() {
        let data = call.data.as_ref().map(ToString::to_string).unwrap_or_default();
        eprintln!("[tool {}] {data}", call.tool);
    }
    if message.has_error {
        eprintln!("[error] reply failed; /retry to resend or /resume to reconnect");
    }
}

fn extract_app_error(err: &anyhow::Error) -> Option<AppError> {
    err.chain().find_map(|cause| cause.downcast_ref::<AppError>().cloned())
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let Some(path) = cli.log_file.as_ref() else {
        if std::env::var_os("RUST_LOG").is_some() {
            eprintln!(
                "RUST_LOG is set, but tracing is disabled without --log-file <PATH>. \
Use --log-file to enable diagnostics."
            );
        }
        return Ok(());
    };

    let directives = cli
        .log_filter
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_owned());
    let filter = tracing_subscriber::EnvFilter::try_new(directives.as_str())
        .map_err(|e| anyhow::anyhow!("invalid tracing filter `{directives}`: {e}"))?;

    let mut options = OpenOptions::new();
    options.create(true).write(true);
    if cli.log_append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    let file = options
        .open(path)
        .map_err(|e| anyhow::anyhow!("failed to open log file {}: {e}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))?;

    tracing::info!(
        target: "diagnostics",
        version = env!("CARGO_PKG_VERSION"),
        log_file = %path.display(),
        log_filter = %directives,
        log_append = cli.log_append,
        "tracing enabled"
    );

    Ok(())
}
