//! Line-oriented terminal view.
//!
//! Reads commands and prompts from stdin, streams the assistant's reply to
//! stdout as the trailing entry grows, and prints notifications for session
//! events. The view only reads snapshots and sends intents.

use std::io::Write;

use parley_common::{
    Notification, NotificationLevel, NotificationQueue, Sender, SessionId, SessionStatus,
};
use parley_session::{Intent, SessionHandle, SessionSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::commands::{self, Command};

/// Turns successive snapshots into the text to append to the terminal.
#[derive(Debug, Default)]
pub struct Transcript {
    session: Option<SessionId>,
    /// Entries fully written out.
    finished: usize,
    /// Bytes of the trailing pending entry already written.
    streamed: usize,
    status: Option<SessionStatus>,
}

impl Transcript {
    pub fn render(&mut self, snapshot: &SessionSnapshot) -> String {
        let mut out = String::new();

        if self.session.as_ref() != Some(&snapshot.session_id) {
            if self.session.is_some() {
                out.push_str("-- new conversation --\n");
            }
            self.session = Some(snapshot.session_id.clone());
            self.finished = 0;
            self.streamed = 0;
        }

        self.render_status(snapshot.status, &mut out);

        for entry in snapshot.history.iter().skip(self.finished) {
            if entry.sender == Sender::User {
                self.finished += 1;
                continue;
            }

            out.push_str(entry.content.get(self.streamed..).unwrap_or_default());
            if entry.pending {
                self.streamed = entry.content.len();
                break;
            }

            if entry.cancelled {
                out.push_str(" [cancelled]");
            }
            if let Some(ref error) = entry.error {
                out.push_str(&format!(" [error: {error}]"));
            }
            out.push('\n');
            self.finished += 1;
            self.streamed = 0;
        }

        out
    }

    fn render_status(&mut self, status: SessionStatus, out: &mut String) {
        let previous = self.status.replace(status);
        if previous == Some(status) {
            return;
        }
        match (previous, status) {
            (Some(SessionStatus::ModelLoading { .. }), SessionStatus::ModelLoading { .. })
            | (None, SessionStatus::ModelLoading { .. }) => {
                out.push_str(&format!("\r-- {status} --"));
            }
            (Some(SessionStatus::ModelLoading { .. }), _) => {
                out.push_str(&format!("\n-- {status} --\n"));
            }
            (_, SessionStatus::ModelLoading { .. }) => {
                out.push_str(&format!("-- {status} --"));
            }
            // Generation boundaries are visible from the streamed text.
            (_, SessionStatus::Generating) | (Some(SessionStatus::Generating), _) => {}
            (_, status) => out.push_str(&format!("-- {status} --\n")),
        }
    }
}

fn level_tag(level: NotificationLevel) -> &'static str {
    match level {
        NotificationLevel::Info => "info",
        NotificationLevel::Warning => "warn",
        NotificationLevel::Error => "error",
    }
}

fn print(text: &str) {
    if text.is_empty() {
        return;
    }
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

fn print_notification(notification: &Notification) {
    print(&format!(
        "[{}] {}: {}\n",
        level_tag(notification.level),
        notification.title,
        notification.body
    ));
}

/// What the input loop should do after a line.
enum Flow {
    Continue,
    Quit,
}

struct TerminalView {
    handle: SessionHandle,
    transcript: Transcript,
    notifications: NotificationQueue,
}

impl TerminalView {
    async fn handle_line(&mut self, line: &str) -> Flow {
        let command = match commands::parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(message) => {
                print(&format!("{message}\n"));
                return Flow::Continue;
            }
        };

        let snapshot = self.handle.snapshot();
        let intents = match command {
            Command::Prompt(text) => vec![
                Intent::SetDraftPrompt(text.clone()),
                Intent::SubmitPrompt(text),
            ],
            Command::Load(path) => vec![Intent::LoadModel(path)],
            Command::Cancel => vec![Intent::Cancel],
            Command::Clear => vec![Intent::ClearSession],
            Command::Set { field, value } => {
                match commands::apply_setting(&snapshot.parameters, &field, &value) {
                    Ok(params) => vec![Intent::SetParameters(params)],
                    Err(message) => {
                        print(&format!("{message}\n"));
                        return Flow::Continue;
                    }
                }
            }
            Command::Params => {
                let json = serde_json::to_string_pretty(&snapshot.parameters)
                    .unwrap_or_else(|e| format!("failed to format parameters: {e}"));
                print(&format!("{json}\n"));
                return Flow::Continue;
            }
            Command::Status => {
                self.print_status(&snapshot);
                return Flow::Continue;
            }
            Command::Help => {
                print(&format!("{}\n", commands::HELP));
                return Flow::Continue;
            }
            Command::Quit => return Flow::Quit,
        };

        for intent in intents {
            debug!(?intent, "sending intent");
            if self.handle.send(intent).await.is_err() {
                warn!("session closed, dropping input");
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    fn print_status(&mut self, snapshot: &SessionSnapshot) {
        let model = snapshot.model_path.as_deref().unwrap_or("none");
        let mut out = format!(
            "status: {}\nmodel: {model}\nmessages: {}\ntokens generated: {}\n",
            snapshot.status,
            snapshot.history.len(),
            snapshot.total_tokens,
        );
        if let Some(stats) = snapshot.last_generation {
            out.push_str(&format!(
                "last reply: {} tokens in {:.1}s ({:.1} tok/s)\n",
                stats.tokens,
                stats.elapsed.as_secs_f64(),
                stats.tokens_per_second()
            ));
        }
        if let Some(ref error) = snapshot.last_error {
            out.push_str(&format!("last error: {error}\n"));
        }
        print(&out);
        for notification in self.notifications.visible() {
            print_notification(notification);
        }
    }

    fn on_event(&mut self, event: parley_common::SessionEvent) {
        if let Some(notification) = Notification::from_event(&event) {
            print_notification(&notification);
            self.notifications.push(notification);
        }
    }
}

/// Run the view until `/quit`, or until stdin closes and the session is idle.
pub async fn run(handle: SessionHandle) {
    let mut snapshots = handle.subscribe();
    let mut events = handle.events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let mut view = TerminalView {
        handle,
        transcript: Transcript::default(),
        notifications: NotificationQueue::default(),
    };
    print(&view.transcript.render(&snapshots.borrow_and_update()));

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Flow::Quit = view.handle_line(&line).await {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    stdin_open = false;
                    if view.handle.flush().await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print(&view.transcript.render(&snapshot));
            }
            event = events.recv() => match event {
                Ok(event) => view.on_event(event),
                Err(RecvError::Lagged(n)) => warn!("missed {n} session events"),
                Err(RecvError::Closed) => break,
            },
        }

        if !stdin_open {
            let status = view.handle.snapshot().status;
            if !status.is_generating() && !status.is_loading() {
                break;
            }
        }
    }

    view.handle.shutdown().await;
}
