//! Line-oriented front end: maps typed commands onto a [`CallHandle`] and
//! prints every status change.

use crate::controller::{CallHandle, Snapshot};
use crate::logger::log;
use tokio::io::{self, AsyncBufReadExt, BufReader};

const HELP: &str = "commands: media | call | join <id> | hangup | status | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Media,
    Call,
    Join(String),
    HangUp,
    Status,
    Quit,
    Help,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let command = match word.to_ascii_lowercase().as_str() {
            "media" | "webcam" => ConsoleCommand::Media,
            "call" => ConsoleCommand::Call,
            // An empty id still goes through so the controller can say so
            "join" | "answer" => ConsoleCommand::Join(rest.trim().to_owned()),
            "hangup" => ConsoleCommand::HangUp,
            "status" => ConsoleCommand::Status,
            "quit" | "exit" => ConsoleCommand::Quit,
            "help" | "?" => ConsoleCommand::Help,
            _ => ConsoleCommand::Unknown(word.to_owned()),
        };
        Some(command)
    }
}

fn describe(snapshot: &Snapshot) -> String {
    format!(
        "state={:?} call={} peer={} channel={} pending_candidates={} remote_tracks={} status=\"{}\"",
        snapshot.state,
        snapshot.call_id.as_ref().map_or("-", |id| id.as_str()),
        snapshot.has_peer,
        snapshot.channel_open,
        snapshot.pending_candidates,
        snapshot.remote_tracks,
        snapshot.status.text,
    )
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run_console(handle: CallHandle) -> io::Result<()> {
    let mut status = handle.status();
    let printer = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            match &current.call_id {
                Some(id) => println!("[{id}] {}", current.text),
                None => println!("{}", current.text),
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };
        let delivered = match command {
            ConsoleCommand::Media => handle.acquire_media(),
            ConsoleCommand::Call => handle.start_call(),
            ConsoleCommand::Join(id) => handle.join_call(id),
            ConsoleCommand::HangUp => handle.hang_up(),
            ConsoleCommand::Status => match handle.snapshot().await {
                Some(snapshot) => {
                    println!("{}", describe(&snapshot));
                    true
                }
                None => false,
            },
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => {
                println!("{HELP}");
                true
            }
            ConsoleCommand::Unknown(word) => {
                println!("unknown command '{word}'; {HELP}");
                true
            }
        };
        if !delivered {
            log("Call controller is gone");
            break;
        }
    }

    handle.shutdown();
    printer.abort();
    Ok(())
}
