//! Interactive console on stdin
//!
//! Each line is parsed as a clap multicall command, so the first word names
//! the command. A leading `/` is accepted for players used to chat-style
//! commands.

use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::link::StatusHandle;
use crate::session::ServerSession;

#[derive(Debug, Parser)]
#[command(multicall = true)]
struct ConsoleCommand {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Show the state of the connection to AM2R
    Am2r,
    /// Send the slot connection request to the multiworld server
    Ready,
    /// Stop the connector
    #[command(alias = "quit")]
    Exit,
}

/// What the caller should do with a handled line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleReply {
    /// Show this text to the user
    Print(String),
    /// Stop the connector
    Exit,
    /// Nothing to do
    Nothing,
}

/// Everything the console commands can observe or trigger
#[derive(Clone)]
pub struct ConsoleContext {
    pub status: StatusHandle,
    pub session: Option<Arc<ServerSession>>,
}

/// Interpret one console line
pub fn handle_line(line: &str, ctx: &ConsoleContext) -> ConsoleReply {
    let mut args = line.split_whitespace();
    let Some(first) = args.next() else {
        return ConsoleReply::Nothing;
    };
    let first = first.strip_prefix('/').unwrap_or(first);

    let command = match ConsoleCommand::try_parse_from(std::iter::once(first).chain(args)) {
        Ok(command) => command,
        Err(err) if err.kind() == ErrorKind::DisplayHelp => {
            return ConsoleReply::Print(err.render().to_string())
        }
        Err(err) => {
            let help = ConsoleCommand::command().render_help();
            return ConsoleReply::Print(format!("{}\n{}", err.render(), help));
        }
    };

    match command.action {
        Action::Am2r => ConsoleReply::Print(format!("Connection Status: {}", ctx.status)),
        Action::Ready => match ctx.session {
            None => ConsoleReply::Print("No multiworld server configured".to_string()),
            Some(ref session) => match session.send_ready() {
                Ok(()) => ConsoleReply::Print("Sending slot connection request".to_string()),
                Err(e) => ConsoleReply::Print(e.to_string()),
            },
        },
        Action::Exit => ConsoleReply::Exit,
    }
}

/// Read commands from stdin until `shutdown` is cancelled or input ends.
///
/// `exit` cancels `shutdown`. End of input only stops the console.
pub async fn run_console(ctx: ConsoleContext, shutdown: CancellationToken) {
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => match handle_line(&line, &ctx) {
                ConsoleReply::Print(text) => println!("{}", text.trim_end()),
                ConsoleReply::Exit => {
                    shutdown.cancel();
                    break;
                }
                ConsoleReply::Nothing => {}
            },
            Ok(None) => {
                debug!("Console input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read console input");
                break;
            }
        }
    }
}
