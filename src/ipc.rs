//! IPC command types, global command bus, and Unix socket listener.
//!
//! Commands are parsed on the listener thread, pushed onto an async channel,
//! and drained by the main loop each iteration. The socket also doubles as a
//! single-instance lock: a second launch finds it connectable and exits.

use async_channel::{Receiver, Sender};
use std::sync::OnceLock;

/// An IPC command destined for the main thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcCommand {
    Expand,
    Collapse,
    Toggle,
    /// Re-read the config file immediately.
    Reload,
}

struct IpcCommandBus {
    tx: Sender<IpcCommand>,
    rx: Receiver<IpcCommand>,
}

static IPC_COMMAND_BUS: OnceLock<IpcCommandBus> = OnceLock::new();

fn command_bus() -> &'static IpcCommandBus {
    IPC_COMMAND_BUS.get_or_init(|| {
        let (tx, rx) = async_channel::unbounded();
        IpcCommandBus { tx, rx }
    })
}

/// Returns a receiver for the main loop's drain.
pub fn subscribe_ipc_commands() -> Receiver<IpcCommand> {
    command_bus().rx.clone()
}

fn push_ipc_command(cmd: IpcCommand) {
    let _ = command_bus().tx.try_send(cmd);
}

/// Parses and dispatches a single IPC command string, returning a response.
pub fn handle_ipc_command(command: &str) -> String {
    match parse_ipc_command(command) {
        ParsedCommand::Status => serde_json::json!({
            "version": crate::VERSION,
            "running": true,
        })
        .to_string(),
        ParsedCommand::Queue(cmd) => {
            push_ipc_command(cmd);
            "OK".to_string()
        }
        ParsedCommand::Unknown(verb) => format!("ERR: unknown command '{}'", verb),
    }
}

enum ParsedCommand {
    Status,
    Queue(IpcCommand),
    Unknown(String),
}

fn parse_ipc_command(command: &str) -> ParsedCommand {
    match command.trim() {
        "status" => ParsedCommand::Status,
        "expand" => ParsedCommand::Queue(IpcCommand::Expand),
        "collapse" => ParsedCommand::Queue(IpcCommand::Collapse),
        "toggle" => ParsedCommand::Queue(IpcCommand::Toggle),
        "reload" => ParsedCommand::Queue(IpcCommand::Reload),
        other => ParsedCommand::Unknown(other.to_string()),
    }
}

/// Starts the IPC listener on a Unix socket, spawning a background thread.
pub fn start_ipc_listener(socket_path: &std::path::Path) -> std::io::Result<()> {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::{UnixListener, UnixStream};

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = match UnixListener::bind(socket_path) {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(socket_path).is_ok() {
                eprintln!("Notchling is already running.");
                std::process::exit(0);
            }
            // Stale socket from a crashed instance.
            let _ = std::fs::remove_file(socket_path);
            UnixListener::bind(socket_path)?
        }
        Err(err) => return Err(err),
    };

    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            let _ = reader.read_line(&mut line);
            let response = handle_ipc_command(&line);
            if let Ok(mut stream) = reader.into_inner().try_clone() {
                let _ = writeln!(stream, "{}", response);
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_returns_version_json() {
        let resp = handle_ipc_command("status");
        let parsed: serde_json::Value = serde_json::from_str(&resp).unwrap();
        assert_eq!(parsed["running"], true);
        assert_eq!(parsed["version"], crate::VERSION);
    }

    #[test]
    fn panel_commands_are_queued() {
        let rx = subscribe_ipc_commands();
        while rx.try_recv().is_ok() {}

        assert_eq!(handle_ipc_command("expand"), "OK");
        assert_eq!(handle_ipc_command("collapse"), "OK");
        // Trailing newline from the socket read is tolerated.
        assert_eq!(handle_ipc_command("  toggle\n"), "OK");
        assert_eq!(handle_ipc_command("reload"), "OK");

        assert_eq!(rx.try_recv().unwrap(), IpcCommand::Expand);
        assert_eq!(rx.try_recv().unwrap(), IpcCommand::Collapse);
        assert_eq!(rx.try_recv().unwrap(), IpcCommand::Toggle);
        assert_eq!(rx.try_recv().unwrap(), IpcCommand::Reload);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let resp = handle_ipc_command("frobnicate");
        assert!(resp.starts_with("ERR:"));
        assert!(resp.contains("frobnicate"));
    }

    #[test]
    fn empty_command_is_an_error() {
        assert!(handle_ipc_command("").starts_with("ERR:"));
    }
}
