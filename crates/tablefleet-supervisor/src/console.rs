//! Line-oriented operator console.
//!
//! Reads commands from an async line source and applies them to a
//! [`Supervisor`], interleaved with the supervisor's deferred-task events.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::warn;

use tablefleet_types::{Action, WorkerId};

use crate::supervisor::{MemberState, Supervisor, SupervisorEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Broadcast(Action),
    List,
    Spawn,
    Kill(WorkerId),
    Restart(WorkerId),
    Exit,
    Help,
}

pub const HELP: &str = "\
commands:
  1 | check          broadcast check
  2 | call           broadcast call
  3 | allin          broadcast all-in
  4 | fold           broadcast fold
  7 | list           show workers
  8 | spawn          start a new worker
  9 <id> | kill <id> stop a worker
  restart <id>       stop a worker and start it again under the same id
  0 | exit           stop every worker and quit
  help               show this message";

fn worker_arg(arg: Option<&str>, verb: &str) -> Result<WorkerId, String> {
    arg.ok_or_else(|| format!("usage: {verb} <id>"))?.parse()
}

/// Parse one console line. Blank lines are an error the caller ignores.
pub fn parse(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| "empty command".to_string())?;
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments: {line:?}"));
    }

    let command = match verb.to_ascii_lowercase().as_str() {
        "1" | "check" => ConsoleCommand::Broadcast(Action::Check),
        "2" | "call" => ConsoleCommand::Broadcast(Action::Call),
        "3" | "allin" | "all_in" | "all-in" => ConsoleCommand::Broadcast(Action::AllIn),
        "4" | "fold" => ConsoleCommand::Broadcast(Action::Fold),
        "7" | "list" => ConsoleCommand::List,
        "8" | "spawn" => ConsoleCommand::Spawn,
        "9" | "kill" => return worker_arg(arg, verb).map(ConsoleCommand::Kill),
        "restart" => return worker_arg(arg, verb).map(ConsoleCommand::Restart),
        "0" | "exit" | "quit" => ConsoleCommand::Exit,
        "help" | "?" => ConsoleCommand::Help,
        other => return Err(format!("unknown command {other:?}, try 'help'")),
    };
    if arg.is_some() {
        return Err(format!("{verb} takes no argument"));
    }
    Ok(command)
}

fn print_members(supervisor: &mut Supervisor) {
    let members = supervisor.statuses();
    if members.is_empty() {
        println!("no workers");
        return;
    }
    println!(
        "intent: {} (version {})",
        supervisor.current(),
        supervisor.version()
    );
    for member in members {
        let state = match member.state {
            MemberState::Running { pid, uptime } => {
                format!("running  pid={pid} up={}s", uptime.as_secs())
            }
            MemberState::Exited { code: Some(code) } => format!("exited   code={code}"),
            MemberState::Exited { code: None } => "exited   by signal".to_string(),
            MemberState::Retiring if member.respawn_pending => "retiring (restart pending)".into(),
            MemberState::Retiring => "retiring".to_string(),
        };
        println!("  worker {:<3} {state}", member.id);
    }
}

/// Apply one command. Returns false once the console should stop.
async fn apply(
    supervisor: &mut Supervisor,
    events: &mut mpsc::UnboundedReceiver<SupervisorEvent>,
    command: ConsoleCommand,
) -> bool {
    match command {
        ConsoleCommand::Broadcast(action) => {
            let version = supervisor.broadcast(action);
            println!("{action} sent to all workers (version {version})");
        }
        ConsoleCommand::List => print_members(supervisor),
        ConsoleCommand::Spawn => match supervisor.spawn_worker() {
            Ok(id) => println!("worker {id} started"),
            Err(e) => println!("spawn failed: {e}"),
        },
        ConsoleCommand::Kill(id) => match supervisor.kill(id) {
            Ok(()) => println!("worker {id} stopping"),
            Err(e) => println!("kill failed: {e}"),
        },
        ConsoleCommand::Restart(id) => match supervisor.restart(id) {
            Ok(()) => println!("worker {id} restarting"),
            Err(e) => println!("restart failed: {e}"),
        },
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Exit => {
            println!("stopping all workers");
            supervisor.shutdown(events).await;
            return false;
        }
    }
    true
}

/// Run the console until `exit` or end of input, then shut the fleet down.
pub async fn run_console<R>(
    supervisor: &mut Supervisor,
    events: &mut mpsc::UnboundedReceiver<SupervisorEvent>,
    input: R,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    println!("{HELP}");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        apply(supervisor, events, ConsoleCommand::Exit).await;
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "console input failed");
                        apply(supervisor, events, ConsoleCommand::Exit).await;
                        return;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse(&line) {
                    Ok(command) => {
                        if !apply(supervisor, events, command).await {
                            return;
                        }
                    }
                    Err(e) => println!("{e}"),
                }
            }
            Some(event) = events.recv() => {
                if let Err(e) = supervisor.handle_event(&event) {
                    warn!(error = %e, "failed to apply supervisor event");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_shortcuts_match_words() {
        let pairs = [
            ("1", "check"),
            ("2", "call"),
            ("3", "allin"),
            ("4", "fold"),
            ("7", "list"),
            ("8", "spawn"),
            ("0", "exit"),
        ];
        for (code, word) in pairs {
            assert_eq!(parse(code), parse(word), "{code} vs {word}");
        }
        assert_eq!(parse("9 2"), Ok(ConsoleCommand::Kill(WorkerId(2))));
        assert_eq!(parse("kill 2"), Ok(ConsoleCommand::Kill(WorkerId(2))));
    }

    #[test]
    fn broadcast_commands_map_to_actions() {
        assert_eq!(parse("fold"), Ok(ConsoleCommand::Broadcast(Action::Fold)));
        assert_eq!(parse("ALL-IN"), Ok(ConsoleCommand::Broadcast(Action::AllIn)));
        assert_eq!(parse("  call  "), Ok(ConsoleCommand::Broadcast(Action::Call)));
    }

    #[test]
    fn restart_needs_an_id() {
        assert_eq!(parse("restart 4"), Ok(ConsoleCommand::Restart(WorkerId(4))));
        assert!(parse("restart").is_err());
        assert!(parse("kill bot").is_err());
        assert!(parse("9 -1").is_err());
    }

    #[test]
    fn rejects_unknown_and_extra_arguments() {
        assert!(parse("raise").is_err());
        assert!(parse("list 3").is_err());
        assert!(parse("kill 1 2").is_err());
        assert!(parse("").is_err());
    }

    #[tokio::test]
    async fn console_applies_commands_and_exits_on_eof() {
        use std::path::PathBuf;
        use tablefleet_types::{Amount, IntentRead, IntentStore, SupervisorSettings};

        use crate::handle::{LaunchContext, WorkerLaunch};

        let dir = tempfile::tempdir().unwrap();
        let settings = SupervisorSettings {
            exit_grace_ms: 50,
            exit_clear_delay_ms: 60_000,
            kill_grace_ms: 200,
        };
        let launch = WorkerLaunch {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), "sleep 300 & wait".into()],
        };
        let context = LaunchContext {
            root: dir.path().to_path_buf(),
            target_url: "https://table.example".into(),
            threshold: Amount::from_units(1000),
        };
        let store = IntentStore::new(dir.path());
        let (mut sup, mut events) = Supervisor::new(settings, store.clone(), launch, context);

        let input: &[u8] = b"8\n8\n4\nbogus\n7\n";
        run_console(&mut sup, &mut events, input).await;

        assert!(sup.live_ids().is_empty());
        assert_eq!(sup.current(), Action::Fold);
        // fold at version 1, then the shutdown exit at version 2, whose
        // record is cleared before the console returns.
        assert_eq!(sup.version(), 2);
        assert_eq!(store.read(WorkerId(1)).unwrap(), IntentRead::Empty);
    }
}
