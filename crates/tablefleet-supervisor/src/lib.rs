//! Worker process supervision for tablefleet.
//!
//! The supervisor launches workers as child processes, addresses intents to
//! them through the record store, and retires them: first cooperatively with
//! an `exit` intent, then by force after a grace window.

pub mod console;
pub mod handle;
pub mod identity;
pub mod kill_tree;
pub mod supervisor;

pub use console::{parse as parse_command, run_console, ConsoleCommand};
pub use handle::{delimiter, LaunchContext, LogMode, WorkerHandle, WorkerLaunch, WorkerStatus};
pub use identity::allocate_identity;
pub use kill_tree::{is_alive, kill_tree, KillTreeConfig};
pub use supervisor::{MemberState, MemberSummary, Supervisor, SupervisorEvent};
