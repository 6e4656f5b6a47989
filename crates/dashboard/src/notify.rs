//! Desktop/push notification through an external command.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use seareport_common::{NotifyError, Notifier};

/// Placeholder replaced by the message in command templates.
pub const MESSAGE_PLACEHOLDER: &str = "{msg}";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    /// Argument vectors tried in order; the first whose program is on
    /// `PATH` wins.
    pub commands: Vec<Vec<String>>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        let command = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        Self {
            enabled: true,
            commands: vec![
                command(&["ntfy", "send", MESSAGE_PLACEHOLDER]),
                command(&["notify-send", MESSAGE_PLACEHOLDER]),
                command(&["osascript", "-e", "display notification \"{msg}\""]),
            ],
        }
    }
}

#[derive(Debug, Clone)]
struct ResolvedCommand {
    program: PathBuf,
    args: Vec<String>,
}

/// Runs the first available notification program, without a shell.
#[derive(Debug)]
pub struct CommandNotifier {
    commands: Vec<Vec<String>>,
    search_path: Option<OsString>,
    resolved: OnceLock<Option<ResolvedCommand>>,
}

impl CommandNotifier {
    pub fn new(commands: Vec<Vec<String>>) -> Self {
        Self {
            commands,
            search_path: None,
            resolved: OnceLock::new(),
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(config.commands.clone())
    }

    /// Search `path` instead of the `PATH` environment variable.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// The program that will be used, probed once.
    pub fn program(&self) -> Option<&Path> {
        self.resolve().map(|c| c.program.as_path())
    }

    fn resolve(&self) -> Option<&ResolvedCommand> {
        self.resolved
            .get_or_init(|| {
                let search_path = self.search_path.clone().or_else(|| std::env::var_os("PATH"))?;
                self.commands.iter().find_map(|command| {
                    let (program, args) = command.split_first()?;
                    let program = find_executable(&search_path, program)?;
                    debug!(program = %program.display(), "Selected notification program");
                    Some(ResolvedCommand {
                        program,
                        args: args.to_vec(),
                    })
                })
            })
            .as_ref()
    }
}

fn find_executable(search_path: &OsString, program: &str) -> Option<PathBuf> {
    std::env::split_paths(search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl Notifier for CommandNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let Some(command) = self.resolve() else {
            warn!("Couldn't find any known notification program");
            return Ok(());
        };

        let program = command.program.display().to_string();
        let status = Command::new(&command.program)
            .args(command.args.iter().map(|a| a.replace(MESSAGE_PLACEHOLDER, message)))
            .status()
            .map_err(|e| NotifyError::Spawn {
                program: program.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(NotifyError::Failed {
                program,
                status: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}
