//! External commands run in response to a change.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use super::placeholders;
use crate::error::ActionError;
use crate::watcher::{Change, TriggerSet};
use crate::Result;

/// Declared command rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandConfig {
    /// Program to run (placeholders allowed).
    pub path: String,
    /// Whitespace-separated arguments (placeholders allowed).
    #[serde(default)]
    pub arguments: String,
    /// Triggers that run this command.
    pub triggers: TriggerSet,
}

impl CommandConfig {
    /// Validate the rule.
    ///
    /// # Errors
    ///
    /// Returns an error if no program or trigger is declared.
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(crate::Error::config("command path cannot be empty"));
        }
        if self.triggers.is_empty() {
            return Err(crate::Error::config("command requires at least one trigger"));
        }
        Ok(())
    }

    /// Run the command for `change` if it subscribes to the change's trigger.
    ///
    /// Returns the exit code, or `None` when the trigger is not subscribed.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be started.
    pub fn run(
        &self,
        runner: &dyn CommandRunner,
        watch_path: &Path,
        change: &Change,
    ) -> std::result::Result<Option<i32>, ActionError> {
        if !self.triggers.includes(change.trigger) {
            return Ok(None);
        }

        let program = placeholders::resolve(&self.path, watch_path, &change.full_path);
        let args: Vec<String> = self
            .arguments
            .split_whitespace()
            .map(|a| placeholders::resolve(a, watch_path, &change.full_path))
            .collect();

        let code = runner.run(&program, &args)?;
        if code == 0 {
            tracing::info!(command = %program, ?args, "Command completed");
        } else {
            tracing::warn!(command = %program, ?args, exit_code = code, "Command exited with non-zero status");
        }

        Ok(Some(code))
    }
}

/// Blocking runner for external programs.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started.
    fn run(&self, program: &str, args: &[String]) -> std::result::Result<i32, ActionError>;
}

/// Runner that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> std::result::Result<i32, ActionError> {
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| ActionError::Command {
                command: program.to_string(),
                reason: e.to_string(),
            })?;

        // Killed by signal has no code.
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::Trigger;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[String]) -> std::result::Result<i32, ActionError> {
            self.calls.lock().push((program.to_string(), args.to_vec()));
            Ok(0)
        }
    }

    #[test]
    fn test_arguments_are_resolved() {
        let rule = CommandConfig {
            path: "/usr/bin/logger".to_string(),
            arguments: "changed [fullpath] in [exactpath]".to_string(),
            triggers: TriggerSet::CHANGE,
        };
        let runner = RecordingRunner::default();
        let change = Change::new(Trigger::Change, "/data/a.txt");

        let code = rule.run(&runner, Path::new("/data"), &change).unwrap();
        assert_eq!(code, Some(0));

        let calls = runner.calls.lock();
        assert_eq!(calls[0].0, "/usr/bin/logger");
        assert_eq!(calls[0].1, vec!["changed", "/data/a.txt", "in", "/data"]);
    }

    #[test]
    fn test_unsubscribed_trigger_skips() {
        let rule = CommandConfig {
            path: "true".to_string(),
            arguments: String::new(),
            triggers: TriggerSet::DELETE,
        };
        let runner = RecordingRunner::default();
        let change = Change::new(Trigger::Create, "/data/a.txt");

        assert_eq!(rule.run(&runner, Path::new("/data"), &change).unwrap(), None);
        assert!(runner.calls.lock().is_empty());
    }

    #[test]
    fn test_spawn_failure_is_error() {
        let err = ProcessCommandRunner
            .run("/nonexistent/program/for/test", &[])
            .unwrap_err();
        assert!(matches!(err, ActionError::Command { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_reported() {
        assert_eq!(ProcessCommandRunner.run("true", &[]).unwrap(), 0);
        assert_eq!(ProcessCommandRunner.run("false", &[]).unwrap(), 1);
    }

    #[test]
    fn test_validate() {
        let mut rule = CommandConfig {
            path: String::new(),
            arguments: String::new(),
            triggers: TriggerSet::CREATE,
        };
        assert!(rule.validate().is_err());
        rule.path = "echo".to_string();
        assert!(rule.validate().is_ok());
        rule.triggers = TriggerSet::empty();
        assert!(rule.validate().is_err());
    }
}
