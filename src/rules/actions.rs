//! File actions (copy, move, delete) run in response to a change.

use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::placeholders;
use crate::error::ActionError;
use crate::watcher::{Change, TriggerSet};
use crate::Result;

/// Kind of file action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Copy the source to the destination.
    Copy,
    /// Move the source to the destination.
    Move,
    /// Delete the source.
    Delete,
}

impl ActionKind {
    fn past_tense(self) -> &'static str {
        match self {
            Self::Copy => "Copied",
            Self::Move => "Moved",
            Self::Delete => "Deleted",
        }
    }
}

fn default_source() -> String {
    "[fullpath]".to_string()
}

/// Declared action rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    /// Action to perform.
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Source template.
    #[serde(default = "default_source")]
    pub source: String,
    /// Destination template (copy and move only).
    #[serde(default)]
    pub destination: Option<String>,
    /// Triggers that run this action.
    pub triggers: TriggerSet,
    /// Compare content after copying.
    #[serde(default)]
    pub verify: bool,
    /// Preserve source timestamps on the destination.
    #[serde(default)]
    pub keep_timestamps: bool,
}

impl ActionConfig {
    /// Validate the rule.
    ///
    /// # Errors
    ///
    /// Returns an error if a copy or move has no destination.
    pub fn validate(&self) -> Result<()> {
        if self.kind != ActionKind::Delete
            && self.destination.as_deref().map_or(true, |d| d.trim().is_empty())
        {
            return Err(crate::Error::config(format!(
                "{:?} action requires a destination",
                self.kind
            )));
        }

        if self.triggers.is_empty() {
            return Err(crate::Error::config("action requires at least one trigger"));
        }

        Ok(())
    }

    /// Run the action for `change` if it subscribes to the change's trigger.
    ///
    /// Returns `Ok(false)` when the trigger is not subscribed or the source
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file operation fails.
    pub fn run(
        &self,
        executor: &dyn ActionExecutor,
        watch_path: &Path,
        change: &Change,
    ) -> std::result::Result<bool, ActionError> {
        if !self.triggers.includes(change.trigger) {
            return Ok(false);
        }

        let source = PathBuf::from(placeholders::resolve(
            &self.source,
            watch_path,
            &change.full_path,
        ));
        let destination = self
            .destination
            .as_deref()
            .map(|d| PathBuf::from(placeholders::resolve(d, watch_path, &change.full_path)));

        if !source.exists() {
            tracing::error!(
                source = %source.display(),
                kind = ?self.kind,
                "Action source does not exist, skipping"
            );
            return Ok(false);
        }

        match (self.kind, destination) {
            (ActionKind::Copy, Some(dest)) => {
                executor.copy(&source, &dest, self.verify, self.keep_timestamps)?;
                log_done(self, &source, Some(&dest));
            }
            (ActionKind::Move, Some(dest)) => {
                executor.move_file(&source, &dest, self.verify, self.keep_timestamps)?;
                log_done(self, &source, Some(&dest));
            }
            (ActionKind::Delete, _) => {
                executor.delete(&source)?;
                log_done(self, &source, None);
            }
            (_, None) => {
                tracing::error!(source = %source.display(), kind = ?self.kind, "Action has no destination");
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn log_done(action: &ActionConfig, source: &Path, destination: Option<&Path>) {
    tracing::info!(
        source = %source.display(),
        destination = ?destination,
        verify = action.verify,
        keep_timestamps = action.keep_timestamps,
        "{}",
        action.kind.past_tense()
    );
}

/// File primitives used by actions.
pub trait ActionExecutor: Send + Sync {
    /// Copy `src` to `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy or verification fails.
    fn copy(
        &self,
        src: &Path,
        dst: &Path,
        verify: bool,
        keep_timestamps: bool,
    ) -> std::result::Result<(), ActionError>;

    /// Move `src` to `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if the move fails.
    fn move_file(
        &self,
        src: &Path,
        dst: &Path,
        verify: bool,
        keep_timestamps: bool,
    ) -> std::result::Result<(), ActionError>;

    /// Delete `src`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, src: &Path) -> std::result::Result<(), ActionError>;
}

/// Executor operating on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsActionExecutor;

impl FsActionExecutor {
    fn copy_inner(
        src: &Path,
        dst: &Path,
        verify: bool,
        keep_timestamps: bool,
    ) -> std::io::Result<bool> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;

        if keep_timestamps {
            let meta = fs::metadata(src)?;
            let mut times = FileTimes::new().set_modified(meta.modified()?);
            if let Ok(accessed) = meta.accessed() {
                times = times.set_accessed(accessed);
            }
            File::options().write(true).open(dst)?.set_times(times)?;
        }

        if verify {
            return Ok(digest(src)? == digest(dst)?);
        }

        Ok(true)
    }
}

fn digest(path: &Path) -> std::io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_reader(File::open(path)?)?;
    Ok(hasher.finalize())
}

impl ActionExecutor for FsActionExecutor {
    fn copy(
        &self,
        src: &Path,
        dst: &Path,
        verify: bool,
        keep_timestamps: bool,
    ) -> std::result::Result<(), ActionError> {
        let same = Self::copy_inner(src, dst, verify, keep_timestamps).map_err(|e| {
            ActionError::Copy {
                from: src.to_path_buf(),
                to: dst.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        if same {
            Ok(())
        } else {
            Err(ActionError::Verify {
                from: src.to_path_buf(),
                to: dst.to_path_buf(),
            })
        }
    }

    fn move_file(
        &self,
        src: &Path,
        dst: &Path,
        verify: bool,
        keep_timestamps: bool,
    ) -> std::result::Result<(), ActionError> {
        let move_err = |e: std::io::Error| ActionError::Move {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            reason: e.to_string(),
        };

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(move_err)?;
        }

        if fs::rename(src, dst).is_ok() {
            return Ok(());
        }

        // Rename fails across filesystems.
        self.copy(src, dst, verify, keep_timestamps)?;
        fs::remove_file(src).map_err(move_err)
    }

    fn delete(&self, src: &Path) -> std::result::Result<(), ActionError> {
        let result = if src.is_dir() {
            fs::remove_dir(src)
        } else {
            fs::remove_file(src)
        };

        result.map_err(|e| ActionError::Delete {
            path: src.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::Trigger;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn action(kind: ActionKind, destination: Option<&str>) -> ActionConfig {
        ActionConfig {
            kind,
            source: default_source(),
            destination: destination.map(String::from),
            triggers: TriggerSet::CREATE | TriggerSet::CHANGE,
            verify: true,
            keep_timestamps: false,
        }
    }

    #[test]
    fn test_copy_to_resolved_destination() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("file.txt"), "hello").unwrap();

        let dest = format!("{}/backup/[name]", tmp.path().display());
        let rule = action(ActionKind::Copy, Some(&dest));
        let change = Change::new(Trigger::Create, data.join("file.txt"));

        let ran = rule.run(&FsActionExecutor, &data, &change).unwrap();
        assert!(ran);
        assert_eq!(
            fs::read_to_string(tmp.path().join("backup/file.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_unsubscribed_trigger_does_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "x").unwrap();
        let rule = action(ActionKind::Delete, None);
        let change = Change::new(Trigger::Rename, tmp.path().join("a.txt"));

        assert!(!rule.run(&FsActionExecutor, tmp.path(), &change).unwrap());
        assert!(tmp.path().join("a.txt").exists());
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let rule = action(ActionKind::Delete, None);
        let change = Change::new(Trigger::Change, tmp.path().join("gone.txt"));

        assert!(!rule.run(&FsActionExecutor, tmp.path(), &change).unwrap());
    }

    #[test]
    fn test_move_and_delete() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        let dst = tmp.path().join("out/a.txt");
        fs::write(&src, "x").unwrap();

        FsActionExecutor.move_file(&src, &dst, false, false).unwrap();
        assert!(!src.exists());
        assert!(dst.exists());

        FsActionExecutor.delete(&dst).unwrap();
        assert!(!dst.exists());
    }

    #[test]
    fn test_copy_keeps_timestamps() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        let dst = tmp.path().join("b.txt");
        fs::write(&src, "x").unwrap();

        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(old)
            .unwrap();

        FsActionExecutor.copy(&src, &dst, true, true).unwrap();
        assert_eq!(fs::metadata(&dst).unwrap().modified().unwrap(), old);
    }

    #[test]
    fn test_digest_streams_large_file() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("big.bin");
        let dst = tmp.path().join("copy/big.bin");
        let contents: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        fs::write(&src, &contents).unwrap();

        assert_eq!(digest(&src).unwrap(), blake3::hash(&contents));

        FsActionExecutor.copy(&src, &dst, true, false).unwrap();
        assert_eq!(digest(&dst).unwrap(), digest(&src).unwrap());

        fs::write(&dst, &contents[1..]).unwrap();
        assert_ne!(digest(&dst).unwrap(), digest(&src).unwrap());
    }

    #[test]
    fn test_validate_requires_destination() {
        assert!(action(ActionKind::Copy, None).validate().is_err());
        assert!(action(ActionKind::Move, Some("  ")).validate().is_err());
        assert!(action(ActionKind::Copy, Some("/b/[name]")).validate().is_ok());
        assert!(action(ActionKind::Delete, None).validate().is_ok());
    }

    #[test]
    fn test_deserialize_defaults() {
        let rule: ActionConfig = toml::from_str(
            r#"
            type = "copy"
            destination = "/backup/[name]"
            triggers = ["create"]
            "#,
        )
        .unwrap();

        assert_eq!(rule.kind, ActionKind::Copy);
        assert_eq!(rule.source, "[fullpath]");
        assert!(!rule.verify);
        assert!(rule.triggers.includes(Trigger::Create));
    }
}
