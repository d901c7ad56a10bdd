//! Filter and exclusion matching with gitignore-style globs.

use std::path::{Component, Path};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::Deserialize;

use crate::Result;

/// Predicate deciding whether a changed item matches a rule set.
pub trait PathMatcher: Send + Sync {
    /// Check if the item at `full_path` (named `name`, inside `directory`) matches.
    fn matches(&self, directory: &Path, name: &str, full_path: &Path) -> bool;
}

/// Declared match patterns for filters and exclusions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    /// Glob patterns matched against the file or folder name.
    #[serde(default)]
    pub files: Vec<String>,
    /// Glob patterns matched against each folder in the item's directory.
    #[serde(default)]
    pub folders: Vec<String>,
    /// Glob patterns matched against the full path.
    #[serde(default)]
    pub paths: Vec<String>,
}

impl MatchConfig {
    /// True when at least one pattern is declared.
    #[must_use]
    pub fn is_specified(&self) -> bool {
        !(self.files.is_empty() && self.folders.is_empty() && self.paths.is_empty())
    }
}

/// Compiled match rules.
#[derive(Debug)]
pub struct MatchRules {
    files: Option<Gitignore>,
    folders: Option<Gitignore>,
    paths: Option<Gitignore>,
}

impl MatchRules {
    /// Compile declared patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid.
    pub fn new(config: &MatchConfig) -> Result<Self> {
        Ok(Self {
            files: build(Path::new(""), &config.files)?,
            folders: build(Path::new(""), &config.folders)?,
            paths: build(Path::new("/"), &config.paths)?,
        })
    }

    fn name_matches(gi: Option<&Gitignore>, name: &str, is_dir: bool) -> bool {
        gi.is_some_and(|gi| gi.matched(Path::new(name), is_dir).is_ignore())
    }
}

impl PathMatcher for MatchRules {
    fn matches(&self, directory: &Path, name: &str, full_path: &Path) -> bool {
        if Self::name_matches(self.files.as_ref(), name, false) {
            return true;
        }

        let folder_hit = directory.components().any(|c| match c {
            Component::Normal(folder) => {
                Self::name_matches(self.folders.as_ref(), &folder.to_string_lossy(), true)
            }
            _ => false,
        });
        if folder_hit {
            return true;
        }

        self.paths
            .as_ref()
            .is_some_and(|gi| gi.matched(full_path, false).is_ignore())
    }
}

/// Build a matcher for `patterns`, or `None` if there are none.
fn build(root: &Path, patterns: &[String]) -> Result<Option<Gitignore>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| crate::Error::config(format!("invalid pattern '{pattern}': {e}")))?;
    }

    let gitignore = builder
        .build()
        .map_err(|e| crate::Error::config(format!("failed to build matcher: {e}")))?;

    Ok(Some(gitignore))
}
