//! Rule collaborators applied to each change.
//!
//! This module provides:
//! - Filter and exclusion predicates
//! - Placeholder substitution
//! - File actions (copy, move, delete)
//! - External commands

mod actions;
mod commands;
mod filter;
pub mod placeholders;

pub use actions::{ActionConfig, ActionExecutor, ActionKind, FsActionExecutor};
pub use commands::{CommandConfig, CommandRunner, ProcessCommandRunner};
pub use filter::{MatchConfig, MatchRules, PathMatcher};
