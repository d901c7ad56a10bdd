//! Placeholder substitution for action, command and message templates.
//!
//! Supported tokens:
//! - `[watchpath]` the watch root
//! - `[exactpath]` directory containing the changed item
//! - `[fullpath]` full path of the changed item
//! - `[path]` directory of the changed item relative to the watch root
//! - `[file]` file name without extension
//! - `[filename]` / `[name]` file name with extension
//! - `[extension]` extension without the dot
//! - `[currentdate:FMT]`, `[modifieddate:FMT]`, `[createddate:FMT]` strftime dates

use std::path::Path;
use std::time::SystemTime;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static DATE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(currentdate|modifieddate|createddate):([^\]]+)\]").unwrap()
});

/// Resolve every placeholder in `template` for a change at `full_path`.
#[must_use]
pub fn resolve(template: &str, watch_path: &Path, full_path: &Path) -> String {
    let exact = full_path.parent().unwrap_or_else(|| Path::new(""));
    let relative = exact.strip_prefix(watch_path).unwrap_or(exact);
    let file_name = lossy(full_path.file_name());
    let stem = lossy(full_path.file_stem());
    let extension = lossy(full_path.extension());

    let resolved = template
        .replace("[watchpath]", &watch_path.display().to_string())
        .replace("[exactpath]", &exact.display().to_string())
        .replace("[fullpath]", &full_path.display().to_string())
        .replace("[path]", &relative.display().to_string())
        .replace("[filename]", &file_name)
        .replace("[name]", &file_name)
        .replace("[file]", &stem)
        .replace("[extension]", &extension);

    resolve_dates(&resolved, full_path)
}

fn lossy(part: Option<&std::ffi::OsStr>) -> String {
    part.map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn resolve_dates(template: &str, full_path: &Path) -> String {
    DATE_TOKEN
        .replace_all(template, |caps: &Captures<'_>| {
            let format = &caps[2];
            let time = match &caps[1] {
                "currentdate" => Some(Local::now()),
                "modifieddate" => file_time(full_path, |m| m.modified()),
                _ => file_time(full_path, |m| m.created()),
            };

            match time {
                Some(time) if is_valid_format(format) => time.format(format).to_string(),
                _ => {
                    tracing::debug!(token = &caps[0], path = %full_path.display(), "Date placeholder left unresolved");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

fn file_time(
    path: &Path,
    pick: impl Fn(&std::fs::Metadata) -> std::io::Result<SystemTime>,
) -> Option<DateTime<Local>> {
    let meta = std::fs::metadata(path).ok()?;
    pick(&meta).ok().map(DateTime::<Local>::from)
}

fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_path_placeholders() {
        let root = Path::new("/data");
        let full = Path::new("/data/reports/q1.csv");

        assert_eq!(resolve("/backup/[name]", root, full), "/backup/q1.csv");
        assert_eq!(resolve("[fullpath]", root, full), "/data/reports/q1.csv");
        assert_eq!(resolve("[exactpath]", root, full), "/data/reports");
        assert_eq!(resolve("/backup/[path]/[file].bak", root, full), "/backup/reports/q1.bak");
        assert_eq!(resolve("[extension]", root, full), "csv");
        assert_eq!(resolve("[watchpath]/x", root, full), "/data/x");
    }

    #[test]
    fn test_unknown_tokens_untouched() {
        let out = resolve("[unknown] [filename]", Path::new("/d"), Path::new("/d/a.txt"));
        assert_eq!(out, "[unknown] a.txt");
    }

    #[test]
    fn test_current_date() {
        let out = resolve("[currentdate:%Y]", Path::new("/d"), Path::new("/d/a.txt"));
        assert_eq!(out, Local::now().format("%Y").to_string());
    }

    #[test]
    fn test_modified_date_of_existing_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        let out = resolve("[modifieddate:%Y-%m-%d]", tmp.path(), &file);
        assert_eq!(out.len(), 10);
        assert!(!out.contains("modifieddate"));
    }

    #[test]
    fn test_modified_date_of_missing_file_left_as_is() {
        let out = resolve(
            "[modifieddate:%Y]",
            Path::new("/nonexistent"),
            Path::new("/nonexistent/a.txt"),
        );
        assert_eq!(out, "[modifieddate:%Y]");
    }

    #[test]
    fn test_invalid_date_format_left_as_is() {
        let out = resolve("[currentdate:%Q%]", Path::new("/d"), Path::new("/d/a.txt"));
        assert_eq!(out, "[currentdate:%Q%]");
    }
}
