//! ChangeLog parsing
//!
//! Every change carries an entry at the top of the nearest `ChangeLog` file.
//! An entry starts with a `YYYY-MM-DD  Name  <email>` line and runs until the
//! next such line.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static DATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<date>\d{4}-\d{2}-\d{2})\s+(?P<name>.+?)\s+<(?P<email>[^<>]+)>$")
        .expect("static regex")
});

/// Whether `path` names a ChangeLog file called `file_name`
pub fn is_path_to_changelog(path: &str, file_name: &str) -> bool {
    Path::new(path)
        .file_name()
        .is_some_and(|name| name == file_name)
}

/// The topmost entry of a ChangeLog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLogEntry {
    pub date: String,
    pub author_name: String,
    pub author_email: String,
    contents: String,
}

impl ChangeLogEntry {
    /// The entry text, date line included, each line newline-terminated
    pub fn contents(&self) -> &str {
        &self.contents
    }
}

/// Parse the latest entry out of ChangeLog text
///
/// Returns `None` when no date line is found.
pub fn latest_entry(text: &str) -> Option<ChangeLogEntry> {
    let mut lines = text.lines();

    let (date, author_name, author_email, first_line) = lines.by_ref().find_map(|line| {
        let captures = DATE_LINE.captures(line)?;
        Some((
            captures["date"].to_string(),
            captures["name"].to_string(),
            captures["email"].to_string(),
            line,
        ))
    })?;

    let mut contents = format!("{}\n", first_line);
    for line in lines.take_while(|line| !DATE_LINE.is_match(line)) {
        contents.push_str(line);
        contents.push('\n');
    }

    Some(ChangeLogEntry {
        date,
        author_name,
        author_email,
        contents,
    })
}
