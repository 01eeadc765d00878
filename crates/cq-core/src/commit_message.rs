//! Commit message parsing
//!
//! Commit messages are assembled from one or more ChangeLog-style entries.
//! The first non-blank line is the one-line description; everything after the
//! blank separator is the body.

use regex::Regex;
use std::sync::LazyLock;

static LEADING_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)<.+> ").expect("static regex"));

/// Index of the first non-blank line at or after `index`
fn first_non_empty_line_after_index(lines: &[String], index: usize) -> usize {
    index
        + lines
            .iter()
            .skip(index)
            .take_while(|line| line.trim().is_empty())
            .count()
}

/// A parsed commit message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    message_lines: Vec<String>,
}

impl CommitMessage {
    /// Build a message from its lines, dropping leading blank lines
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        let start = first_non_empty_line_after_index(&lines, 0);
        Self {
            message_lines: lines.into_iter().skip(start).collect(),
        }
    }

    /// Split `text` on line boundaries and parse it
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines())
    }

    pub fn lines(&self) -> &[String] {
        &self.message_lines
    }

    /// First non-blank line, or an empty string for an all-blank message
    ///
    /// `strip_url` removes a leading `<http://...> ` bug link while keeping
    /// any indentation in front of it.
    pub fn description(&self, lstrip: bool, strip_url: bool) -> String {
        let mut line = self
            .message_lines
            .first()
            .map(String::as_str)
            .unwrap_or_default()
            .to_string();
        if lstrip {
            line = line.trim_start().to_string();
        }
        if strip_url {
            line = LEADING_URL.replace(&line, "${1}").into_owned();
        }
        line
    }

    /// Everything after the description and its blank separator
    ///
    /// Trailing blank lines are dropped; the result always ends with `\n`.
    pub fn body(&self, lstrip: bool) -> String {
        let start = first_non_empty_line_after_index(&self.message_lines, 1);
        let mut lines: Vec<&str> = self
            .message_lines
            .get(start..)
            .unwrap_or_default()
            .iter()
            .map(String::as_str)
            .collect();
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        if lstrip {
            lines = lines.into_iter().map(str::trim_start).collect();
        }
        format!("{}\n", lines.join("\n"))
    }

    /// The full message, one line per retained input line
    pub fn message(&self) -> String {
        format!("{}\n", self.message_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_and_body() {
        let message = CommitMessage::new(["", "Fix bug", "", "Longer description.", ""]);
        assert_eq!(message.description(false, false), "Fix bug");
        assert_eq!(message.body(false), "Longer description.\n");
    }

    #[test]
    fn test_message_round_trip_drops_only_leading_blanks() {
        let message = CommitMessage::new(["", "", "Fix bug", "", "Longer description.", ""]);
        assert_eq!(message.message(), "Fix bug\n\nLonger description.\n\n");
        assert_eq!(
            CommitMessage::from_text(&message.message()).message(),
            message.message()
        );
    }

    #[test]
    fn test_all_blank_message_degrades() {
        let message = CommitMessage::new(["", "   ", "\t"]);
        assert_eq!(message.description(true, true), "");
        assert_eq!(message.body(true), "\n");
        assert_eq!(message.message(), "\n");

        let empty = CommitMessage::new(Vec::<String>::new());
        assert_eq!(empty.description(false, false), "");
        assert_eq!(empty.body(false), "\n");
    }

    #[test]
    fn test_strip_url_keeps_indentation() {
        let message = CommitMessage::new([
            "        <https://bugs.webkit.org/show_bug.cgi?id=31776> Crash in layout",
            "",
            "        Reviewed by Darin Adler.",
        ]);
        assert_eq!(
            message.description(false, true),
            "        Crash in layout"
        );
        assert_eq!(message.description(true, true), "Crash in layout");
        assert_eq!(
            message.description(true, false),
            "<https://bugs.webkit.org/show_bug.cgi?id=31776> Crash in layout"
        );
    }

    #[test]
    fn test_body_lstrip() {
        let message = CommitMessage::from_text(
            "2009-11-20  Eric Seidel  <eric@webkit.org>\n\n        Reviewed by Adam Barth.\n\n        * Scripts/foo.py:\n",
        );
        assert_eq!(
            message.body(true),
            "Reviewed by Adam Barth.\n\n* Scripts/foo.py:\n"
        );
        assert_eq!(
            message.body(false),
            "        Reviewed by Adam Barth.\n\n        * Scripts/foo.py:\n"
        );
    }
}
