//! Status-line grammars
//!
//! Every status-like query runs a status-producing command and keeps the
//! lines whose status letter is in an allowed set. The line shapes live here
//! so a change in tool output touches one place per backend.

use cq_core::{ChangeKind, Result, StatusEntry};
use regex::Regex;

/// Which tool produced the status lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDialect {
    /// Fixed-width status columns, then a space and the filename
    Svn,
    /// `<letter>\t<filename>` as printed by `git diff --name-status`
    Git,
}

impl StatusDialect {
    fn change_kind(self, status: char) -> ChangeKind {
        match (self, status) {
            (_, 'A') => ChangeKind::Added,
            (_, 'D') => ChangeKind::Deleted,
            (Self::Svn, 'C') | (Self::Git, 'U') => ChangeKind::Conflicted,
            _ => ChangeKind::Modified,
        }
    }
}

/// A compiled line pattern restricted to a set of status letters
#[derive(Debug, Clone)]
pub struct StatusGrammar {
    dialect: StatusDialect,
    regex: Regex,
}

impl StatusGrammar {
    /// Grammar for `svn status` / `svn diff --summarize`
    ///
    /// svn 1.6 added a tree-conflict column, so the number of fixed columns
    /// after the status letter depends on the tool version.
    pub fn svn(expected_types: &str, svn_version: &str) -> Result<Self> {
        let field_count = svn_status_field_count(svn_version);
        let regex = Regex::new(&format!(
            r"^(?P<status>[{}]).{{{}}} (?P<filename>.+)$",
            regex::escape(expected_types),
            field_count
        ))?;
        Ok(Self {
            dialect: StatusDialect::Svn,
            regex,
        })
    }

    /// Grammar for `git diff --name-status`
    pub fn git(expected_types: &str) -> Result<Self> {
        let regex = Regex::new(&format!(
            r"^(?P<status>[{}])\t(?P<filename>.+)$",
            regex::escape(expected_types)
        ))?;
        Ok(Self {
            dialect: StatusDialect::Git,
            regex,
        })
    }

    pub fn dialect(&self) -> StatusDialect {
        self.dialect
    }

    /// Matching entries in the order the tool printed them
    pub fn entries(&self, output: &str) -> Vec<StatusEntry> {
        output
            .lines()
            .filter_map(|line| self.regex.captures(line))
            .filter_map(|captures| {
                let status = captures.name("status")?.as_str().chars().next()?;
                let filename = captures.name("filename")?.as_str();
                Some(StatusEntry::new(self.dialect.change_kind(status), filename))
            })
            .collect()
    }

    /// Just the filenames of [`StatusGrammar::entries`]
    pub fn filenames(&self, output: &str) -> Vec<String> {
        self.entries(output)
            .into_iter()
            .map(|entry| entry.path)
            .collect()
    }
}

/// Number of fixed columns between the status letter and the filename
fn svn_status_field_count(svn_version: &str) -> usize {
    let mut parts = svn_version
        .trim()
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u32>().unwrap_or(0));

    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) if (major, minor) < (1, 6) => 5,
        (Some(major), None) if major < 1 => 5,
        _ => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVN_16_STATUS: &str = "\
A       WebCore/html/HTMLMeterElement.cpp
M       WebCore/ChangeLog
D       WebCore/html/Obsolete.h
C       WebCore/dom/Node.cpp
?       scratch.txt
A  +    LayoutTests/fast/forms/meter.html
";

    #[test]
    fn test_svn_field_count_by_version() {
        assert_eq!(svn_status_field_count("1.5.4"), 5);
        assert_eq!(svn_status_field_count("1.6.17\n"), 6);
        assert_eq!(svn_status_field_count("1.10.0"), 6);
        assert_eq!(svn_status_field_count("1.14.2 (r1899510)"), 6);
        assert_eq!(svn_status_field_count(""), 6);
    }

    #[test]
    fn test_added_filter_preserves_order() {
        let grammar = StatusGrammar::svn("A", "1.6.17").unwrap();
        assert_eq!(
            grammar.filenames(SVN_16_STATUS),
            vec![
                "WebCore/html/HTMLMeterElement.cpp",
                "LayoutTests/fast/forms/meter.html"
            ]
        );
    }

    #[test]
    fn test_changed_set_maps_kinds() {
        let grammar = StatusGrammar::svn("ACDMR", "1.6.17").unwrap();
        let entries = grammar.entries(SVN_16_STATUS);
        assert_eq!(
            entries,
            vec![
                StatusEntry::new(ChangeKind::Added, "WebCore/html/HTMLMeterElement.cpp"),
                StatusEntry::new(ChangeKind::Modified, "WebCore/ChangeLog"),
                StatusEntry::new(ChangeKind::Deleted, "WebCore/html/Obsolete.h"),
                StatusEntry::new(ChangeKind::Conflicted, "WebCore/dom/Node.cpp"),
                StatusEntry::new(ChangeKind::Added, "LayoutTests/fast/forms/meter.html"),
            ]
        );
    }

    #[test]
    fn test_svn_15_columns() {
        let output = "A      WebCore/new.cpp\nM      WebCore/old.cpp\n";
        let old = StatusGrammar::svn("A", "1.5.4").unwrap();
        assert_eq!(old.filenames(output), vec!["WebCore/new.cpp"]);

        // Columns are fixed width, so the wrong version matches nothing
        let new = StatusGrammar::svn("A", "1.6.0").unwrap();
        assert!(new.filenames(output).is_empty());
    }

    #[test]
    fn test_git_grammar() {
        let output = "A\tWebKitTools/Scripts/new.py\nM\tWebKitTools/ChangeLog\nD\tgone.txt\nU\tWebCore/dom/Node.cpp\nR100\told.h\tnew.h\n";

        let added = StatusGrammar::git("A").unwrap();
        assert_eq!(added.filenames(output), vec!["WebKitTools/Scripts/new.py"]);

        let changed = StatusGrammar::git("ADM").unwrap();
        assert_eq!(
            changed.filenames(output),
            vec!["WebKitTools/Scripts/new.py", "WebKitTools/ChangeLog", "gone.txt"]
        );

        let conflicted = StatusGrammar::git("U").unwrap();
        assert_eq!(
            conflicted.entries(output),
            vec![StatusEntry::new(ChangeKind::Conflicted, "WebCore/dom/Node.cpp")]
        );
    }

    #[test]
    fn test_filenames_with_spaces() {
        let grammar = StatusGrammar::git("M").unwrap();
        assert_eq!(
            grammar.filenames("M\tLayoutTests/a b.html\n"),
            vec!["LayoutTests/a b.html"]
        );
    }
}
