use std::path::PathBuf;

use thiserror::Error;

use crate::hunk::Hunk;
use crate::line::Line;

/// Payload of a same-line conflict: both hunks and the two lines that
/// could not be reconciled, so conflict extraction can relocate the
/// offending hunk.
#[derive(Debug, Clone)]
pub struct LineConflict {
    pub left_hunk: Hunk,
    pub right_hunk: Hunk,
    pub left_line: Option<Line>,
    pub right_line: Option<Line>,
}

impl LineConflict {
    pub fn boxed(
        left_hunk: Option<&Hunk>,
        right_hunk: Option<&Hunk>,
        left_line: Option<&Line>,
        right_line: Option<&Line>,
    ) -> Box<LineConflict> {
        Box::new(LineConflict {
            left_hunk: left_hunk.cloned().unwrap_or_else(|| Hunk::new(0, 0)),
            right_hunk: right_hunk.cloned().unwrap_or_else(|| Hunk::new(0, 0)),
            left_line: left_line.cloned(),
            right_line: right_line.cloned(),
        })
    }

    fn describe_line(line: &Option<Line>) -> String {
        match line {
            Some(l) => l.headline(),
            None => "(absent)".to_string(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} / {}",
            Self::describe_line(&self.left_line),
            Self::describe_line(&self.right_line)
        )
    }
}

#[derive(Error, Debug)]
pub enum PatError {
    #[error("Cannot read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config at '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    #[error("Cannot run editor '{command}': {source}")]
    Editor {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot start the interactive prompt: {message}")]
    Prompt { message: String },

    #[error("Malformed patch: {message}")]
    Parse { message: String },

    #[error("Unsupported patch line: {line:?}")]
    UnsupportedLine { line: String },

    #[error("Filenames do not chain: '{left}' vs '{right}'")]
    MismatchedFilename { left: String, right: String },

    #[error("Hunk ranges overlap or are out of order")]
    DisjointHunk,

    #[error("Line {line} does not identify exactly one diff")]
    AmbiguousLineNumber { line: usize },

    #[error("Both patches change the same line: {}", .conflict.summary())]
    ChangeToSameLine { conflict: Box<LineConflict> },

    #[error("Patches disagree about a line's content: {}", .conflict.summary())]
    IncompatibleChangeToSameLine { conflict: Box<LineConflict> },

    #[error("Cannot reconcile the rename of '{name}'")]
    IncompatibleFileRename { name: String },

    #[error("No patch at index {index}")]
    BadIndex { index: usize },

    #[error("{0}")]
    Usage(String),
}

impl PatError {
    /// Whether this error is one of the two same-line conflict flavors,
    /// the ones conflict extraction knows how to isolate.
    pub fn is_line_conflict(&self) -> bool {
        matches!(
            self,
            PatError::ChangeToSameLine { .. } | PatError::IncompatibleChangeToSameLine { .. }
        )
    }

    /// Takes the conflict payload out of a same-line conflict error.
    pub fn into_line_conflict(self) -> std::result::Result<Box<LineConflict>, PatError> {
        match self {
            PatError::ChangeToSameLine { conflict }
            | PatError::IncompatibleChangeToSameLine { conflict } => Ok(conflict),
            other => Err(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PatError>;

/// Exit codes for patstack.
/// 0  = success
/// 1  = I/O error
/// 2  = parse / config / usage error
/// 10 = self-test failures
pub mod exit_code {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const IO_ERROR: i32 = 1;
    pub const USAGE_ERROR: i32 = 2;
    pub const TEST_FAILURES: i32 = 10;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::LineKind;

    #[test]
    fn conflict_payload_round_trips() {
        let hunk = Hunk::new(19, 19);
        let line = Line::new(LineKind::Added, "dog\n");
        let err = PatError::ChangeToSameLine {
            conflict: LineConflict::boxed(Some(&hunk), Some(&hunk), Some(&line), None),
        };
        assert!(err.is_line_conflict());
        let conflict = err.into_line_conflict().expect("payload");
        assert_eq!(conflict.left_hunk.lstart, 19);
        assert_eq!(conflict.left_line.as_ref().map(|l| l.content.as_str()), Some("dog\n"));
    }

    #[test]
    fn non_conflict_errors_pass_through() {
        let err = PatError::DisjointHunk;
        assert!(!err.is_line_conflict());
        assert!(err.into_line_conflict().is_err());
    }

    #[test]
    fn messages_name_the_failing_parts() {
        let err = PatError::MismatchedFilename {
            left: "foo".into(),
            right: "bar".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("foo") && msg.contains("bar"), "got: {msg}");
    }
}
