use std::fmt;

/// Which side(s) of a diff a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Present on the left only (`-`).
    Removed,
    /// Present on the right only (`+`).
    Added,
    /// Present on both sides (` `).
    Context,
}

impl LineKind {
    pub fn as_char(self) -> char {
        match self {
            LineKind::Removed => '-',
            LineKind::Added => '+',
            LineKind::Context => ' ',
        }
    }

    pub fn from_char(c: char) -> Option<LineKind> {
        match c {
            '-' => Some(LineKind::Removed),
            '+' => Some(LineKind::Added),
            ' ' => Some(LineKind::Context),
            _ => None,
        }
    }

    pub fn inverse(self) -> LineKind {
        match self {
            LineKind::Removed => LineKind::Added,
            LineKind::Added => LineKind::Removed,
            LineKind::Context => LineKind::Context,
        }
    }
}

/// One signed row of a hunk. `content` carries its trailing newline
/// verbatim; a missing trailing newline is a legal value and is what the
/// `\ No newline at end of file` directive round-trips through.
#[derive(Debug, Clone)]
pub struct Line {
    pub kind: LineKind,
    pub content: String,
}

impl Line {
    pub fn new(kind: LineKind, content: impl Into<String>) -> Line {
        Line {
            kind,
            content: content.into(),
        }
    }

    pub fn context(content: impl Into<String>) -> Line {
        Line::new(LineKind::Context, content)
    }

    pub fn inverse(&self) -> Line {
        Line::new(self.kind.inverse(), self.content.clone())
    }

    pub fn is_left(&self) -> bool {
        matches!(self.kind, LineKind::Removed | LineKind::Context)
    }

    pub fn is_right(&self) -> bool {
        matches!(self.kind, LineKind::Added | LineKind::Context)
    }

    pub fn is_both(&self) -> bool {
        self.kind == LineKind::Context
    }

    /// Kind-sensitive comparison, for callers that need to locate a
    /// specific line rather than decide algebraic sameness.
    pub fn same_text_and_kind(&self, other: &Line) -> bool {
        self.kind == other.kind && self.content == other.content
    }

    /// One-line rendering without the trailing newline.
    pub fn headline(&self) -> String {
        format!("{}{}", self.kind.as_char(), self.content.trim_end_matches('\n'))
    }
}

/// Equality is the algebraic identity: two lines are the same line iff
/// their text matches, whatever their sign. Composition and rebase rely
/// on this to recognize the two halves of a change.
impl PartialEq for Line {
    fn eq(&self, other: &Line) -> bool {
        self.content == other.content
    }
}

impl Eq for Line {}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.content.ends_with('\n') {
            write!(f, "{}{}", self.kind.as_char(), self.content)
        } else {
            write!(
                f,
                "{}{}\n\\ No newline at end of file",
                self.kind.as_char(),
                self.content
            )
        }
    }
}
