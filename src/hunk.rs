use std::cmp::Ordering;
use std::fmt;

use crate::iter::HunkPairs;
use crate::line::{Line, LineKind};

/// How many context lines shrinkwrap keeps on each end of a hunk.
pub const CONTEXT_LIMIT: usize = 3;

/// A contiguous local edit within one file. `lstart`/`rstart` are the
/// 1-based numbers of the first left/right line the hunk touches; the
/// stop lines are derived from the line list.
#[derive(Debug, Clone)]
pub struct Hunk {
    pub lstart: usize,
    pub rstart: usize,
    pub lines: Vec<Line>,
}

impl Hunk {
    pub fn new(lstart: usize, rstart: usize) -> Hunk {
        Hunk {
            lstart,
            rstart,
            lines: Vec::new(),
        }
    }

    pub fn with_lines(lstart: usize, rstart: usize, lines: Vec<Line>) -> Hunk {
        let mut hunk = Hunk {
            lstart,
            rstart,
            lines,
        };
        hunk.normalize();
        hunk
    }

    pub fn num_left_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.is_left()).count()
    }

    pub fn num_right_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.is_right()).count()
    }

    pub fn lstop(&self) -> usize {
        self.lstart + self.num_left_lines()
    }

    pub fn rstop(&self) -> usize {
        self.rstart + self.num_right_lines()
    }

    pub fn stops(&self) -> (usize, usize) {
        (self.lstop(), self.rstop())
    }

    /// A hunk is the identity when every line is context.
    pub fn is_identity(&self) -> bool {
        self.lines.iter().all(|l| l.is_both())
    }

    /// Rearranges each removal/addition cluster so the removals come
    /// first; context lines keep their positions.
    pub fn normalize(&mut self) {
        let mut buffered: Vec<Line> = Vec::new();
        let mut grouped: Vec<Line> = Vec::with_capacity(self.lines.len());
        for line in self.lines.drain(..) {
            match line.kind {
                LineKind::Removed => grouped.push(line),
                LineKind::Added => buffered.push(line),
                LineKind::Context => {
                    grouped.append(&mut buffered);
                    grouped.push(line);
                }
            }
        }
        grouped.append(&mut buffered);
        self.lines = grouped;
    }

    /// Canonical form: re-emits the lines through the pair iterator
    /// (cancelling removal/addition pairs that carry the same text) and
    /// trims context to at most [`CONTEXT_LIMIT`] lines on each end.
    pub fn shrinkwrapped(&self) -> Hunk {
        let mut result = Hunk::new(self.lstart, self.rstart);
        let mut pairs = HunkPairs::new(self);
        while pairs.more_to_go() {
            result.lines.extend(pairs.pop());
        }
        result.trim_context(CONTEXT_LIMIT);
        result.normalize();
        result
    }

    fn trim_context(&mut self, limit: usize) {
        self.lines.reverse();
        trim_leading_context(&mut self.lines, limit);
        self.lines.reverse();
        let trimmed = trim_leading_context(&mut self.lines, limit);
        self.lstart += trimmed;
        self.rstart += trimmed;
    }

    pub fn inverse(&self) -> Hunk {
        let lines = self.lines.iter().map(Line::inverse).collect();
        Hunk::with_lines(self.rstart, self.lstart, lines)
    }

    /// Places `line` against this hunk's left interval: `Less` when the
    /// hunk lies entirely before the line, `Greater` when entirely after,
    /// `Equal` when the line falls inside.
    pub fn lcmp_line(&self, line: usize) -> Ordering {
        range_cmp(self.lstart, self.lstop(), line)
    }

    /// Compares left intervals; `Equal` means the two overlap.
    pub fn lcmp(&self, other: &Hunk) -> Ordering {
        let at_start = self.lcmp_line(other.lstart);
        let at_stop = self.lcmp_line(other.lstop());
        if at_start == at_stop {
            at_start
        } else {
            Ordering::Equal
        }
    }

    /// Compares this hunk's right interval against `other`'s left
    /// interval, the alignment a rebase cares about: does `other` touch
    /// lines this hunk produces?
    pub fn rlcmp(&self, other: &Hunk) -> Ordering {
        let at_start = other.lcmp_line(self.rstart);
        let at_stop = other.lcmp_line(self.rstop().saturating_sub(1));
        if at_start == at_stop {
            at_start
        } else {
            Ordering::Equal
        }
    }

    /// Structural match: same anchors, same lines with the same signs.
    /// `Line` equality alone is sign-blind, which is too loose for
    /// locating a specific hunk.
    pub fn same_shape(&self, other: &Hunk) -> bool {
        self.lstart == other.lstart
            && self.rstart == other.rstart
            && self.lines.len() == other.lines.len()
            && self
                .lines
                .iter()
                .zip(&other.lines)
                .all(|(a, b)| a.same_text_and_kind(b))
    }

    pub fn headline(&self) -> String {
        format!("@{}", self.lstart)
    }
}

fn range_cmp(start: usize, stop: usize, needle: usize) -> Ordering {
    if needle < start {
        Ordering::Greater
    } else if stop <= needle {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

fn trim_leading_context(lines: &mut Vec<Line>, limit: usize) -> usize {
    let run = lines.iter().take_while(|l| l.is_both()).count();
    if run > limit {
        let excess = run - limit;
        lines.drain(..excess);
        excess
    } else {
        0
    }
}

/// Re-derives each hunk's `rstart` from its `lstart` and the running
/// insertion/deletion offset, restoring the invariant that
/// `h[i].rstart - h[i].lstart == h[i-1].rstop - h[i-1].lstop`.
pub fn fix_right_line_numbers(hunks: &mut [Hunk]) {
    let mut offset: i64 = 0;
    for hunk in hunks {
        hunk.rstart = (hunk.lstart as i64 + offset) as usize;
        hunk.normalize();
        offset = hunk.rstop() as i64 - hunk.lstop() as i64;
    }
}

/// Mirror of [`fix_right_line_numbers`]: re-derives `lstart` from
/// `rstart`.
pub fn fix_left_line_numbers(hunks: &mut [Hunk]) {
    let mut offset: i64 = 0;
    for hunk in hunks {
        hunk.lstart = (hunk.rstart as i64 + offset) as usize;
        hunk.normalize();
        offset = hunk.lstop() as i64 - hunk.rstop() as i64;
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "@@ -{},{} +{},{} @@",
            self.lstart,
            self.num_left_lines(),
            self.rstart,
            self.num_right_lines()
        )?;
        for line in &self.lines {
            write!(f, "{line}")?;
        }
        Ok(())
    }
}
