//! Line-pair iterators over hunks and diffs.
//!
//! Composition and rebase both walk two diffs as merged streams of
//! (left line, right line) pairs keyed by the next line on each side.
//! A pure deletion yields a pair with no right half, a pure insertion a
//! pair with no left half, and a context or changed line yields both.

use crate::diff::Diff;
use crate::hunk::Hunk;
use crate::line::{Line, LineKind};

/// Pair iterator over one hunk. The two sides are kept as stacks popped
/// from the front; `line_number1`/`line_number2` track the line numbers
/// of the current top pair.
pub struct HunkPairs<'a> {
    line_number1: usize,
    line_number2: usize,
    lines1: Vec<&'a Line>,
    lines2: Vec<&'a Line>,
}

impl<'a> HunkPairs<'a> {
    pub fn new(hunk: &'a Hunk) -> HunkPairs<'a> {
        let mut lines1: Vec<&Line> = hunk.lines.iter().filter(|l| l.is_left()).collect();
        let mut lines2: Vec<&Line> = hunk.lines.iter().filter(|l| l.is_right()).collect();
        lines1.reverse();
        lines2.reverse();
        HunkPairs {
            line_number1: hunk.lstart,
            line_number2: hunk.rstart,
            lines1,
            lines2,
        }
    }

    pub fn line_numbers(&self) -> (usize, usize) {
        (self.line_number1, self.line_number2)
    }

    /// Peeks the next pair. When a removal faces something other than an
    /// addition the right half is suppressed (pure deletion), and
    /// symmetrically for a pure insertion.
    pub fn top_pair(&self) -> (Option<&'a Line>, Option<&'a Line>) {
        let mut line1 = self.lines1.last().copied();
        let mut line2 = self.lines2.last().copied();
        if let (Some(l1), Some(l2)) = (line1, line2) {
            if l1.kind == LineKind::Removed && l2.kind != LineKind::Added {
                line2 = None;
            } else if l2.kind == LineKind::Added && l1.kind != LineKind::Removed {
                line1 = None;
            }
        }
        (line1, line2)
    }

    /// Pops the side(s) present in the top pair. Each cursor then
    /// advances iff the *new* top pair still exposes that side; the
    /// merge-join in compose/over depends on exactly this rule.
    pub fn pop_pair(&mut self) -> (Option<&'a Line>, Option<&'a Line>) {
        let (line1, line2) = self.top_pair();
        if line1.is_some() {
            self.lines1.pop();
        }
        if line2.is_some() {
            self.lines2.pop();
        }
        let (next1, next2) = self.top_pair();
        if next1.is_some() {
            self.line_number1 += 1;
        }
        if next2.is_some() {
            self.line_number2 += 1;
        }
        (line1, line2)
    }

    /// Pops and renders the pair as lines suitable for appending to a
    /// hunk: a pair carrying the same text twice collapses to a single
    /// context line.
    pub fn pop(&mut self) -> Vec<Line> {
        match self.pop_pair() {
            (Some(l1), Some(l2)) if l1 == l2 => {
                if l2.is_both() {
                    vec![l2.clone()]
                } else {
                    vec![Line::context(l2.content.clone())]
                }
            }
            (l1, l2) => l1.into_iter().chain(l2).cloned().collect(),
        }
    }

    pub fn more_to_go(&self) -> bool {
        !self.lines1.is_empty() || !self.lines2.is_empty()
    }
}

/// Pair iterator over a whole diff: a cursor over the hunk sequence that
/// advances to the next hunk when the current one is exhausted.
pub struct DiffPairs<'a> {
    pending: Vec<&'a Hunk>,
    current: Option<(&'a Hunk, HunkPairs<'a>)>,
}

impl<'a> DiffPairs<'a> {
    pub fn new(diff: &'a Diff) -> DiffPairs<'a> {
        let mut pending: Vec<&Hunk> = diff.hunks.iter().collect();
        pending.reverse();
        let mut pairs = DiffPairs {
            pending,
            current: None,
        };
        pairs.advance_hunk();
        pairs
    }

    fn advance_hunk(&mut self) {
        // Line-less hunks (anchors stranded by a gap jump) yield no
        // pairs; skip them so the cursor always sits on a real pair.
        self.current = None;
        while let Some(hunk) = self.pending.pop() {
            let pairs = HunkPairs::new(hunk);
            if pairs.more_to_go() {
                self.current = Some((hunk, pairs));
                break;
            }
        }
    }

    pub fn current_hunk(&self) -> Option<&'a Hunk> {
        self.current.as_ref().map(|(hunk, _)| *hunk)
    }

    pub fn line_numbers(&self) -> Option<(usize, usize)> {
        self.current.as_ref().map(|(_, pairs)| pairs.line_numbers())
    }

    pub fn top_pair(&self) -> (Option<&'a Line>, Option<&'a Line>) {
        match &self.current {
            Some((_, pairs)) => pairs.top_pair(),
            None => (None, None),
        }
    }

    pub fn pop_pair(&mut self) -> (Option<&'a Line>, Option<&'a Line>) {
        let popped = match &mut self.current {
            Some((_, pairs)) => pairs.pop_pair(),
            None => (None, None),
        };
        if self.current.as_ref().is_some_and(|(_, p)| !p.more_to_go()) {
            self.advance_hunk();
        }
        popped
    }

    pub fn pop(&mut self) -> Vec<Line> {
        let popped = match &mut self.current {
            Some((_, pairs)) => pairs.pop(),
            None => Vec::new(),
        };
        if self.current.as_ref().is_some_and(|(_, p)| !p.more_to_go()) {
            self.advance_hunk();
        }
        popped
    }

    pub fn more_to_go(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(lstart: usize, rstart: usize, specs: &[(char, &str)]) -> Hunk {
        let lines = specs
            .iter()
            .map(|(k, text)| {
                Line::new(
                    LineKind::from_char(*k).expect("bad kind in test spec"),
                    format!("{text}\n"),
                )
            })
            .collect();
        Hunk::with_lines(lstart, rstart, lines)
    }

    #[test]
    fn deletion_suppresses_the_right_half() {
        let h = hunk(5, 5, &[('-', "a"), (' ', "c")]);
        let pairs = HunkPairs::new(&h);
        let (l1, l2) = pairs.top_pair();
        assert_eq!(l1.map(|l| l.content.as_str()), Some("a\n"));
        assert!(l2.is_none());
    }

    #[test]
    fn insertion_suppresses_the_left_half() {
        let h = hunk(5, 5, &[('+', "a"), (' ', "c")]);
        let pairs = HunkPairs::new(&h);
        let (l1, l2) = pairs.top_pair();
        assert!(l1.is_none());
        assert_eq!(l2.map(|l| l.content.as_str()), Some("a\n"));
    }

    #[test]
    fn change_pair_keeps_both_halves() {
        let h = hunk(5, 5, &[('-', "old"), ('+', "new")]);
        let pairs = HunkPairs::new(&h);
        let (l1, l2) = pairs.top_pair();
        assert_eq!(l1.map(|l| l.content.as_str()), Some("old\n"));
        assert_eq!(l2.map(|l| l.content.as_str()), Some("new\n"));
    }

    // The exact advancement rule: after a pop, a cursor moves iff the
    // new top pair exposes that side. A deletion at the head of a hunk
    // leaves the right cursor behind until a two-sided pair surfaces.
    #[test]
    fn cursors_follow_the_new_top_pair() {
        let h = hunk(4, 4, &[(' ', "z"), ('-', "a"), (' ', "c")]);
        let mut pairs = HunkPairs::new(&h);
        assert_eq!(pairs.line_numbers(), (4, 4));
        pairs.pop_pair(); // (z, z) -> top is the bare deletion
        assert_eq!(pairs.line_numbers(), (5, 4));
        pairs.pop_pair(); // (a, _) -> top is (c, c)
        assert_eq!(pairs.line_numbers(), (6, 5));
        pairs.pop_pair();
        assert!(!pairs.more_to_go());
    }

    #[test]
    fn pop_collapses_identical_text_to_context() {
        let h = hunk(5, 5, &[('-', "x"), ('+', "x")]);
        let mut pairs = HunkPairs::new(&h);
        let lines = pairs.pop();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].kind, LineKind::Context);
        assert_eq!(lines[0].content, "x\n");
    }

    #[test]
    fn pop_keeps_a_real_change_as_two_lines() {
        let h = hunk(5, 5, &[('-', "old"), ('+', "new")]);
        let mut pairs = HunkPairs::new(&h);
        let lines = pairs.pop();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].kind, LineKind::Removed);
        assert_eq!(lines[1].kind, LineKind::Added);
    }

    #[test]
    fn diff_pairs_skip_line_less_hunks() {
        let diff = Diff::with_names(
            "a/f",
            "b/f",
            "f",
            "f",
            vec![
                Hunk::new(3, 3),
                hunk(5, 5, &[('-', "x"), ('+', "X")]),
                Hunk::new(9, 9),
            ],
        );
        let mut pairs = DiffPairs::new(&diff);
        assert_eq!(pairs.line_numbers(), Some((5, 5)));
        pairs.pop_pair();
        assert!(!pairs.more_to_go());
    }

    #[test]
    fn diff_pairs_advance_across_hunks() {
        let diff = Diff::with_names(
            "a/f",
            "b/f",
            "f",
            "f",
            vec![
                hunk(2, 2, &[('-', "a"), ('+', "A")]),
                hunk(9, 9, &[('-', "b"), ('+', "B")]),
            ],
        );
        let mut pairs = DiffPairs::new(&diff);
        assert_eq!(pairs.line_numbers(), Some((2, 2)));
        pairs.pop_pair();
        // First hunk exhausted; the cursor jumps to the second hunk.
        assert_eq!(pairs.line_numbers(), Some((9, 9)));
        pairs.pop_pair();
        assert!(!pairs.more_to_go());
        assert_eq!(pairs.line_numbers(), None);
        assert_eq!(pairs.top_pair(), (None, None));
    }
}
