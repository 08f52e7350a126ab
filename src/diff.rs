use std::cmp::Ordering;
use std::fmt;

use tracing::{debug, trace};

use crate::error::{LineConflict, PatError, Result};
use crate::hunk::Hunk;
use crate::iter::{DiffPairs, HunkPairs};
use crate::line::{Line, LineKind};

/// The edit for one file: an ordered sequence of non-overlapping hunks.
///
/// `lname`/`rname` are the header paths with their leading components
/// stripped; they are the keys under which patches pair diffs up, and
/// the contract every binary operator checks (`A`'s right name must be
/// `B`'s left name for `A` then `B` to make sense).
#[derive(Debug, Clone)]
pub struct Diff {
    pub lpath: String,
    pub rpath: String,
    pub lname: String,
    pub rname: String,
    pub hunks: Vec<Hunk>,
}

/// Drops `strip_level` leading path components. A path with fewer
/// components than that comes back whole.
pub fn stripped_path(path: &str, strip_level: usize) -> &str {
    let mut start = 0;
    for _ in 0..strip_level {
        match path[start..].find('/') {
            Some(slash) => start += slash + 1,
            None => start = 0,
        }
    }
    &path[start..]
}

impl Diff {
    pub fn new(lpath: impl Into<String>, rpath: impl Into<String>, strip_level: usize) -> Diff {
        let lpath = lpath.into();
        let rpath = rpath.into();
        let lname = stripped_path(&lpath, strip_level).to_string();
        let rname = stripped_path(&rpath, strip_level).to_string();
        Diff {
            lpath,
            rpath,
            lname,
            rname,
            hunks: Vec::new(),
        }
    }

    /// Raw constructor for results whose names are already known from
    /// the operands; skips path stripping.
    pub fn with_names(
        lpath: impl Into<String>,
        rpath: impl Into<String>,
        lname: impl Into<String>,
        rname: impl Into<String>,
        hunks: Vec<Hunk>,
    ) -> Diff {
        Diff {
            lpath: lpath.into(),
            rpath: rpath.into(),
            lname: lname.into(),
            rname: rname.into(),
            hunks,
        }
    }

    /// A diff with no hunks changes nothing.
    pub fn is_identity(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Normalizes every hunk, sorts them by their left interval, and
    /// verifies they are strictly increasing.
    pub fn normalize(&mut self) -> Result<()> {
        for hunk in &mut self.hunks {
            hunk.normalize();
        }
        self.hunks.sort_by(|a, b| a.lcmp(b));
        for pair in self.hunks.windows(2) {
            if pair[0].lcmp(&pair[1]) != Ordering::Less {
                return Err(PatError::DisjointHunk);
            }
        }
        Ok(())
    }

    /// Canonical form: shrinkwraps every hunk and drops the identities.
    pub fn shrinkwrapped(&self) -> Result<Diff> {
        let hunks = self
            .hunks
            .iter()
            .map(Hunk::shrinkwrapped)
            .filter(|h| !h.is_identity())
            .collect();
        let mut result = Diff::with_names(
            self.lpath.clone(),
            self.rpath.clone(),
            self.lname.clone(),
            self.rname.clone(),
            hunks,
        );
        result.normalize()?;
        Ok(result)
    }

    pub fn inverse(&self) -> Result<Diff> {
        let hunks = self.hunks.iter().map(Hunk::inverse).collect();
        let mut result = Diff::with_names(
            self.rpath.clone(),
            self.lpath.clone(),
            self.rname.clone(),
            self.lname.clone(),
            hunks,
        );
        result.normalize()?;
        Ok(result)
    }

    fn chain_check(&self, other: &Diff) -> Result<()> {
        if self.rname != other.lname {
            return Err(PatError::MismatchedFilename {
                left: self.rname.clone(),
                right: other.lname.clone(),
            });
        }
        Ok(())
    }

    fn result_stub(&self, other: &Diff) -> Diff {
        Diff::with_names(
            self.lpath.clone(),
            other.rpath.clone(),
            self.lname.clone(),
            other.rname.clone(),
            Vec::new(),
        )
    }

    fn last_stops(&self) -> (usize, usize) {
        self.hunks.last().map(Hunk::stops).unwrap_or((0, 0))
    }

    /// Opens the first result hunk at whichever side is behind.
    fn anchor_result(&mut self, a: &DiffPairs<'_>, b: &DiffPairs<'_>) {
        if let (Some((n1, n2)), Some((n3, n4))) = (a.line_numbers(), b.line_numbers()) {
            // Nothing has been consumed yet, so each operand's first
            // hunk must start aligned.
            debug_assert!(n1 == n2 && n3 == n4);
            let anchor = match n2.cmp(&n3) {
                Ordering::Less => (n1, n2),
                Ordering::Greater => (n3, n4),
                Ordering::Equal => (n1, n4),
            };
            self.hunks.push(Hunk::new(anchor.0, anchor.1));
        }
    }

    /// Appends `extension` to the open result hunk, first closing it and
    /// opening a fresh one at `expected` if the current stops fall short
    /// of where the extension belongs. This is what keeps the inter-hunk
    /// offset law intact across gaps.
    fn extend_result(&mut self, expected: (usize, usize), extension: Vec<Line>) {
        match self.hunks.last() {
            Some(last) => {
                let (lstop, rstop) = last.stops();
                if lstop < expected.0 || rstop < expected.1 {
                    trace!(lstart = expected.0, rstart = expected.1, "opening result hunk");
                    self.hunks.push(Hunk::new(expected.0, expected.1));
                }
            }
            None => self.hunks.push(Hunk::new(expected.0, expected.1)),
        }
        if let Some(last) = self.hunks.last_mut() {
            last.lines.extend(extension);
        }
    }

    /// Sequential composition: the diff that takes this diff's left file
    /// straight to `other`'s right file. Left line numbers of the result
    /// coincide with this diff's left, right line numbers with `other`'s
    /// right.
    pub fn compose(&self, other: &Diff) -> Result<Diff> {
        self.chain_check(other)?;
        if other.is_identity() {
            return Ok(self.clone());
        }
        if self.is_identity() {
            return Ok(other.clone());
        }

        let mut a = DiffPairs::new(self);
        let mut b = DiffPairs::new(other);
        let mut result = self.result_stub(other);
        result.anchor_result(&a, &b);

        while let (Some((n1, n2)), Some((n3, n4))) = (a.line_numbers(), b.line_numbers()) {
            let (n5, n6) = result.last_stops();
            let offset = n6 as i64 - n5 as i64;
            trace!(target: "compose", n1, n2, n3, n4, n5, n6);
            match n2.cmp(&n3) {
                Ordering::Less => {
                    debug!(target: "compose", "first operand is behind: {n2} < {n3}");
                    let expected = (n1, (n1 as i64 + offset) as usize);
                    let extension = a.pop();
                    result.extend_result(expected, extension);
                }
                Ordering::Greater => {
                    debug!(target: "compose", "second operand is behind: {n2} > {n3}");
                    let expected = ((n4 as i64 - offset) as usize, n4);
                    let extension = b.pop();
                    result.extend_result(expected, extension);
                }
                Ordering::Equal => {
                    let self_hunk = a.current_hunk();
                    let other_hunk = b.current_hunk();
                    let (l1, l2) = a.top_pair();
                    let (l3, l4) = b.top_pair();
                    let expected = (n1, n4);
                    a.pop_pair();
                    b.pop_pair();
                    let extension = if l2.is_none() && l3.is_none() {
                        // One operand deletes and the other inserts at
                        // the same boundary.
                        match (l1, l4) {
                            (Some(del), Some(ins)) if del == ins => {
                                debug!(target: "compose", "line deleted then restored");
                                vec![Line::context(del.content.clone())]
                            }
                            (Some(del), Some(ins)) => {
                                debug!(target: "compose", "line deleted, different line inserted");
                                vec![del.clone(), ins.clone()]
                            }
                            (del, ins) => del.into_iter().chain(ins).cloned().collect(),
                        }
                    } else if l2 != l3 {
                        debug!(target: "compose", "operands disagree about the middle line");
                        return Err(PatError::IncompatibleChangeToSameLine {
                            conflict: LineConflict::boxed(self_hunk, other_hunk, l2, l3),
                        });
                    } else {
                        match (l1, l4) {
                            (None, None) => {
                                debug!(target: "compose", "line inserted then deleted");
                                Vec::new()
                            }
                            (None, Some(ins)) => {
                                vec![Line::new(LineKind::Added, ins.content.clone())]
                            }
                            (Some(del), None) => {
                                vec![Line::new(LineKind::Removed, del.content.clone())]
                            }
                            (Some(del), Some(ins)) if del == ins => {
                                // Unchanged, or changed and changed back.
                                vec![Line::context(ins.content.clone())]
                            }
                            (Some(del), Some(ins)) => {
                                debug!(target: "compose", "line changed twice");
                                vec![
                                    Line::new(LineKind::Removed, del.content.clone()),
                                    Line::new(LineKind::Added, ins.content.clone()),
                                ]
                            }
                        }
                    };
                    result.extend_result(expected, extension);
                }
            }
        }

        while let Some((n1, _)) = a.line_numbers() {
            let (n5, n6) = result.last_stops();
            let offset = n6 as i64 - n5 as i64;
            let expected = (n1, (n1 as i64 + offset) as usize);
            let extension = a.pop();
            result.extend_result(expected, extension);
        }
        while let Some((_, n4)) = b.line_numbers() {
            let (n5, n6) = result.last_stops();
            let offset = n6 as i64 - n5 as i64;
            let expected = ((n4 as i64 - offset) as usize, n4);
            let extension = b.pop();
            result.extend_result(expected, extension);
        }

        result.normalize()?;
        Ok(result)
    }

    /// Rebase: the diff that, applied after `other`, has the same net
    /// effect this diff had. This diff is the one that originally
    /// applied first; `other`'s right line numbers are the coordinate
    /// system the result lands in.
    pub fn over(&self, other: &Diff) -> Result<Diff> {
        self.chain_check(other)?;
        if self.is_identity() || other.is_identity() {
            return Ok(self.clone());
        }

        let mut a = DiffPairs::new(self);
        let mut b = DiffPairs::new(other);
        let mut result = self.result_stub(other);
        result.anchor_result(&a, &b);

        // Net insertions minus deletions seen from `other` so far; the
        // drain after `other` runs out keeps using the last value.
        let mut other_accumulated_offset: i64 = 0;

        while let (Some((n1, n2)), Some((n3, n4))) = (a.line_numbers(), b.line_numbers()) {
            let (n5, n6) = result.last_stops();
            let hunk_offset = n6 as i64 - n5 as i64;
            other_accumulated_offset = n4 as i64 - n3 as i64;
            trace!(target: "over", n1, n2, n3, n4, n5, n6);
            match n2.cmp(&n3) {
                Ordering::Less => {
                    debug!(target: "over", "own change is ahead of the rebase point");
                    let left = (n1 as i64 + other_accumulated_offset) as usize;
                    let expected = (left, (left as i64 + hunk_offset) as usize);
                    let extension = a.pop();
                    result.extend_result(expected, extension);
                }
                Ordering::Greater => {
                    debug!(target: "over", "other changed lines before our next change");
                    let expected = ((n4 as i64 - hunk_offset) as usize, n4);
                    let (_, l4) = b.pop_pair();
                    let extension = match l4 {
                        Some(l4) => vec![Line::context(l4.content.clone())],
                        None => Vec::new(),
                    };
                    result.extend_result(expected, extension);
                }
                Ordering::Equal => {
                    let self_hunk = a.current_hunk();
                    let other_hunk = b.current_hunk();
                    let (l1, l2) = a.top_pair();
                    let (l3, l4) = b.top_pair();
                    let expected = ((n4 as i64 - hunk_offset) as usize, n4);
                    if l2 != l3 {
                        debug!(target: "over", "operands disagree about the middle line");
                        return Err(PatError::IncompatibleChangeToSameLine {
                            conflict: LineConflict::boxed(self_hunk, other_hunk, l2, l3),
                        });
                    } else if l3 == l4 {
                        debug!(target: "over", "line unaffected by other");
                        let extension = a.pop();
                        b.pop_pair();
                        result.extend_result(expected, extension);
                    } else if l1 == l2 {
                        a.pop();
                        b.pop_pair();
                        if let Some(l4) = l4 {
                            debug!(target: "over", "line unaffected by us, keep other's as context");
                            result.extend_result(expected, vec![Line::context(l4.content.clone())]);
                        } else {
                            debug!(target: "over", "context line deleted by other");
                            if let Some(last) = result.hunks.last_mut() {
                                if last.lines.is_empty() {
                                    // The line that would have anchored
                                    // this hunk is gone; shift the anchor.
                                    last.lstart += 1;
                                    last.rstart += 1;
                                }
                            }
                            result.extend_result(expected, Vec::new());
                        }
                    } else {
                        debug!(target: "over", "both operands change the line");
                        return Err(PatError::ChangeToSameLine {
                            conflict: LineConflict::boxed(self_hunk, other_hunk, l2, l3),
                        });
                    }
                }
            }
        }

        while let Some((n1, _)) = a.line_numbers() {
            let (n5, n6) = result.last_stops();
            let hunk_offset = n6 as i64 - n5 as i64;
            let left = (n1 as i64 + other_accumulated_offset) as usize;
            let expected = (left, (left as i64 + hunk_offset) as usize);
            let extension = a.pop();
            result.extend_result(expected, extension);
        }
        while let Some((_, n4)) = b.line_numbers() {
            let (n5, n6) = result.last_stops();
            let hunk_offset = n6 as i64 - n5 as i64;
            let expected = ((n4 as i64 - hunk_offset) as usize, n4);
            let (_, l4) = b.pop_pair();
            let extension = match l4 {
                Some(l4) => vec![Line::context(l4.content.clone())],
                None => Vec::new(),
            };
            result.extend_result(expected, extension);
        }

        result.normalize()?;
        Ok(result)
    }

    pub fn hunk_covering(&self, left_line: usize) -> Option<&Hunk> {
        self.hunks
            .iter()
            .find(|h| h.lcmp_line(left_line) == Ordering::Equal)
    }

    /// Splits the hunk covering `left_line` into the part strictly above
    /// the line and the rest. A line outside every hunk returns the diff
    /// unchanged.
    pub fn split(&self, left_line: usize) -> Result<Diff> {
        let Some(index) = self
            .hunks
            .iter()
            .position(|h| h.lcmp_line(left_line) == Ordering::Equal)
        else {
            return Ok(self.clone());
        };

        let target = &self.hunks[index];
        let mut pairs = HunkPairs::new(target);
        let mut top = Hunk::new(target.lstart, target.rstart);
        while pairs.more_to_go() && pairs.line_numbers().0 < left_line {
            top.lines.extend(pairs.pop());
        }
        let (bottom_lstart, bottom_rstart) = pairs.line_numbers();
        let mut bottom = Hunk::new(bottom_lstart, bottom_rstart);
        while pairs.more_to_go() {
            bottom.lines.extend(pairs.pop());
        }

        let mut hunks = self.hunks.clone();
        hunks.remove(index);
        hunks.push(top);
        hunks.push(bottom);
        let mut result = Diff::with_names(
            self.lpath.clone(),
            self.rpath.clone(),
            self.lname.clone(),
            self.rname.clone(),
            hunks,
        );
        result.normalize()?;
        Ok(result)
    }

    /// Checks the inter-hunk offset law on the hunk list.
    pub fn offset_law_holds(&self) -> bool {
        self.hunks.windows(2).all(|pair| {
            pair[1].rstart as i64 - pair[1].lstart as i64
                == pair[0].rstop() as i64 - pair[0].lstop() as i64
        })
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {}", self.lpath)?;
        writeln!(f, "+++ {}", self.rpath)?;
        for hunk in &self.hunks {
            write!(f, "{hunk}")?;
        }
        Ok(())
    }
}
