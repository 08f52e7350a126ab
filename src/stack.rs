use std::fmt;

use tracing::debug;

use crate::config::Config;
use crate::editor;
use crate::error::{PatError, Result};
use crate::filter;
use crate::patch::Patch;

/// An ordered sequence of patches, front = top. `patches[len-1]` applies
/// first and `patches[0]` applies last, so index arithmetic reads like a
/// physical stack of printouts.
#[derive(Debug, Default)]
pub struct Stack {
    pub name: String,
    pub patches: Vec<Patch>,
}

/// One entry of the stack conflict scan: the floater at `floater`,
/// progressively rebased upward, could not pass the sinker at `sinker`.
#[derive(Debug)]
pub struct ConflictReport {
    pub floater: usize,
    pub sinker: usize,
    pub error: PatError,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Stack {
        Stack {
            name: name.into(),
            patches: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Patch> {
        self.patches
            .get(index)
            .ok_or(PatError::BadIndex { index })
    }

    fn check_pair(&self, index: usize) -> Result<()> {
        let below = index
            .checked_add(1)
            .ok_or(PatError::BadIndex { index })?;
        if below >= self.patches.len() {
            return Err(PatError::BadIndex { index: below });
        }
        Ok(())
    }

    pub fn push(&mut self, patch: Patch) {
        self.patches.insert(0, patch);
    }

    pub fn pop(&mut self) -> Option<Patch> {
        if self.patches.is_empty() {
            None
        } else {
            Some(self.patches.remove(0))
        }
    }

    /// Replaces `[i, i+1]` with their composition (the lower one applies
    /// first).
    pub fn squash(&mut self, index: usize) -> Result<()> {
        self.check_pair(index)?;
        let combined = self.patches[index + 1]
            .compose(&self.patches[index])?
            .shrinkwrapped()?;
        self.patches.splice(index..=index + 1, [combined]);
        Ok(())
    }

    /// Swaps the sinker at `index` with the floater beneath it at
    /// `index + 1` without changing the stack's overall effect: the
    /// floater's rebase takes the upper slot, the sinker's remainder the
    /// lower one, and the names travel with the slots.
    pub fn sink(&mut self, index: usize) -> Result<()> {
        self.check_pair(index)?;
        let sinker = &self.patches[index];
        let floater = &self.patches[index + 1];
        debug!(target: "stack", sinker = %sinker.name, floater = %floater.name, "sink");
        let mut up = floater.over(sinker)?.shrinkwrapped()?;
        let mut down = sinker.under(floater)?.shrinkwrapped()?;
        up.name = floater.name.clone();
        down.name = sinker.name.clone();
        self.patches.splice(index..=index + 1, [up, down]);
        Ok(())
    }

    /// Repeats [`Stack::sink`] from `start` up to (not including) `end`.
    pub fn sink_range(&mut self, start: usize, end: usize) -> Result<()> {
        for index in start..end {
            self.sink(index)?;
        }
        Ok(())
    }

    /// Bubbles the patch at `index` up one slot.
    pub fn float_up(&mut self, index: usize) -> Result<()> {
        if index == 0 {
            return Err(PatError::BadIndex { index: 0 });
        }
        self.sink(index - 1)
    }

    /// Bubbles upward from `start` down to (not including) `end`;
    /// `start` is the deeper index.
    pub fn float_range(&mut self, start: usize, end: usize) -> Result<()> {
        let from = end
            .checked_add(1)
            .ok_or(PatError::BadIndex { index: end })?;
        for index in (from..=start).rev() {
            self.sink(index - 1)?;
        }
        Ok(())
    }

    /// Replaces the patch at `index` with its shrinkwrapped inverse.
    pub fn invert(&mut self, index: usize) -> Result<()> {
        self.get(index)?;
        let inverted = self.patches[index].inverse()?.shrinkwrapped()?;
        self.patches[index] = inverted;
        Ok(())
    }

    /// Splits the patch at `index` at the given left line.
    pub fn split(&mut self, index: usize, line: usize) -> Result<()> {
        self.get(index)?;
        let split = self.patches[index].split(line)?;
        self.patches[index] = split;
        Ok(())
    }

    /// Splits the patch at `index` in place into two adjacent
    /// shrinkwrapped patches, the matching one on top.
    fn apply_partition(&mut self, index: usize, pair: filter::PatchPair) -> Result<()> {
        let (matching, rest) = pair;
        let matching = matching.shrinkwrapped()?;
        let rest = rest.shrinkwrapped()?;
        self.patches.splice(index..=index, [matching, rest]);
        Ok(())
    }

    pub fn grep(&mut self, index: usize, regex: &regex::Regex) -> Result<()> {
        self.get(index)?;
        let pair = filter::partition_grep(&self.patches[index], regex)?;
        self.apply_partition(index, pair)
    }

    pub fn glob(&mut self, index: usize, pattern: &glob::Pattern) -> Result<()> {
        self.get(index)?;
        let pair = filter::partition_glob(&self.patches[index], pattern);
        self.apply_partition(index, pair)
    }

    /// Scans every floater against every sinker above it, progressively
    /// rebasing; yields one report per pair the rebase cannot pass.
    /// Errors other than same-line conflicts abort the scan.
    pub fn conflicts(&self) -> Result<Vec<ConflictReport>> {
        let mut reports = Vec::new();
        for floater_index in (1..self.patches.len()).rev() {
            let mut floater = self.patches[floater_index].clone();
            for sinker_index in 0..floater_index {
                let sinker = &self.patches[sinker_index];
                match floater.over(sinker) {
                    Ok(rebased) => floater = rebased,
                    Err(error) if error.is_line_conflict() => {
                        reports.push(ConflictReport {
                            floater: floater_index,
                            sinker: sinker_index,
                            error,
                        });
                    }
                    Err(error) => return Err(error),
                }
            }
        }
        Ok(reports)
    }

    /// Bottom-up composition of the whole stack. An empty stack sums to
    /// the empty patch.
    pub fn sum(&self) -> Result<Patch> {
        let mut iter = self.patches.iter().rev();
        let Some(first) = iter.next() else {
            return Ok(Patch::new(self.name.clone()));
        };
        let mut acc = first.clone();
        for patch in iter {
            acc = acc.compose(patch)?.shrinkwrapped()?;
        }
        Ok(acc)
    }

    /// Hands the patch at `index` to `$EDITOR` and reloads it in place.
    pub fn edit(&mut self, index: usize, config: &Config) -> Result<()> {
        self.get(index)?;
        self.patches[index] = editor::edit_patch(&self.patches[index], config)?;
        Ok(())
    }

    /// Edits `[i, i+1]` side by side; patches left empty by the edit are
    /// dropped from the stack.
    pub fn edit2(&mut self, index: usize, config: &Config) -> Result<()> {
        self.check_pair(index)?;
        let pair = editor::edit_pair(&self.patches[index], &self.patches[index + 1], config)?;
        self.patches.splice(index..=index + 1, pair);
        Ok(())
    }

    /// Interactive split: edits an empty upper patch against the patch
    /// at `index`, letting hunks be sifted upward by hand.
    pub fn sift(&mut self, index: usize, config: &Config) -> Result<()> {
        self.get(index)?;
        let original = self.patches[index].clone();
        let upper = Patch::new(format!("{}.upper", original.name));
        let pair = editor::edit_pair(&upper, &original, config)?;
        self.patches.splice(index..=index, pair);
        Ok(())
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for patch in &self.patches {
            write!(f, "{patch}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Diff;
    use crate::hunk::Hunk;
    use crate::line::{Line, LineKind};

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

    fn one_file_patch(name: &str, hunks: Vec<Hunk>) -> Patch {
        let mut diff = Diff::new("x/f", "x/f", 1);
        diff.hunks = hunks;
        diff.normalize().expect("test diff should normalize");
        Patch::with_diffs(name, vec![diff])
    }

    fn early_insert() -> Patch {
        one_file_patch(
            "early",
            vec![hunk(4, 4, &[(' ', "p"), (' ', "q"), ('+', "ins"), (' ', "u")])],
        )
    }

    fn late_change() -> Patch {
        one_file_patch(
            "late",
            vec![hunk(
                19,
                19,
                &[(' ', "r"), (' ', "s"), ('-', "old"), ('+', "new"), (' ', "t")],
            )],
        )
    }

    fn two_patch_stack() -> Stack {
        let mut stack = Stack::new("patches");
        stack.push(early_insert()); // bottom, applies first
        stack.push(late_change()); // top
        stack
    }

    #[test]
    fn push_and_pop_are_front_biased() {
        let mut stack = two_patch_stack();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.patches[0].name, "late");
        let top = stack.pop().expect("non-empty");
        assert_eq!(top.name, "late");
        assert_eq!(stack.pop().map(|p| p.name), Some("early".to_string()));
        assert!(stack.pop().is_none());
    }

    #[test]
    fn sink_swaps_without_changing_the_sum() {
        let mut stack = two_patch_stack();
        let before = stack.sum().unwrap();
        stack.sink(0).unwrap();
        // Names swap with the patches.
        assert_eq!(stack.patches[0].name, "early");
        assert_eq!(stack.patches[1].name, "late");
        let after = stack.sum().unwrap();
        assert!(before
            .without(&after)
            .unwrap()
            .shrinkwrapped()
            .unwrap()
            .is_identity());
    }

    #[test]
    fn float_is_the_inverse_motion() {
        let mut stack = two_patch_stack();
        stack.sink(0).unwrap();
        stack.float_up(1).unwrap();
        assert_eq!(stack.patches[0].name, "late");
        assert_eq!(stack.patches[1].name, "early");
    }

    #[test]
    fn squash_composes_the_pair() {
        let mut stack = two_patch_stack();
        let expected = stack.sum().unwrap();
        stack.squash(0).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.patches[0].name, "early+late");
        assert!(expected
            .without(&stack.patches[0])
            .unwrap()
            .shrinkwrapped()
            .unwrap()
            .is_identity());
    }

    #[test]
    fn conflicts_reports_the_offending_pair() {
        let mut stack = Stack::new("patches");
        // Bottom changes cat -> dog; top claims cat -> bird on the same line.
        stack.push(one_file_patch(
            "first",
            vec![hunk(19, 19, &[(' ', "c"), ('-', "cat"), ('+', "dog"), (' ', "d")])],
        ));
        stack.push(one_file_patch(
            "second",
            vec![hunk(19, 19, &[(' ', "c"), ('-', "cat"), ('+', "bird"), (' ', "d")])],
        ));
        let reports = stack.conflicts().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!((reports[0].floater, reports[0].sinker), (1, 0));
        assert!(reports[0].error.is_line_conflict());
    }

    #[test]
    fn clean_stack_reports_no_conflicts() {
        let stack = two_patch_stack();
        assert!(stack.conflicts().unwrap().is_empty());
    }

    #[test]
    fn sum_of_empty_stack_is_identity() {
        let stack = Stack::new("patches");
        assert!(stack.sum().unwrap().is_identity());
    }

    #[test]
    fn grep_splits_a_patch_in_place() {
        let mut stack = Stack::new("patches");
        stack.push(one_file_patch(
            "p",
            vec![
                hunk(4, 4, &[(' ', "p"), ('-', "needle"), ('+', "N"), (' ', "q")]),
                hunk(20, 20, &[(' ', "r"), ('+', "hay"), (' ', "s")]),
            ],
        ));
        let regex = regex::Regex::new("needle").unwrap();
        stack.grep(0, &regex).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.patches[0].name, "p.matches");
        assert_eq!(stack.patches[1].name, "p");
    }

    #[test]
    fn out_of_range_indices_are_typed_errors() {
        let mut stack = two_patch_stack();
        assert!(matches!(stack.sink(1), Err(PatError::BadIndex { .. })));
        assert!(matches!(stack.float_up(0), Err(PatError::BadIndex { .. })));
        assert!(matches!(stack.squash(5), Err(PatError::BadIndex { .. })));
        assert!(matches!(stack.get(9), Err(PatError::BadIndex { index: 9 })));
    }

    // usize::MAX is a syntactically valid index; the pair arithmetic
    // must reject it rather than overflow.
    #[test]
    fn huge_indices_do_not_overflow() {
        let mut stack = two_patch_stack();
        assert!(matches!(
            stack.sink(usize::MAX),
            Err(PatError::BadIndex { .. })
        ));
        assert!(matches!(
            stack.squash(usize::MAX),
            Err(PatError::BadIndex { .. })
        ));
        assert!(matches!(
            stack.edit2(usize::MAX, &Config::default()),
            Err(PatError::BadIndex { .. })
        ));
        assert!(matches!(
            stack.float_range(1, usize::MAX),
            Err(PatError::BadIndex { .. })
        ));
        assert_eq!(stack.len(), 2);
    }
}
