use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::diff::Diff;
use crate::error::{PatError, Result};
use crate::filter;

/// A set of per-file diffs applied atomically, indexed by the stripped
/// left and right file names. The name is free-form and is used to build
/// the names of composed results.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    pub name: String,
    pub diffs: Vec<Diff>,
    by_lname: BTreeMap<String, usize>,
    by_rname: BTreeMap<String, usize>,
}

/// How a pairwise combine treats the four pairing cases.
type CombineFn = fn(Option<&Diff>, Option<&Diff>) -> Result<Vec<Diff>>;

fn compose_pair(left: Option<&Diff>, right: Option<&Diff>) -> Result<Vec<Diff>> {
    match (left, right) {
        (Some(l), Some(r)) => Ok(vec![l.compose(r)?]),
        (Some(l), None) => Ok(vec![l.clone()]),
        (None, Some(r)) => Ok(vec![r.clone()]),
        (None, None) => Ok(Vec::new()),
    }
}

fn over_pair(left: Option<&Diff>, right: Option<&Diff>) -> Result<Vec<Diff>> {
    match (left, right) {
        (Some(l), Some(r)) => Ok(vec![l.over(r)?]),
        (Some(l), None) => Ok(vec![l.clone()]),
        // A rebase of "no prior self" is empty.
        (None, _) => Ok(Vec::new()),
    }
}

impl Patch {
    pub fn new(name: impl Into<String>) -> Patch {
        Patch {
            name: name.into(),
            diffs: Vec::new(),
            by_lname: BTreeMap::new(),
            by_rname: BTreeMap::new(),
        }
    }

    pub fn with_diffs(name: impl Into<String>, diffs: Vec<Diff>) -> Patch {
        let mut patch = Patch::new(name);
        patch.diffs = diffs;
        patch.normalize();
        patch
    }

    /// A patch with no diffs changes nothing.
    pub fn is_identity(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Sorts diffs by left path and rebuilds the name indices.
    pub fn normalize(&mut self) {
        self.diffs.sort_by(|a, b| a.lpath.cmp(&b.lpath));
        self.by_lname.clear();
        self.by_rname.clear();
        for (index, diff) in self.diffs.iter().enumerate() {
            self.by_lname.insert(diff.lname.clone(), index);
            self.by_rname.insert(diff.rname.clone(), index);
        }
    }

    pub fn diff_by_lname(&self, name: &str) -> Option<&Diff> {
        self.by_lname.get(name).map(|&i| &self.diffs[i])
    }

    pub fn diff_by_rname(&self, name: &str) -> Option<&Diff> {
        self.by_rname.get(name).map(|&i| &self.diffs[i])
    }

    /// Canonical form: shrinkwraps every diff and drops the identities.
    pub fn shrinkwrapped(&self) -> Result<Patch> {
        let mut diffs = Vec::with_capacity(self.diffs.len());
        for diff in &self.diffs {
            let wrapped = diff.shrinkwrapped()?;
            if !wrapped.is_identity() {
                diffs.push(wrapped);
            }
        }
        Ok(Patch::with_diffs(self.name.clone(), diffs))
    }

    pub fn inverse(&self) -> Result<Patch> {
        let mut diffs = Vec::with_capacity(self.diffs.len());
        for diff in &self.diffs {
            diffs.push(diff.inverse()?);
        }
        Ok(Patch::with_diffs(format!("-{}", self.name), diffs))
    }

    /// Pairs diffs up by filename and combines each pair. The key
    /// universe is this patch's right names plus `other`'s left names; a
    /// name present only as somebody's opposite side is a rename the
    /// operators cannot reconcile (skipped when `skip_incompatible`).
    fn combine(
        &self,
        other: &Patch,
        separator: &str,
        combine: CombineFn,
        skip_incompatible: bool,
    ) -> Result<Patch> {
        let mut result = Patch::new(format!("{}{}{}", self.name, separator, other.name));
        let mut names: BTreeSet<&str> = self.diffs.iter().map(|d| d.rname.as_str()).collect();
        names.extend(other.diffs.iter().map(|d| d.lname.as_str()));
        debug!(target: "combine", ?names, "pairing diffs");

        for name in names {
            match (self.diff_by_rname(name), other.diff_by_lname(name)) {
                (Some(left), Some(right)) => {
                    result.diffs.extend(combine(Some(left), Some(right))?);
                }
                (Some(left), None) => {
                    if other.diff_by_rname(name).is_some() {
                        if !skip_incompatible {
                            return Err(PatError::IncompatibleFileRename {
                                name: name.to_string(),
                            });
                        }
                    } else {
                        result.diffs.extend(combine(Some(left), None)?);
                    }
                }
                (None, right) => {
                    if self.diff_by_lname(name).is_some() {
                        if !skip_incompatible {
                            return Err(PatError::IncompatibleFileRename {
                                name: name.to_string(),
                            });
                        }
                    } else {
                        result.diffs.extend(combine(None, right)?);
                    }
                }
            }
        }
        result.normalize();
        Ok(result)
    }

    /// Sequential composition: apply this patch, then `other`.
    pub fn compose(&self, other: &Patch) -> Result<Patch> {
        self.combine(other, "+", compose_pair, false)
    }

    /// Rebase this patch (which originally applied first) over `other`.
    pub fn over(&self, other: &Patch) -> Result<Patch> {
        self.combine(other, ">>", over_pair, false)
    }

    /// This patch with `other`'s effect removed.
    pub fn without(&self, other: &Patch) -> Result<Patch> {
        self.compose(&other.inverse()?)
    }

    /// Partner of [`Patch::over`] in the swap law: with
    /// `up = A.over(B)` and `down = B.under(A)`, `A + B == down + up`.
    pub fn under(&self, other: &Patch) -> Result<Patch> {
        other.compose(self)?.without(&other.over(self)?)
    }

    /// The part of this patch that cannot be rebased over `other`.
    pub fn conflicts(&self, other: &Patch) -> Result<Patch> {
        Ok(filter::partition_conflicts(self, other)?.0)
    }

    /// This patch with the conflicting hunks removed.
    pub fn without_conflicts(&self, other: &Patch) -> Result<Patch> {
        Ok(filter::partition_conflicts(self, other)?.1)
    }

    /// Splits the unique diff covering `left_line` at that line.
    pub fn split(&self, left_line: usize) -> Result<Patch> {
        let covering: Vec<usize> = self
            .diffs
            .iter()
            .enumerate()
            .filter(|(_, d)| d.hunk_covering(left_line).is_some())
            .map(|(i, _)| i)
            .collect();
        let [index] = covering.as_slice() else {
            return Err(PatError::AmbiguousLineNumber { line: left_line });
        };
        let split_diff = self.diffs[*index].split(left_line)?;
        let mut diffs = self.diffs.clone();
        diffs[*index] = split_diff;
        Ok(Patch::with_diffs(
            format!("{}^{}", self.name, left_line),
            diffs,
        ))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string()).map_err(|source| PatError::FileWrite {
            path: path.into(),
            source,
        })
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diff in &self.diffs {
            write!(f, "{diff}")?;
        }
        Ok(())
    }
}
