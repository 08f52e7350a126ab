//! Predicate-driven partitioning of a patch into (matching, rest).
//!
//! Three granularities: whole patches, per-file diffs, and individual
//! hunks. Hunk-level partitioning assumes the matching side composes on
//! top of the rest ("yes over no"), so the two sides get their middle
//! line numbers re-derived: the rest keeps its left numbers, the
//! matching side keeps its right numbers.

use tracing::debug;

use crate::diff::Diff;
use crate::error::{PatError, Result};
use crate::hunk::{fix_left_line_numbers, fix_right_line_numbers, Hunk};
use crate::patch::Patch;

/// (matching, non-matching)
pub type PatchPair = (Patch, Patch);

fn matches_name(patch: &Patch) -> String {
    format!("{}.matches", patch.name)
}

/// Whole-patch granularity: the patch lands in one bucket or the other.
pub fn partition_patches<F>(patch: &Patch, predicate: F) -> PatchPair
where
    F: Fn(&Patch) -> bool,
{
    let mut yes = Patch::new(matches_name(patch));
    let mut no = Patch::new(patch.name.clone());
    if predicate(patch) {
        yes = patch.clone();
        yes.name = matches_name(patch);
    } else {
        no = patch.clone();
    }
    yes.normalize();
    no.normalize();
    (yes, no)
}

/// Per-diff granularity: each file's diff lands in one bucket whole.
pub fn partition_diffs<F>(patch: &Patch, predicate: F) -> PatchPair
where
    F: Fn(&Diff) -> bool,
{
    let mut yes = Patch::new(matches_name(patch));
    let mut no = Patch::new(patch.name.clone());
    for diff in &patch.diffs {
        if predicate(diff) {
            yes.diffs.push(diff.clone());
        } else {
            no.diffs.push(diff.clone());
        }
    }
    yes.normalize();
    no.normalize();
    (yes, no)
}

/// Per-hunk granularity. Both sides keep the diff's paths; the rest
/// side's right numbers and the matching side's left numbers are
/// re-derived from the running offsets.
pub fn partition_hunks<F>(patch: &Patch, predicate: F) -> Result<PatchPair>
where
    F: Fn(&Hunk) -> bool,
{
    let mut yes = Patch::new(matches_name(patch));
    let mut no = Patch::new(patch.name.clone());
    for diff in &patch.diffs {
        let (yes_diff, no_diff) = partition_diff_hunks(diff, &predicate)?;
        yes.diffs.push(yes_diff);
        no.diffs.push(no_diff);
    }
    yes.normalize();
    no.normalize();
    Ok((yes, no))
}

fn partition_diff_hunks<F>(diff: &Diff, predicate: &F) -> Result<(Diff, Diff)>
where
    F: Fn(&Hunk) -> bool,
{
    let mut yes_hunks = Vec::new();
    let mut no_hunks = Vec::new();
    for hunk in &diff.hunks {
        if predicate(hunk) {
            yes_hunks.push(hunk.clone());
        } else {
            no_hunks.push(hunk.clone());
        }
    }
    // "Yes" composes on top of "no": the rest keeps the diff's left
    // numbers and needs fresh right numbers, the matching side keeps the
    // diff's right numbers and needs fresh left numbers.
    fix_right_line_numbers(&mut no_hunks);
    fix_left_line_numbers(&mut yes_hunks);

    let mut yes = Diff::with_names(
        diff.lpath.clone(),
        diff.rpath.clone(),
        diff.lname.clone(),
        diff.rname.clone(),
        yes_hunks,
    );
    let mut no = Diff::with_names(
        diff.lpath.clone(),
        diff.rpath.clone(),
        diff.lname.clone(),
        diff.rname.clone(),
        no_hunks,
    );
    yes.normalize()?;
    no.normalize()?;
    Ok((yes, no))
}

/// Hunks any of whose lines match the regex.
pub fn partition_grep(patch: &Patch, regex: &regex::Regex) -> Result<PatchPair> {
    partition_hunks(patch, |hunk| {
        hunk.lines.iter().any(|line| regex.is_match(&line.content))
    })
}

/// Diffs whose stripped names match the shell-style pattern.
pub fn partition_glob(patch: &Patch, pattern: &glob::Pattern) -> PatchPair {
    partition_diffs(patch, |diff| {
        pattern.matches(&diff.lname) || pattern.matches(&diff.rname)
    })
}

/// Conflict extraction: partitions `patch` into the hunks that cannot be
/// rebased over `hurdle` and the rest. The clean side always rebases
/// cleanly afterwards; composing clean + conflicts reproduces the
/// original patch.
pub fn partition_conflicts(patch: &Patch, hurdle: &Patch) -> Result<PatchPair> {
    let mut yes = Patch::new(matches_name(patch));
    let mut no = Patch::new(patch.name.clone());
    for diff in &patch.diffs {
        match hurdle.diff_by_lname(&diff.rname) {
            None => {
                debug!(target: "conflicts", lname = %diff.lname, "no counterpart, no conflicts");
                no.diffs.push(diff.clone());
            }
            Some(hurdle_diff) => {
                let (conflict, clean) = extract_diff_conflicts(diff, hurdle_diff)?;
                if let Some(conflict) = conflict {
                    yes.diffs.push(conflict);
                }
                no.diffs.push(clean);
            }
        }
    }
    yes.normalize();
    no.normalize();
    Ok((yes, no))
}

/// Repeatedly rebases a trial copy over the hurdle, moving the offending
/// hunk into the conflict diff each time it fails, until the rebase
/// succeeds. The trial's right numbers stay pinned so it remains
/// comparable with the hurdle; its left numbers are re-derived after
/// each removal.
fn extract_diff_conflicts(diff: &Diff, hurdle: &Diff) -> Result<(Option<Diff>, Diff)> {
    match diff.over(hurdle) {
        Ok(_) => {
            debug!(target: "conflicts", lname = %diff.lname, "rebases cleanly");
            return Ok((None, diff.clone()));
        }
        Err(err) if err.is_line_conflict() => {}
        Err(err) => return Err(err),
    }

    let mut trial = diff.clone();
    trial.normalize()?;
    // The conflict side applies after the patch, so both of its paths
    // are the right path.
    let mut conflict = Diff::with_names(
        diff.rpath.clone(),
        diff.rpath.clone(),
        diff.rname.clone(),
        diff.rname.clone(),
        Vec::new(),
    );
    loop {
        match trial.over(hurdle) {
            Ok(_) => {
                debug!(target: "conflicts", moved = conflict.hunks.len(), "extraction done");
                conflict.normalize()?;
                return Ok((Some(conflict), trial));
            }
            Err(err) => {
                let payload = err.into_line_conflict()?;
                let position = trial
                    .hunks
                    .iter()
                    .position(|h| h.same_shape(&payload.left_hunk));
                match position {
                    Some(index) => {
                        debug!(target: "conflicts", lstart = payload.left_hunk.lstart, "moving conflicting hunk");
                        conflict.hunks.push(trial.hunks.remove(index));
                        trial.normalize()?;
                        fix_left_line_numbers(&mut trial.hunks);
                    }
                    None => {
                        return Err(PatError::ChangeToSameLine { conflict: payload });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn one_file_patch(name: &str, lpath: &str, rpath: &str, hunks: Vec<Hunk>) -> Patch {
        let mut diff = Diff::new(lpath, rpath, 1);
        diff.hunks = hunks;
        diff.normalize().expect("test diff should normalize");
        Patch::with_diffs(name, vec![diff])
    }

    fn two_hunk_patch() -> Patch {
        one_file_patch(
            "p",
            "x/f",
            "x/f",
            vec![
                hunk(4, 4, &[(' ', "p"), ('-', "needle"), ('+', "N"), (' ', "q")]),
                hunk(20, 20, &[(' ', "r"), ('+', "hay"), (' ', "s")]),
            ],
        )
    }

    #[test]
    fn partition_patches_routes_the_whole_patch() {
        let p = two_hunk_patch();
        let (yes, no) = partition_patches(&p, |patch| patch.diffs.len() == 1);
        assert_eq!(yes.diffs.len(), 1);
        assert!(no.is_identity());
        assert_eq!(yes.name, "p.matches");

        let (yes, no) = partition_patches(&p, |_| false);
        assert!(yes.is_identity());
        assert_eq!(no.diffs.len(), 1);
    }

    #[test]
    fn glob_splits_by_file_name() {
        let mut p = one_file_patch("p", "x/src/a.rs", "y/src/a.rs", vec![hunk(1, 1, &[('-', "u"), ('+', "U")])]);
        let mut other = Diff::new("x/doc/b.md", "y/doc/b.md", 1);
        other.hunks = vec![hunk(1, 1, &[('-', "v"), ('+', "V")])];
        other.normalize().unwrap();
        p.diffs.push(other);
        p.normalize();

        let pattern = glob::Pattern::new("src/*").unwrap();
        let (yes, no) = partition_glob(&p, &pattern);
        assert_eq!(yes.diffs.len(), 1);
        assert_eq!(yes.diffs[0].lname, "src/a.rs");
        assert_eq!(no.diffs.len(), 1);
        assert_eq!(no.diffs[0].lname, "doc/b.md");
    }

    #[test]
    fn grep_splits_hunks_and_renumbers_both_sides() {
        let p = two_hunk_patch();
        let regex = regex::Regex::new("needle").unwrap();
        let (yes, no) = partition_grep(&p, &regex).unwrap();

        let yes_hunks = &yes.diffs[0].hunks;
        let no_hunks = &no.diffs[0].hunks;
        assert_eq!(yes_hunks.len(), 1);
        assert_eq!(no_hunks.len(), 1);
        // The matching hunk keeps its right numbers and re-derives the
        // left ones; standing alone it starts aligned.
        assert_eq!((yes_hunks[0].lstart, yes_hunks[0].rstart), (4, 4));
        // The rest keeps its left numbers; with the matching hunk gone
        // its right start realigns to the left.
        assert_eq!((no_hunks[0].lstart, no_hunks[0].rstart), (20, 20));
        // Composing rest-then-matching reproduces the original diff.
        let recombined = no.compose(&yes).unwrap();
        assert_eq!(
            recombined.shrinkwrapped().unwrap().to_string(),
            p.shrinkwrapped().unwrap().to_string()
        );
    }

    // A deletion before the non-matching hunk: the rest's right start
    // must realign to its left start once the matching hunk is gone.
    #[test]
    fn grep_renumbering_survives_a_net_offset() {
        let p = one_file_patch(
            "p",
            "x/f",
            "x/f",
            vec![
                hunk(4, 4, &[(' ', "p"), ('-', "del"), (' ', "q")]),
                hunk(20, 19, &[(' ', "r"), ('+', "add"), (' ', "s")]),
            ],
        );
        let regex = regex::Regex::new("del").unwrap();
        let (yes, no) = partition_grep(&p, &regex).unwrap();
        assert_eq!((yes.diffs[0].hunks[0].lstart, yes.diffs[0].hunks[0].rstart), (4, 4));
        assert_eq!((no.diffs[0].hunks[0].lstart, no.diffs[0].hunks[0].rstart), (20, 20));

        let recombined = no.compose(&yes).unwrap();
        assert_eq!(
            recombined.shrinkwrapped().unwrap().to_string(),
            p.shrinkwrapped().unwrap().to_string()
        );
    }

    #[test]
    fn conflict_extraction_isolates_the_colliding_hunk() {
        let a = one_file_patch(
            "a",
            "x/f",
            "x/f",
            vec![
                hunk(4, 4, &[(' ', "p"), ('-', "u"), ('+', "U"), (' ', "q")]),
                hunk(19, 19, &[(' ', "c"), ('-', "cat"), ('+', "dog"), (' ', "d")]),
            ],
        );
        let b = one_file_patch(
            "b",
            "x/f",
            "x/f",
            vec![hunk(19, 19, &[(' ', "c"), ('-', "cat"), ('+', "bird"), (' ', "d")])],
        );

        let conflicts = a.conflicts(&b).unwrap();
        let clean = a.without_conflicts(&b).unwrap();

        assert_eq!(conflicts.diffs.len(), 1);
        assert_eq!(conflicts.diffs[0].hunks.len(), 1);
        assert_eq!(conflicts.diffs[0].hunks[0].lstart, 19);
        // The conflict side lives in the post-patch name space.
        assert_eq!(conflicts.diffs[0].lpath, "x/f");

        assert_eq!(clean.diffs[0].hunks.len(), 1);
        assert_eq!(clean.diffs[0].hunks[0].lstart, 4);
        // The clean side now rebases without complaint.
        assert!(clean.over(&b).is_ok());

        // Composing clean + conflicts reproduces the original.
        let recombined = clean.compose(&conflicts).unwrap();
        assert_eq!(
            recombined.shrinkwrapped().unwrap().to_string(),
            a.shrinkwrapped().unwrap().to_string()
        );
    }

    #[test]
    fn no_counterpart_means_no_conflicts() {
        let a = one_file_patch("a", "x/one", "y/one", vec![hunk(1, 1, &[('-', "p"), ('+', "P")])]);
        let b = one_file_patch("b", "x/two", "y/two", vec![hunk(1, 1, &[('-', "q"), ('+', "Q")])]);
        let conflicts = a.conflicts(&b).unwrap();
        let clean = a.without_conflicts(&b).unwrap();
        assert!(conflicts.is_identity());
        assert_eq!(clean.shrinkwrapped().unwrap().to_string(), a.shrinkwrapped().unwrap().to_string());
    }
}
