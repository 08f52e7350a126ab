//! Hand-editing patches in `$EDITOR`.
//!
//! Each patch is written to a named tempfile, the editor runs blocking,
//! and the file is reparsed afterwards. The tempfiles are removed on
//! every exit path, including editor and parse failures; the editor's
//! exit status is not inspected.

use std::io::Write as _;
use std::process::Command;

use tempfile::NamedTempFile;
use tracing::info;

use crate::config::Config;
use crate::error::{PatError, Result};
use crate::hunk::{fix_left_line_numbers, fix_right_line_numbers};
use crate::parse;
use crate::patch::Patch;

fn temp_patch_file(patch: &Patch) -> Result<NamedTempFile> {
    let suffix = format!("__{}", patch.name.replace(['/', '\\'], "_"));
    let mut file = tempfile::Builder::new()
        .prefix("patstack")
        .suffix(&suffix)
        .tempfile()
        .map_err(|source| PatError::FileWrite {
            path: std::env::temp_dir(),
            source,
        })?;
    file.write_all(patch.to_string().as_bytes())
        .map_err(|source| PatError::FileWrite {
            path: file.path().into(),
            source,
        })?;
    Ok(file)
}

fn run_editor(config: &Config, paths: &[&std::path::Path]) -> Result<()> {
    let mut words = config.editor.split_whitespace();
    let program = words.next().ok_or_else(|| PatError::ConfigInvalid(
        "editor command is empty".to_string(),
    ))?;
    let mut command = Command::new(program);
    command.args(words);
    if paths.len() > 1 {
        // Side-by-side split, as vim and its relatives spell it.
        command.arg("-o");
    }
    command.args(paths);
    info!(target: "editor", editor = %config.editor, files = paths.len(), "launching editor");
    command
        .status()
        .map_err(|source| PatError::Editor {
            command: config.editor.clone(),
            source,
        })?;
    Ok(())
}

/// Edits one patch; the reloaded patch keeps the original's name.
pub fn edit_patch(patch: &Patch, config: &Config) -> Result<Patch> {
    let file = temp_patch_file(patch)?;
    run_editor(config, &[file.path()])?;
    let mut reloaded = parse::load_patch(file.path(), config)?;
    reloaded.name = patch.name.clone();
    Ok(reloaded)
}

/// Edits two adjacent patches side by side (`upper` applies after
/// `lower`). After reload the upper patch's left numbers and the lower
/// patch's right numbers are re-derived, since hand-moving hunks between
/// the files invalidates the middle coordinate domain. Patches the edit
/// left empty are dropped.
pub fn edit_pair(upper: &Patch, lower: &Patch, config: &Config) -> Result<Vec<Patch>> {
    let upper_file = temp_patch_file(upper)?;
    let lower_file = temp_patch_file(lower)?;
    run_editor(config, &[upper_file.path(), lower_file.path()])?;

    let mut upper2 = parse::load_patch(upper_file.path(), config)?;
    let mut lower2 = parse::load_patch(lower_file.path(), config)?;
    upper2.name = upper.name.clone();
    lower2.name = lower.name.clone();
    for diff in &mut upper2.diffs {
        fix_left_line_numbers(&mut diff.hunks);
    }
    for diff in &mut lower2.diffs {
        fix_right_line_numbers(&mut diff.hunks);
    }
    Ok([upper2, lower2]
        .into_iter()
        .filter(|p| !p.is_identity())
        .collect())
}
