/// End-to-end tests that invoke the compiled `patstack` binary via
/// `std::process::Command`.
///
/// Run with: `cargo test --test integration`
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const FIRST_PATCH: &str = "\
--- a/numbers.txt
+++ b/numbers.txt
@@ -1,5 +1,5 @@
 one
-two
+TWO
 three
 four
 five
";

const SECOND_PATCH: &str = "\
--- a/numbers.txt
+++ b/numbers.txt
@@ -5,5 +5,5 @@
 five
 six
 seven
-eight
+EIGHT
 nine
";

// Claims the same line as FIRST_PATCH but from a different starting
// text, so it can neither compose with nor rebase over it.
const CLASHING_PATCH: &str = "\
--- a/numbers.txt
+++ b/numbers.txt
@@ -1,3 +1,3 @@
 one
-two
+deux
 three
";

fn write_patch(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture patch");
    path
}

/// Invoke the patstack binary with the given arguments, feeding `stdin`
/// to it. Returns `(stdout, stderr, exit_code)`.
fn run_patstack(args: &[&str], stdin: &str) -> (String, String, i32) {
    let binary = env!("CARGO_BIN_EXE_patstack");

    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn patstack binary");

    child
        .stdin
        .take()
        .expect("piped stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");

    let output = child.wait_with_output().expect("failed to wait on child");

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn self_test_passes_on_a_clean_stack() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_patch(dir.path(), "first.patch", FIRST_PATCH);
    let second = write_patch(dir.path(), "second.patch", SECOND_PATCH);

    let (stdout, stderr, code) = run_patstack(
        &["--test", first.to_str().unwrap(), second.to_str().unwrap()],
        "",
    );
    assert_eq!(code, 0, "stdout: {stdout:?}, stderr: {stderr:?}");
    assert!(stdout.contains("compatibility"), "got: {stdout:?}");
    assert!(stdout.contains("ok"), "got: {stdout:?}");
    assert!(!stdout.contains("FAILED"), "got: {stdout:?}");
}

#[test]
fn self_test_fails_on_an_incoherent_stack() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_patch(dir.path(), "first.patch", FIRST_PATCH);
    let clashing = write_patch(dir.path(), "clashing.patch", CLASHING_PATCH);

    let (_stdout, stderr, code) = run_patstack(
        &["--test", first.to_str().unwrap(), clashing.to_str().unwrap()],
        "",
    );
    assert_eq!(code, 10, "stderr: {stderr:?}");
    assert!(stderr.contains("FAILED"), "got: {stderr:?}");
}

#[test]
fn unparseable_patch_exits_with_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write_patch(dir.path(), "bad.patch", "this is not a patch\n");

    let (_stdout, stderr, code) = run_patstack(&["--test", bad.to_str().unwrap()], "");
    assert_eq!(code, 2, "stderr: {stderr:?}");
    assert!(stderr.contains("patstack:"), "got: {stderr:?}");
}

#[test]
fn missing_file_exits_with_io_error() {
    let (_stdout, stderr, code) = run_patstack(&["--test", "no/such/file.patch"], "");
    assert_eq!(code, 1, "stderr: {stderr:?}");
}

#[test]
fn repl_show_outlines_the_stack() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_patch(dir.path(), "first.patch", FIRST_PATCH);

    let (stdout, _stderr, code) = run_patstack(&[first.to_str().unwrap()], "show\nquit\n");
    assert_eq!(code, 0);
    assert!(stdout.contains("patches"), "got: {stdout:?}");
    assert!(stdout.contains("first.patch"), "got: {stdout:?}");
    assert!(stdout.contains("1D,1H,6L"), "got: {stdout:?}");
}

#[test]
fn repl_conflicts_reports_the_pair() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_patch(dir.path(), "first.patch", FIRST_PATCH);
    let clashing = write_patch(dir.path(), "clashing.patch", CLASHING_PATCH);

    let (stdout, _stderr, code) = run_patstack(
        &[first.to_str().unwrap(), clashing.to_str().unwrap()],
        "conflicts\nquit\n",
    );
    assert_eq!(code, 0);
    assert!(stdout.contains("1 * 0"), "got: {stdout:?}");
}

#[test]
fn repl_squash_then_write_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_patch(dir.path(), "first.patch", FIRST_PATCH);
    let second = write_patch(dir.path(), "second.patch", SECOND_PATCH);
    let out = dir.path().join("combined.patch");

    let script = format!("squash 0\nsave 0 {}\nquit\n", out.display());
    let (_stdout, stderr, code) = run_patstack(
        &[first.to_str().unwrap(), second.to_str().unwrap()],
        &script,
    );
    assert_eq!(code, 0, "stderr: {stderr:?}");

    let combined = std::fs::read_to_string(&out).expect("combined patch written");
    // Both changes are present in one diff for the one file.
    assert!(combined.contains("-two\n"), "got: {combined:?}");
    assert!(combined.contains("+TWO\n"), "got: {combined:?}");
    assert!(combined.contains("-eight\n"), "got: {combined:?}");
    assert!(combined.contains("+EIGHT\n"), "got: {combined:?}");
    assert_eq!(combined.matches("--- ").count(), 1, "got: {combined:?}");
}

#[test]
fn repl_grep_splits_the_top_patch() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_patch(dir.path(), "first.patch", FIRST_PATCH);

    let (stdout, _stderr, code) = run_patstack(
        &[first.to_str().unwrap()],
        "grep 0 TWO\nshow\nquit\n",
    );
    assert_eq!(code, 0);
    assert!(stdout.contains(".matches"), "got: {stdout:?}");
}

#[test]
fn no_newline_patch_round_trips_through_save() {
    let dir = tempfile::tempdir().unwrap();
    let text = "\
--- a/tail.txt
+++ b/tail.txt
@@ -1,1 +1,1 @@
-old ending
+new ending
\\ No newline at end of file";
    let input = write_patch(dir.path(), "tail.patch", text);
    let out = dir.path().join("tail-out.patch");

    let script = format!("save 0 {}\nquit\n", out.display());
    let (_stdout, stderr, code) = run_patstack(&[input.to_str().unwrap()], &script);
    assert_eq!(code, 0, "stderr: {stderr:?}");

    let written = std::fs::read_to_string(&out).expect("patch written");
    assert_eq!(written, text, "byte-exact round trip");
}
