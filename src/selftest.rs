//! Property harness for a loaded stack, run by `--test`.
//!
//! Each section prints one dot per check; a failing law records a
//! message and flips the section to FAILED. This is the one caller that
//! treats algebra errors as data rather than letting them propagate.

use std::io::Write as _;

use anstyle::{AnsiColor, Style};

use crate::error::Result;
use crate::patch::Patch;
use crate::stack::Stack;

const RESET: &str = "\x1b[0m";

#[derive(Debug, Default)]
pub struct TestReport {
    pub checks: usize,
    pub failures: Vec<String>,
}

impl TestReport {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Section<'a> {
    report: &'a mut TestReport,
    failed_before: usize,
}

impl<'a> Section<'a> {
    fn begin(report: &'a mut TestReport, title: &str) -> Section<'a> {
        print!("  {title}: ");
        let _ = std::io::stdout().flush();
        let failed_before = report.failures.len();
        Section {
            report,
            failed_before,
        }
    }

    /// Records one check: `Ok(true)` passes, anything else fails with a
    /// message built from `describe`.
    fn check(&mut self, outcome: Result<bool>, describe: impl Fn() -> String) {
        self.report.checks += 1;
        match outcome {
            Ok(true) => {
                print!(".");
                let _ = std::io::stdout().flush();
            }
            Ok(false) => self.report.failures.push(describe()),
            Err(err) => self
                .report
                .failures
                .push(format!("{}: {err}", describe())),
        }
    }

    fn end(self, color: bool) {
        let failed = self.report.failures.len() > self.failed_before;
        let (label, style) = if failed {
            ("FAILED", Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red))).bold())
        } else {
            ("ok", Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Green))))
        };
        if color {
            println!(" {}{label}{RESET}", style.render());
        } else {
            println!(" {label}");
        }
    }
}

fn is_empty(patch: &Patch) -> Result<bool> {
    Ok(patch.shrinkwrapped()?.is_identity())
}

/// Difference of two patches shrinkwraps to nothing.
fn same_effect(left: &Patch, right: &Patch) -> Result<bool> {
    is_empty(&left.without(right)?)
}

pub fn run(stack: &Stack, color: bool) -> TestReport {
    let mut report = TestReport::default();
    let patches = &stack.patches;
    println!("Testing:");

    // Adjacent patches must compose; patches[i + 1] applies first.
    let mut section = Section::begin(&mut report, "compatibility");
    for i in 0..patches.len().saturating_sub(1) {
        let (second, first) = (&patches[i], &patches[i + 1]);
        section.check(first.compose(second).map(|_| true), || {
            format!("'{}' then '{}' should compose", first.name, second.name)
        });
    }
    section.end(color);

    // The sum minus every patch telescopes away to nothing.
    let mut section = Section::begin(&mut report, "checksum");
    if !patches.is_empty() {
        let outcome = (|| -> Result<bool> {
            let mut checksum = stack.sum()?;
            for patch in patches {
                checksum = checksum.without(patch)?.shrinkwrapped()?;
            }
            is_empty(&checksum)
        })();
        section.check(outcome, || {
            "the sum minus every patch should be empty".to_string()
        });
    }
    section.end(color);

    // Swapping adjacent patches preserves the combined effect, and the
    // swap inverts. Conflicting pairs are sanitized first and the
    // extracted part must account exactly for what was removed.
    let mut section = Section::begin(&mut report, "swapping");
    for i in 0..patches.len().saturating_sub(1) {
        let (second, first) = (&patches[i], &patches[i + 1]);
        let outcome = (|| -> Result<bool> {
            let mut first = first.clone();
            let conflict = first.conflicts(second)?.shrinkwrapped()?;
            if !conflict.is_identity() {
                let sanitized = first.without_conflicts(second)?.shrinkwrapped()?;
                if !same_effect(&first, &sanitized.compose(&conflict)?)? {
                    return Ok(false);
                }
                first = sanitized;
            }
            let combo = first.compose(second)?.shrinkwrapped()?;
            let up = first.over(second)?.shrinkwrapped()?;
            let down = second.under(&first)?.shrinkwrapped()?;
            let combo2 = down.compose(&up)?.shrinkwrapped()?;
            if !same_effect(&combo, &combo2)? {
                return Ok(false);
            }
            let first2 = up.under(&down)?.shrinkwrapped()?;
            let second2 = down.over(&up)?.shrinkwrapped()?;
            Ok(same_effect(&first2, &first)? && same_effect(&second2, second)?)
        })();
        section.check(outcome, || {
            format!("swapping '{}' and '{}'", first.name, second.name)
        });
    }
    section.end(color);

    let mut section = Section::begin(&mut report, "associativity");
    for window in patches.windows(3) {
        let (third, second, first) = (&window[0], &window[1], &window[2]);
        let outcome = (|| -> Result<bool> {
            let left = first.compose(&second.compose(third)?)?;
            let right = first.compose(second)?.compose(third)?;
            same_effect(&left, &right)
        })();
        section.check(outcome, || {
            format!(
                "composing '{}', '{}', '{}' should associate",
                first.name, second.name, third.name
            )
        });
    }
    section.end(color);

    // The empty patch is a two-sided unit.
    let mut section = Section::begin(&mut report, "identity");
    for patch in patches {
        let outcome = (|| -> Result<bool> {
            let unit = Patch::new("0");
            Ok(same_effect(&unit.compose(patch)?, patch)?
                && same_effect(&patch.compose(&unit)?, patch)?)
        })();
        section.check(outcome, || {
            format!("empty patch should be a unit for '{}'", patch.name)
        });
    }
    section.end(color);

    let mut section = Section::begin(&mut report, "inverse");
    for patch in patches {
        let outcome = (|| -> Result<bool> {
            Ok(is_empty(&patch.compose(&patch.inverse()?)?)?
                && same_effect(&patch.inverse()?.inverse()?, patch)?)
        })();
        section.check(outcome, || {
            format!("inverse laws should hold for '{}'", patch.name)
        });
    }
    section.end(color);

    // Composition keeps the first operand's left names and the second's
    // right names on every paired file.
    let mut section = Section::begin(&mut report, "closure");
    for i in 0..patches.len().saturating_sub(1) {
        let (second, first) = (&patches[i], &patches[i + 1]);
        let outcome = (|| -> Result<bool> {
            let combined = first.compose(second)?;
            for diff in &first.diffs {
                let Some(counterpart) = second.diff_by_lname(&diff.rname) else {
                    continue;
                };
                let paired = combined
                    .diffs
                    .iter()
                    .any(|d| d.lname == diff.lname && d.rname == counterpart.rname);
                if !paired {
                    return Ok(false);
                }
            }
            Ok(true)
        })();
        section.check(outcome, || {
            format!(
                "'{}' + '{}' should keep the outer names",
                first.name, second.name
            )
        });
    }
    section.end(color);

    // Every diff an operator produces satisfies the adjacent-hunk
    // offset law.
    let mut section = Section::begin(&mut report, "offsets");
    for patch in patches {
        section.check(
            Ok(patch.diffs.iter().all(|d| d.offset_law_holds())),
            || format!("offset law should hold in '{}'", patch.name),
        );
    }
    for i in 0..patches.len().saturating_sub(1) {
        let (second, first) = (&patches[i], &patches[i + 1]);
        let outcome = (|| -> Result<bool> {
            let combined = first.compose(second)?;
            Ok(combined.diffs.iter().all(|d| d.offset_law_holds()))
        })();
        section.check(outcome, || {
            format!(
                "offset law should hold in '{}' + '{}'",
                first.name, second.name
            )
        });
    }
    section.end(color);

    let mut section = Section::begin(&mut report, "shrinkwrap");
    for patch in patches {
        let outcome = (|| -> Result<bool> {
            let once = patch.shrinkwrapped()?;
            let twice = once.shrinkwrapped()?;
            Ok(once.to_string() == twice.to_string() && same_effect(&once, patch)?)
        })();
        section.check(outcome, || {
            format!("shrinkwrap should be idempotent on '{}'", patch.name)
        });
    }
    section.end(color);

    report
}
