//! The interactive command loop over the shared stack.
//!
//! Commands mutate the stack in place; any error leaves it untouched and
//! is printed. Index 0 is the top of the stack (the patch that applies
//! last).

use anstyle::{AnsiColor, Style};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::warn;

use crate::config::Config;
use crate::describe::Describe;
use crate::error::{PatError, Result};
use crate::parse;
use crate::selftest;
use crate::stack::Stack;

const RESET: &str = "\x1b[0m";

const HELP: &str = "\
commands (index 0 = top of stack):
  show [i]           stack outline, or outline of patch i
  push FILE...       load patch files onto the stack
  pop                discard the top patch
  sink i [end]       swap patch i with the one beneath it; range repeats
  float i [end]      bubble patch i up; range repeats
  squash i           compose patches i and i+1 into one
  invert i           replace patch i with its inverse
  split i LINE       split patch i at left line LINE
  grep i REGEX       split patch i into (hunks matching REGEX, rest)
  glob i PATTERN     split patch i into (files matching PATTERN, rest)
  conflicts          report pairs that cannot be reordered
  sum                push the composition of the whole stack
  save i FILE        write patch i to FILE
  write FILE         write the whole stack to FILE, top first
  edit i             edit patch i in $EDITOR
  edit2 i            edit patches i and i+1 side by side
  sift i             edit an empty patch against patch i
  test               run the self-test suite
  help               this text
  quit               leave";

pub fn run(stack: &mut Stack, config: &Config, color: bool) -> Result<()> {
    let mut editor = DefaultEditor::new().map_err(|err| PatError::Prompt {
        message: err.to_string(),
    })?;
    loop {
        match editor.readline("patstack> ") {
            Ok(input) => {
                let _ = editor.add_history_entry(input.as_str());
                match execute(stack, config, color, &input) {
                    Ok(Outcome::Continue) => {}
                    Ok(Outcome::Quit) => break,
                    Err(err) => print_error(&err, color),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                warn!(target: "repl", %err, "readline failed");
                break;
            }
        }
    }
    Ok(())
}

enum Outcome {
    Continue,
    Quit,
}

fn print_error(err: &PatError, color: bool) {
    if color {
        let style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)));
        eprintln!("{}patstack: {err}{RESET}", style.render());
    } else {
        eprintln!("patstack: {err}");
    }
}

fn usage(message: &str) -> PatError {
    PatError::Usage(format!("usage: {message}"))
}

fn parse_index(word: Option<&str>, what: &str) -> Result<usize> {
    word.ok_or_else(|| usage(what))?
        .parse()
        .map_err(|_| usage(what))
}

fn execute(stack: &mut Stack, config: &Config, color: bool, input: &str) -> Result<Outcome> {
    let mut words = input.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Outcome::Continue);
    };
    match command {
        "show" | "ls" => match words.next() {
            None => print!("{}", stack.outline()),
            Some(word) => {
                let index = parse_index(Some(word), "show [i]")?;
                print!("{}", stack.get(index)?.outline());
            }
        },
        "push" | "load" => {
            let files: Vec<&str> = words.collect();
            if files.is_empty() {
                return Err(usage("push FILE..."));
            }
            for file in files {
                let patch = parse::load_patch(std::path::Path::new(file), config)?;
                println!("{}", patch.headline());
                stack.push(patch);
            }
        }
        "pop" => match stack.pop() {
            Some(patch) => println!("dropped {}", patch.headline()),
            None => println!("stack is empty"),
        },
        "sink" => {
            let start = parse_index(words.next(), "sink i [end]")?;
            match words.next() {
                Some(word) => {
                    let end = parse_index(Some(word), "sink i [end]")?;
                    stack.sink_range(start, end)?;
                }
                None => stack.sink(start)?,
            }
        }
        "float" => {
            let start = parse_index(words.next(), "float i [end]")?;
            match words.next() {
                Some(word) => {
                    let end = parse_index(Some(word), "float i [end]")?;
                    stack.float_range(start, end)?;
                }
                None => stack.float_up(start)?,
            }
        }
        "squash" => {
            let index = parse_index(words.next(), "squash i")?;
            stack.squash(index)?;
        }
        "invert" => {
            let index = parse_index(words.next(), "invert i")?;
            stack.invert(index)?;
        }
        "split" => {
            let index = parse_index(words.next(), "split i LINE")?;
            let line = parse_index(words.next(), "split i LINE")?;
            stack.split(index, line)?;
        }
        "grep" => {
            let index = parse_index(words.next(), "grep i REGEX")?;
            let pattern = words.next().ok_or_else(|| usage("grep i REGEX"))?;
            let regex = regex::Regex::new(pattern)
                .map_err(|err| PatError::Usage(format!("bad regex: {err}")))?;
            stack.grep(index, &regex)?;
        }
        "glob" => {
            let index = parse_index(words.next(), "glob i PATTERN")?;
            let pattern = words.next().ok_or_else(|| usage("glob i PATTERN"))?;
            let pattern = glob::Pattern::new(pattern)
                .map_err(|err| PatError::Usage(format!("bad pattern: {err}")))?;
            stack.glob(index, &pattern)?;
        }
        "conflicts" => {
            if stack.len() < 2 {
                println!("need at least two patches");
            } else {
                let reports = stack.conflicts()?;
                for report in &reports {
                    println!("{} * {}", report.floater, report.sinker);
                }
                if reports.is_empty() {
                    println!("no conflicts");
                }
            }
        }
        "sum" => {
            if stack.is_empty() {
                println!("stack is empty");
            } else {
                let sum = stack.sum()?;
                println!("{}", sum.headline());
                stack.push(sum);
            }
        }
        "save" => {
            let index = parse_index(words.next(), "save i FILE")?;
            let file = words.next().ok_or_else(|| usage("save i FILE"))?;
            stack.get(index)?.save_to(std::path::Path::new(file))?;
        }
        "write" => {
            let file = words.next().ok_or_else(|| usage("write FILE"))?;
            std::fs::write(file, stack.to_string()).map_err(|source| PatError::FileWrite {
                path: file.into(),
                source,
            })?;
        }
        "edit" => {
            let index = parse_index(words.next(), "edit i")?;
            stack.edit(index, config)?;
        }
        "edit2" => {
            let index = parse_index(words.next(), "edit2 i")?;
            stack.edit2(index, config)?;
        }
        "sift" => {
            let index = parse_index(words.next(), "sift i")?;
            stack.sift(index, config)?;
        }
        "test" => {
            let report = selftest::run(stack, color);
            if report.ok() {
                println!("{} checks passed", report.checks);
            } else {
                for failure in &report.failures {
                    println!("FAILED: {failure}");
                }
            }
        }
        "help" | "?" => println!("{HELP}"),
        "quit" | "exit" | "q" => return Ok(Outcome::Quit),
        unknown => {
            return Err(PatError::Usage(format!(
                "unknown command '{unknown}'; try 'help'"
            )));
        }
    }
    Ok(Outcome::Continue)
}
