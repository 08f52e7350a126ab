//! Reader for unified-diff patch text.
//!
//! A patch file is a concatenation of diffs; each diff is a `---`/`+++`
//! header pair followed by hunks; each hunk is an `@@` header followed
//! by exactly the number of body lines the header promises. Body lines
//! keep their trailing newline in `content`; a `\ No newline at end of
//! file` directive strips it from the previous line.

use std::iter::Peekable;
use std::path::Path;

use crate::config::Config;
use crate::diff::Diff;
use crate::error::{PatError, Result};
use crate::hunk::Hunk;
use crate::line::{Line, LineKind};
use crate::patch::Patch;

/// Reads and parses one patch file; the patch is named after the path as
/// given.
pub fn load_patch(path: &Path, config: &Config) -> Result<Patch> {
    let text = std::fs::read_to_string(path).map_err(|source| PatError::FileRead {
        path: path.into(),
        source,
    })?;
    parse_patch(&path.display().to_string(), &text, config)
}

pub fn parse_patch(name: &str, text: &str, config: &Config) -> Result<Patch> {
    let mut lines = text.split_inclusive('\n').peekable();
    let mut patch = Patch::new(name);
    while lines.peek().is_some() {
        patch.diffs.push(parse_diff(&mut lines, config)?);
    }
    patch.normalize();
    Ok(patch)
}

fn parse_error(message: impl Into<String>) -> PatError {
    PatError::Parse {
        message: message.into(),
    }
}

/// Pulls the path out of a `--- <path>` / `+++ <path>` header line.
/// Anything after the next run of whitespace (timestamps, say) is
/// ignored.
fn header_path<'a>(line: &'a str, prefix: &str) -> Result<&'a str> {
    let mut words = line.split_whitespace();
    if words.next() != Some(prefix) {
        return Err(parse_error(format!(
            "expected {prefix}; found {:?}",
            line.trim_end()
        )));
    }
    words
        .next()
        .ok_or_else(|| parse_error(format!("missing path after {prefix}: {:?}", line.trim_end())))
}

fn parse_diff<'a, I>(lines: &mut Peekable<I>, config: &Config) -> Result<Diff>
where
    I: Iterator<Item = &'a str>,
{
    let left = lines
        .next()
        .ok_or_else(|| parse_error("missing --- header"))?;
    let right = lines
        .next()
        .ok_or_else(|| parse_error("missing +++ header"))?;
    let lpath = header_path(left, "---")?;
    let rpath = header_path(right, "+++")?;

    let mut diff = Diff::new(lpath, rpath, config.strip_level);
    while let Some(peeked) = lines.peek() {
        if !peeked.starts_with("@@") {
            break;
        }
        diff.hunks.push(parse_hunk(lines)?);
    }
    diff.normalize()?;
    Ok(diff)
}

/// Parses `-<start>,<len>` / `+<start>,<len>` out of a hunk header.
fn header_range(word: &str, sign: char, header: &str) -> Result<(usize, usize)> {
    let bad = || parse_error(format!("malformed hunk header: {:?}", header.trim_end()));
    let rest = word.strip_prefix(sign).ok_or_else(bad)?;
    let (start, len) = rest.split_once(',').ok_or_else(bad)?;
    Ok((
        start.parse().map_err(|_| bad())?,
        len.parse().map_err(|_| bad())?,
    ))
}

fn parse_hunk<'a, I>(lines: &mut Peekable<I>) -> Result<Hunk>
where
    I: Iterator<Item = &'a str>,
{
    let header = lines
        .next()
        .ok_or_else(|| parse_error("missing @@ header"))?;
    let words: Vec<&str> = header.split_whitespace().collect();
    let [atat, left, right, atat2] = words.as_slice() else {
        return Err(parse_error(format!(
            "malformed hunk header: {:?}",
            header.trim_end()
        )));
    };
    if *atat != "@@" || *atat2 != "@@" {
        return Err(parse_error(format!(
            "malformed hunk header: {:?}",
            header.trim_end()
        )));
    }
    let (lstart, llen) = header_range(left, '-', header)?;
    let (rstart, rlen) = header_range(right, '+', header)?;

    let mut body: Vec<Line> = Vec::new();
    let mut nleft = 0usize;
    let mut nright = 0usize;
    loop {
        // "No newline at end of file" directives strip the newline the
        // previous body line carried; one may also trail the hunk.
        while lines.peek().is_some_and(|raw| raw.starts_with('\\')) {
            let _ = lines.next();
            let Some(last) = body.last_mut() else {
                return Err(parse_error(
                    "no-newline directive with no preceding body line",
                ));
            };
            if !last.content.ends_with('\n') {
                return Err(parse_error(
                    "repeated no-newline directive for the same line",
                ));
            }
            last.content.pop();
        }
        if nleft == llen && nright == rlen {
            break;
        }
        if nleft > llen || nright > rlen {
            return Err(parse_error(format!(
                "hunk at -{lstart},{llen} has more lines than its header promises"
            )));
        }
        let Some(raw) = lines.next() else {
            return Err(parse_error(format!(
                "patch ends inside the hunk at -{lstart},{llen}"
            )));
        };
        let line = parse_line(raw)?;
        if line.is_left() {
            nleft += 1;
        }
        if line.is_right() {
            nright += 1;
        }
        body.push(line);
    }
    Ok(Hunk::with_lines(lstart, rstart, body))
}

fn parse_line(raw: &str) -> Result<Line> {
    let kind = raw
        .chars()
        .next()
        .and_then(LineKind::from_char)
        .ok_or_else(|| PatError::UnsupportedLine {
            line: raw.to_string(),
        })?;
    Ok(Line::new(kind, &raw[1..]))
}
