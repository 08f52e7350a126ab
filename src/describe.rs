//! One-line and outline renderings for the interactive surface.
//!
//! Every node reports a "girth": how many of each kind of sub-element it
//! carries, rendered as `2D,5H,40L` next to its identifier. Outlines add
//! one indexed headline per direct element.

use crate::diff::Diff;
use crate::hunk::Hunk;
use crate::line::Line;
use crate::patch::Patch;
use crate::stack::Stack;

pub trait Describe {
    fn identifier(&self) -> String;

    /// Element counts per layer, outermost first; the head entry is the
    /// node itself.
    fn girth_values(&self) -> Vec<(char, usize)>;

    /// Headlines of the direct elements, for outlines.
    fn element_headlines(&self) -> Vec<String> {
        Vec::new()
    }

    fn girth(&self) -> String {
        self.girth_values()
            .iter()
            .skip(1)
            .map(|(tag, count)| format!("{count}{tag}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn headline(&self) -> String {
        format!("{}   ({})", self.identifier(), self.girth())
    }

    fn outline(&self) -> String {
        let mut out = self.headline();
        for (index, headline) in self.element_headlines().iter().enumerate() {
            out.push_str(&format!("\n  [{index:2}] {headline}"));
        }
        out.push('\n');
        out
    }
}

/// Adds girth vectors elementwise; shorter vectors pad out with their
/// partner's tail.
fn dot_girths(left: Vec<(char, usize)>, right: Vec<(char, usize)>) -> Vec<(char, usize)> {
    let mut out = Vec::with_capacity(left.len().max(right.len()));
    let mut left = left.into_iter();
    let mut right = right.into_iter();
    loop {
        match (left.next(), right.next()) {
            (Some((lt, lv)), Some((_, rv))) => out.push((lt, lv + rv)),
            (Some(entry), None) | (None, Some(entry)) => out.push(entry),
            (None, None) => break,
        }
    }
    out
}

fn nested_girth(own: (char, usize), elements: Vec<Vec<(char, usize)>>) -> Vec<(char, usize)> {
    let mut out = vec![own];
    if let Some(sum) = elements.into_iter().reduce(dot_girths) {
        out.extend(sum);
    }
    out
}

impl Describe for Line {
    fn identifier(&self) -> String {
        self.headline()
    }

    fn girth_values(&self) -> Vec<(char, usize)> {
        vec![('L', 1)]
    }

    fn headline(&self) -> String {
        // A line is its own description; no girth to report.
        self.identifier()
    }
}

impl Describe for Hunk {
    fn identifier(&self) -> String {
        Hunk::headline(self)
    }

    fn girth_values(&self) -> Vec<(char, usize)> {
        nested_girth(
            ('H', 1),
            self.lines.iter().map(Describe::girth_values).collect(),
        )
    }

    fn element_headlines(&self) -> Vec<String> {
        self.lines.iter().map(Describe::headline).collect()
    }
}

impl Describe for Diff {
    fn identifier(&self) -> String {
        self.lname.clone()
    }

    fn girth_values(&self) -> Vec<(char, usize)> {
        nested_girth(
            ('D', 1),
            self.hunks.iter().map(Describe::girth_values).collect(),
        )
    }

    fn element_headlines(&self) -> Vec<String> {
        self.hunks.iter().map(Describe::headline).collect()
    }
}

impl Describe for Patch {
    fn identifier(&self) -> String {
        self.name.clone()
    }

    fn girth_values(&self) -> Vec<(char, usize)> {
        nested_girth(
            ('P', 1),
            self.diffs.iter().map(Describe::girth_values).collect(),
        )
    }

    fn element_headlines(&self) -> Vec<String> {
        self.diffs.iter().map(Describe::headline).collect()
    }
}

impl Describe for Stack {
    fn identifier(&self) -> String {
        self.name.clone()
    }

    fn girth_values(&self) -> Vec<(char, usize)> {
        nested_girth(
            ('S', 1),
            self.patches.iter().map(Describe::girth_values).collect(),
        )
    }

    fn element_headlines(&self) -> Vec<String> {
        self.patches.iter().map(Describe::headline).collect()
    }
}
