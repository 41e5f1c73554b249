//! Reduce a text-bearing element to plain lines.

use super::tree::{Element, Node};

const LINE_BREAK: &str = "br";

/// What ends a line besides `<br/>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineBreaks {
    /// Only `<br/>`. Source newlines are whitespace like any other.
    Markup,
    /// `<br/>` and literal newlines in the text.
    MarkupAndNewlines,
}

/// Plain-text lines of `element`.
///
/// Every element other than `<br/>` is transparent: its text joins the
/// current line and its tags are dropped. Whitespace runs collapse to one
/// space, lines are trimmed and blank lines are skipped.
pub(crate) fn extract_lines(element: &Element, breaks: LineBreaks) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    walk(element, breaks, &mut current, &mut lines);
    flush(&mut current, &mut lines);
    lines
}

fn walk(element: &Element, breaks: LineBreaks, current: &mut String, lines: &mut Vec<String>) {
    for node in &element.children {
        match node {
            Node::Text(text) => {
                for c in text.chars() {
                    if c == '\n' && breaks == LineBreaks::MarkupAndNewlines {
                        flush(current, lines);
                    } else if c.is_whitespace() {
                        if !current.ends_with(' ') {
                            current.push(' ');
                        }
                    } else {
                        current.push(c);
                    }
                }
            }
            Node::Element(e) if e.name == LINE_BREAK => flush(current, lines),
            Node::Element(e) => walk(e, breaks, current, lines),
        }
    }
}

fn flush(current: &mut String, lines: &mut Vec<String>) {
    let line = current.trim();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
    current.clear();
}
