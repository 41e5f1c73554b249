//! The internal caption model shared by every converter.

use serde::{Deserialize, Serialize};

/// One timed block of text, times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub start: f64,
    pub end: f64,
    pub lines: Vec<String>,
}

impl Caption {
    pub fn new<I, S>(start: f64, end: f64, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            start,
            end,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered captions in source order.
/// Captions are never sorted or merged, overlapping times are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub captions: Vec<Caption>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a caption and return the document, handy for building fixtures.
    pub fn add<I, S>(mut self, start: f64, end: f64, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.captions.push(Caption::new(start, end, lines));
        self
    }

    pub fn push(&mut self, caption: Caption) {
        self.captions.push(caption);
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Caption> {
        self.captions.iter()
    }

    /// Compare two documents allowing `tolerance` seconds of drift per timestamp.
    /// Text must match exactly.
    pub fn approx_eq(&self, other: &Document, tolerance: f64) -> bool {
        self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| {
                (a.start - b.start).abs() <= tolerance
                    && (a.end - b.end).abs() <= tolerance
                    && a.lines == b.lines
            })
    }
}

impl From<Vec<Caption>> for Document {
    fn from(captions: Vec<Caption>) -> Self {
        Self { captions }
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = &'a Caption;
    type IntoIter = std::slice::Iter<'a, Caption>;

    fn into_iter(self) -> Self::IntoIter {
        self.captions.iter()
    }
}
