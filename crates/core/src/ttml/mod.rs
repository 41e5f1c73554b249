//! The XML caption engine.
//!
//! Parsing runs in fixed stages: the bytes become an element tree, the root
//! picks a [`DialectKind`], and the matching strategy walks the tree, resolving
//! every timestamp through [`time`] and every text node into lines. Output is
//! always canonical TTML regardless of the dialect that was read.

mod dialect;
mod strategy;
mod text;
pub mod time;
mod tree;
mod writer;

use tracing::{debug, trace};

pub use dialect::DialectKind;
pub use time::{DialectContext, DropMode, FourthField, FrameRateMultiplier, TimeBase};

use crate::{ConvertError, Converter, Document};

const DEFAULT_LANGUAGE: &str = "en";

/// Reads every supported XML dialect and writes canonical TTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtmlConverter {
    language: String,
}

impl Default for TtmlConverter {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl TtmlConverter {
    /// Set the `xml:lang` written on output.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Converter for TtmlConverter {
    fn name(&self) -> &'static str {
        "ttml"
    }

    fn can_recognize(&self, content: &[u8]) -> bool {
        tree::root_name(content).is_some_and(|root| dialect::ROOT_NAMES.contains(&root.as_str()))
    }

    fn parse(&self, content: &[u8]) -> Result<Document, ConvertError> {
        parse_document(content).map(|(document, _)| document)
    }

    fn serialize(&self, document: &Document) -> Vec<u8> {
        writer::write(document, &self.language).into_bytes()
    }
}

/// Parse any supported dialect, reporting which one was found.
pub fn parse_document(content: &[u8]) -> Result<(Document, DialectKind), ConvertError> {
    trace!("ttml::parse_document(len={})", content.len());
    let root = tree::parse(content)?;
    let kind = dialect::detect(&root)?;
    let document = strategy::extract(kind, &root)?;
    debug!("parsed {} captions as {kind}", document.len());
    Ok((document, kind))
}
