//! Error type shared by all converters.

use quick_xml::{encoding::EncodingError, events::attributes::AttrError};
use thiserror::Error;

/// Reasons a parse can fail. Every failure aborts the whole parse.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// No dialect matches the document root.
    #[error("unrecognized schema: root element <{root}>")]
    UnrecognizedSchema { root: String },
    /// A timestamp does not match any encoding allowed by the active dialect,
    /// or the frame context it needs is missing.
    #[error("can't parse timestamp \"{raw}\" ({reason}){}", near_suffix(.near))]
    UnparsableTimestamp {
        raw: String,
        reason: String,
        near: Option<String>,
    },
    /// Both an explicit frame rate and a non-unity multiplier were declared.
    #[error("ambiguous frame configuration: frameRate=\"{frame_rate}\" with frameRateMultiplier=\"{multiplier}\"")]
    AmbiguousFrameConfiguration {
        frame_rate: String,
        multiplier: String,
    },
    /// Two caption nodes share an identifier.
    #[error("duplicate identifier \"{id}\"{}", near_suffix(.near))]
    DuplicateIdentifier { id: String, near: Option<String> },
    /// A caption node lacks the timing or text its dialect requires.
    #[error("malformed structure: {reason}{}", near_suffix(.near))]
    MalformedStructure {
        reason: String,
        near: Option<String>,
    },
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attribute(#[from] AttrError),
    #[error("text decoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("content is not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// No converter recognizes the content.
    #[error("unrecognized subtitle format")]
    UnrecognizedFormat,
}

fn near_suffix(near: &Option<String>) -> String {
    match near {
        Some(text) => format!(", near: {text}"),
        None => String::new(),
    }
}

impl ConvertError {
    pub fn timestamp(raw: &str, reason: impl Into<String>) -> Self {
        Self::UnparsableTimestamp {
            raw: raw.to_string(),
            reason: reason.into(),
            near: None,
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedStructure {
            reason: reason.into(),
            near: None,
        }
    }

    /// Attach the text of the caption being parsed when the error has room for it.
    #[must_use]
    pub fn near(mut self, text: &str) -> Self {
        match &mut self {
            Self::UnparsableTimestamp { near, .. }
            | Self::DuplicateIdentifier { near, .. }
            | Self::MalformedStructure { near, .. } => {
                if near.is_none() {
                    *near = Some(text.to_string());
                }
            }
            _ => {}
        }
        self
    }
}
